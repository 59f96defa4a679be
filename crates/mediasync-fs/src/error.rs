use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to write '{path}': {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to read '{path}': {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to create directory '{path}': {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("path has no file name: '{0}'")]
    NoFileName(PathBuf),
}

impl Error {
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Write { path, .. }
            | Self::Read { path, .. }
            | Self::CreateDir { path, .. }
            | Self::NoFileName(path) => path,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
