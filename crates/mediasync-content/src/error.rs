use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("content directory not found: '{0}'")]
    MissingRoot(PathBuf),

    #[error("failed to serialize '{path}': {source}")]
    Serialize {
        path:   PathBuf,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Fs(#[from] mediasync_fs::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
