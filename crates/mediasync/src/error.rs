use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Content(#[from] mediasync_content::Error),

    #[error(transparent)]
    Manifest(#[from] mediasync_manifest::Error),

    #[error(transparent)]
    Fetch(#[from] mediasync_fetch::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
