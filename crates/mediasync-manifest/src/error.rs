#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to serialize manifest: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Fs(#[from] mediasync_fs::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
