//! Error types for mediasync-fetch.

use std::time::Duration;

use thiserror::Error;

use crate::policy::is_retriable_status;

/// Transport-level failure reported by an [`HttpClient`](crate::HttpClient).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    #[error("timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("connection interrupted: {0}")]
    Reset(String),

    #[error("invalid request: {0}")]
    Invalid(String),
}

impl NetworkError {
    /// Whether retrying the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool { !matches!(self, Self::Invalid(_)) }
}

/// Why a single asset could not be fetched.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} from {url}")]
    Status {
        url:         String,
        status:      u16,
        retry_after: Option<Duration>,
    },

    #[error("request to {url} timed out after {after:?}")]
    Timeout { url: String, after: Duration },

    #[error("request to {url} failed: {source}")]
    Network {
        url:    String,
        source: NetworkError,
    },

    #[error("failed to store {url}: {source}")]
    Store {
        url:    String,
        source: mediasync_fs::Error,
    },

    #[error("write task for {url} failed: {message}")]
    Task { url: String, message: String },
}

impl FetchError {
    /// `429`, `5xx`, timeouts and transient network errors are worth retrying.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Status { status, .. } => is_retriable_status(*status),
            Self::Timeout { .. } => true,
            Self::Network { source, .. } => source.is_transient(),
            Self::Store { .. } | Self::Task { .. } => false,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Self::Status { url, .. }
            | Self::Timeout { url, .. }
            | Self::Network { url, .. }
            | Self::Store { url, .. }
            | Self::Task { url, .. } => url,
        }
    }
}

/// Failure of a whole batch, as opposed to individual assets.
#[derive(Debug, Error)]
pub enum Error {
    #[error("download worker aborted: {0}")]
    Worker(String),
}

pub type Result<T> = std::result::Result<T, Error>;
