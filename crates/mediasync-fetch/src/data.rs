//! Options and per-asset outcomes.

use std::time::Duration;

use mediasync_manifest::CacheEntry;

use crate::error::FetchError;
use crate::policy::Backoff;

/// Configuration for fetching a single asset.
///
/// # Examples
///
/// ```
/// use mediasync_fetch::{Backoff, FetchOptions};
/// use std::time::Duration;
///
/// let options = FetchOptions::default()
///     .max_retries(5)
///     .base_delay(Duration::from_millis(200))
///     .backoff(Backoff::Exponential);
/// assert_eq!(options.max_retries, 5);
/// ```
#[derive(Clone, Debug)]
pub struct FetchOptions {
    /// Retries after the initial attempt; total attempts = 1 + `max_retries`.
    ///
    /// Default: 3
    pub max_retries: u32,

    /// Base delay fed to [`Backoff::delay`].
    ///
    /// Default: 500ms
    pub base_delay: Duration,

    /// Hard bound on one attempt, from sending the request to the last body byte.
    ///
    /// Default: 30s
    pub timeout: Duration,

    /// Send `If-None-Match` / `If-Modified-Since` when the asset is cached and
    /// still present on disk.
    ///
    /// Default: true
    pub skip_unchanged: bool,

    /// Default: [`Backoff::Linear`]
    pub backoff: Backoff,

    /// Upper bound on a `Retry-After` wait requested by a `429`.
    ///
    /// Default: 30s
    pub max_retry_after: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            max_retries:     3,
            base_delay:      Duration::from_millis(500),
            timeout:         Duration::from_secs(30),
            skip_unchanged:  true,
            backoff:         Backoff::Linear,
            max_retry_after: Duration::from_secs(30),
        }
    }
}

impl FetchOptions {
    #[must_use]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn skip_unchanged(mut self, skip_unchanged: bool) -> Self {
        self.skip_unchanged = skip_unchanged;
        self
    }

    #[must_use]
    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    #[must_use]
    pub fn max_retry_after(mut self, max_retry_after: Duration) -> Self {
        self.max_retry_after = max_retry_after;
        self
    }

    /// Wait before the attempt following failed attempt `attempt`.
    pub fn retry_delay(&self, attempt: u32, error: &FetchError) -> Duration {
        let backoff = self.backoff.delay(attempt, self.base_delay);
        match error {
            FetchError::Status {
                status: 429,
                retry_after: Some(requested),
                ..
            } => backoff.max((*requested).min(self.max_retry_after)),
            _ => backoff,
        }
    }
}

/// Result of driving one asset through the fetcher.
#[derive(Debug)]
pub enum DownloadOutcome {
    /// New bytes written; carries fresh validators.
    Downloaded(CacheEntry),
    /// The origin answered `304 Not Modified`; carries the revalidated entry.
    Skipped(CacheEntry),
    /// Terminal error or retries exhausted. No metadata survives.
    Failed { error: FetchError, attempts: u32 },
}

impl DownloadOutcome {
    pub fn entry(&self) -> Option<&CacheEntry> {
        match self {
            Self::Downloaded(entry) | Self::Skipped(entry) => Some(entry),
            Self::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool { matches!(self, Self::Failed { .. }) }
}
