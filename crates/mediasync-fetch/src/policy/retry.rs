use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How the wait between attempts grows.
///
/// Both strategies strictly increase with the attempt number for a non-zero
/// base delay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    /// `base * attempt`
    #[default]
    Linear,
    /// `base * 2^(attempt - 1)`
    Exponential,
}

impl Backoff {
    /// Delay after the failed attempt number `attempt` (1-indexed).
    ///
    /// ```
    /// use std::time::Duration;
    /// use mediasync_fetch::Backoff;
    ///
    /// let base = Duration::from_millis(100);
    /// assert_eq!(Backoff::Linear.delay(3, base), Duration::from_millis(300));
    /// assert_eq!(Backoff::Exponential.delay(3, base), Duration::from_millis(400));
    /// ```
    pub fn delay(self, attempt: u32, base: Duration) -> Duration {
        let attempt = attempt.max(1);
        let multiplier = match self {
            Self::Linear => attempt,
            Self::Exponential => 2_u32.saturating_pow(attempt - 1),
        };
        base.saturating_mul(multiplier)
    }
}

/// `429 Too Many Requests` and every `5xx`.
pub fn is_retriable_status(status: u16) -> bool { status == 429 || (500..=599).contains(&status) }
