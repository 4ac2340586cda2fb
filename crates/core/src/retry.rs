//! Retry policy with exponential backoff.

use std::time::Duration;

/// Retry policy for failed delivery attempts.
///
/// The delay for retry `k` (1-indexed) is `base_delay * 2^(k-1)`, capped at
/// `max_delay`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries before a notification stays failed.
    pub max_retries: i32,
    /// Base delay of the exponential backoff.
    pub base_delay: Duration,
    /// Ceiling for the computed delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(5 * 60),   // 5 minutes
            max_delay: Duration::from_secs(3600 * 24), // 24 hours
        }
    }
}

impl RetryPolicy {
    /// Calculate the backoff for the given retry index (1-indexed, the
    /// value of `retry_count` after the failed attempt was recorded).
    #[must_use]
    pub fn delay_for_retry(&self, retry_count: i32) -> Duration {
        let exponent = u32::try_from(retry_count.saturating_sub(1)).unwrap_or(0).min(31);
        let delay = self.base_delay.saturating_mul(1_u32 << exponent);

        if delay > self.max_delay {
            self.max_delay
        } else {
            delay
        }
    }

    /// Check whether another attempt is allowed at the given retry count.
    #[must_use]
    pub const fn should_retry(&self, retry_count: i32) -> bool {
        retry_count <= self.max_retries
    }
}
