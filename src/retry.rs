//! Backoff policy for retried executions

use std::time::Duration;

/// Largest exponent the backoff doubling is allowed to reach
const MAX_EXPONENT: u32 = 32;

/// Default base delay: one minute
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(60);

/// Default delay cap: one day
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Computes how long to wait before retrying a failed instance
///
/// Implementations must be monotonically non-decreasing in the failure count
/// and bounded above by a maximum delay. The delay is advisory metadata for
/// the external dequeuing scheduler, not a timer this crate arms.
pub trait RetryPolicy: Send + Sync {
    /// Delay to wait after the given number of consecutive failures
    fn delay_for(&self, consecutive_failures: u32) -> Duration;
}

/// Deterministic exponential backoff, doubling from a base delay up to a cap
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base_delay: Duration,
    max_delay: Duration,
}

impl ExponentialBackoff {
    /// Create a backoff doubling from `base_delay`, capped at `max_delay`
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
        }
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY)
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn delay_for(&self, consecutive_failures: u32) -> Duration {
        let factor = 1u64 << consecutive_failures.min(MAX_EXPONENT);
        let delay = self
            .base_delay
            .checked_mul(factor.min(u32::MAX as u64) as u32)
            .unwrap_or(self.max_delay);
        delay.min(self.max_delay)
    }
}
