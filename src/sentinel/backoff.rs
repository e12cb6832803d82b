//! Retry Policy
//!
//! Exponential backoff for re-dialing a lost sentinel.

use std::time::Duration;

/// First retry delay (500 ms)
const RETRY_INITIAL_MS: u64 = 500;

/// Retry delay ceiling (30 seconds)
const RETRY_MAX_MS: u64 = 30_000;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub initial: Duration,
    pub max: Duration,
    pub multiplier: u32,
    /// Scale each delay by a random factor in [0.5, 1.0]
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(RETRY_INITIAL_MS),
            max: Duration::from_millis(RETRY_MAX_MS),
            multiplier: 2,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-indexed), capped at `max`
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1).saturating_pow(attempt.min(30));
        let delay = self.initial.saturating_mul(factor).min(self.max);

        if self.jitter {
            delay.mul_f64(0.5 + fastrand::f64() * 0.5)
        } else {
            delay
        }
    }
}
