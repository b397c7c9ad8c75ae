//! Retry scheduling.

use std::time::Duration;

/// Capped exponential backoff without jitter.
///
/// `delay(n)` is `base` for `n <= 1` and `base * 2^(n-1)` afterwards, never
/// exceeding `base * 2^(max_attempts-1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub max_attempts: u32,
}

impl BackoffPolicy {
    pub fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_attempts,
        }
    }

    /// Delay before the next attempt after `attempt` failures.
    pub fn delay(&self, attempt: u32) -> Duration {
        let cap = self.scaled(self.max_attempts.saturating_sub(1));
        if attempt <= 1 {
            return self.base_delay.min(cap);
        }
        self.scaled(attempt - 1).min(cap)
    }

    /// Whether `attempts` has used up the budget.
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }

    /// Largest delay this policy will ever produce.
    pub fn max_delay(&self) -> Duration {
        self.scaled(self.max_attempts.saturating_sub(1))
    }

    fn scaled(&self, exponent: u32) -> Duration {
        let factor = 2u32.checked_pow(exponent).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(Duration::MAX)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(60), 5)
    }
}
