use std::time::Duration;

use crate::domain::errors::{DomainError, Result};

/// Default number of automatic reconnection attempts
pub const DEFAULT_RETRY_BUDGET: u32 = 10;

/// Default delay between reconnection attempts
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(5000);

/// Reconnection budget and delay schedule.
///
/// A multiplier of exactly 1.0 yields a fixed delay. Larger multipliers grow
/// the delay exponentially per attempt, capped at `max_delay`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
    max_delay: Duration,
    multiplier: f64,
}

impl RetryPolicy {
    /// Fixed-delay policy
    pub fn fixed(max_attempts: u32, delay: Duration) -> Result<Self> {
        Self::exponential(max_attempts, delay, delay, 1.0)
    }

    pub fn exponential(
        max_attempts: u32,
        delay: Duration,
        max_delay: Duration,
        multiplier: f64,
    ) -> Result<Self> {
        if delay.is_zero() {
            return Err(DomainError::InvalidRetryDelay);
        }

        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(DomainError::InvalidBackoffMultiplier);
        }

        if max_delay < delay {
            return Err(DomainError::InvalidMaxDelay);
        }

        Ok(Self {
            max_attempts,
            delay,
            max_delay,
            multiplier,
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn is_fixed(&self) -> bool {
        self.multiplier == 1.0
    }

    /// Whether another attempt fits in the budget given the attempts already made
    pub fn allows_retry(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }

    /// Delay before the given attempt (1-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if self.is_fixed() {
            return self.delay;
        }

        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let nanos = self.delay.as_nanos() as f64 * self.multiplier.powi(exponent);
        if !nanos.is_finite() || nanos >= self.max_delay.as_nanos() as f64 {
            return self.max_delay;
        }
        Duration::from_nanos(nanos.round() as u64)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_BUDGET,
            delay: DEFAULT_RETRY_DELAY,
            max_delay: DEFAULT_RETRY_DELAY,
            multiplier: 1.0,
        }
    }
}
