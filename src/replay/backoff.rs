//! Retry policy for failed deliveries.
//!
//! After the `n`th failed attempt an item is either retried after
//! `min(base * 2^(n-1), max)` or, once `n` reaches `max_attempts`, evicted.

use std::time::Duration;

use crate::config::QueueConfig;

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after which an item is evicted
    pub max_attempts: u32,
    /// First re-trigger delay in milliseconds
    pub base_delay_ms: u64,
    /// Cap on any re-trigger delay in milliseconds
    pub max_delay_ms: u64,
}

/// What to do with an item after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Persist `attempt` and re-trigger after `delay`.
    Retry { attempt: u32, delay: Duration },
    /// Retry budget exhausted; delete the item.
    Evict { attempt: u32 },
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
        }
    }
}

impl From<&QueueConfig> for RetryPolicy {
    fn from(config: &QueueConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
        }
    }
}

impl RetryPolicy {
    /// Delay before re-triggering after the given (1-based) attempt.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = 2_u64.checked_pow(exponent).unwrap_or(u64::MAX);
        let millis = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(millis)
    }

    /// Decide the fate of an item that has already failed `retry` times and
    /// just failed again.
    #[must_use]
    pub fn decide(&self, retry: u32) -> Decision {
        let attempt = retry.saturating_add(1);
        if attempt < self.max_attempts {
            Decision::Retry {
                attempt,
                delay: self.delay_for(attempt),
            }
        } else {
            Decision::Evict { attempt }
        }
    }
}
