//! # Retry budget.
//!
//! [`RetryPolicy`] bundles a retry-count budget with a [`BackoffPolicy`].
//! There is no total-time budget: an operation gets `max_retries + 1` attempts.

use std::time::Duration;

use crate::policies::backoff::BackoffPolicy;

/// Retry budget plus delay strategy.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Retries after the first attempt (`0` = single attempt).
    pub max_retries: u32,
    /// Delay between attempts.
    pub backoff: BackoffPolicy,
}

impl Default for RetryPolicy {
    /// 10 retries, exponential backoff with a 2s base.
    fn default() -> Self {
        Self {
            max_retries: 10,
            backoff: BackoffPolicy::exponential(Duration::from_secs(2)),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy from its parts.
    pub fn new(max_retries: u32, backoff: BackoffPolicy) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    /// Total number of attempts allowed.
    #[inline]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}
