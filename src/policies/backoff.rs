//! # Backoff policy for retrying operations.
//!
//! [`BackoffPolicy`] decides how long a job waits before its next attempt. The growth
//! comes from [`BackoffPolicy::mode`], the unit from [`BackoffPolicy::base`], and every
//! delay is clamped to [`BackoffPolicy::max`].
//!
//! All computation happens in milliseconds:
//! - `Fixed`: every delay equals `base`.
//! - `Exponential`: the delay before retry `n` (0-indexed) is `base_secs^n` seconds,
//!   so a 2s base yields 1s, 2s, 4s, 8s, ...
//!
//! No jitter is applied. The delay is derived purely from the attempt index.
//!
//! ```rust
//! use std::time::Duration;
//! use seedvisor::{BackoffMode, BackoffPolicy};
//!
//! let backoff = BackoffPolicy {
//!     base: Duration::from_secs(2),
//!     max: Duration::from_secs(600),
//!     mode: BackoffMode::Exponential,
//! };
//!
//! assert_eq!(backoff.next(0), Duration::from_secs(1));
//! assert_eq!(backoff.next(1), Duration::from_secs(2));
//! assert_eq!(backoff.next(2), Duration::from_secs(4));
//! ```

use std::time::Duration;

/// How retry delays evolve across attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackoffMode {
    /// Constant delay equal to the base.
    Fixed,
    /// Geometric growth with the base (in seconds) as ratio.
    Exponential,
}

/// Delay schedule between retries.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Base delay (the constant delay for `Fixed`, the growth base for `Exponential`).
    pub base: Duration,
    /// Maximum delay cap.
    pub max: Duration,
    /// Growth mode.
    pub mode: BackoffMode,
}

impl Default for BackoffPolicy {
    /// Exponential over a 2s base (1s, 2s, 4s, ...), capped at one hour.
    fn default() -> Self {
        Self {
            base: Duration::from_secs(2),
            max: Duration::from_secs(3600),
            mode: BackoffMode::Exponential,
        }
    }
}

impl BackoffPolicy {
    /// Fixed delay of `base` between attempts.
    pub fn fixed(base: Duration) -> Self {
        Self {
            base,
            max: base.max(Duration::from_secs(3600)),
            mode: BackoffMode::Fixed,
        }
    }

    /// Exponential delay with `base` seconds as the growth ratio.
    pub fn exponential(base: Duration) -> Self {
        Self {
            base,
            mode: BackoffMode::Exponential,
            ..Self::default()
        }
    }

    /// Computes the delay before the retry with the given index (0-indexed).
    ///
    /// Results that overflow or are not finite are clamped to [`BackoffPolicy::max`].
    pub fn next(&self, attempt: u32) -> Duration {
        let max_ms = self.max.as_millis() as f64;
        let ms = match self.mode {
            BackoffMode::Fixed => self.base.as_millis() as f64,
            BackoffMode::Exponential => {
                let exp = attempt.min(i32::MAX as u32) as i32;
                self.base.as_secs_f64().powi(exp) * 1000.0
            }
        };

        if !ms.is_finite() || ms < 0.0 || ms > max_ms {
            self.max
        } else {
            Duration::from_millis(ms.round() as u64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_exponential_is_power_of_base() {
        let policy = BackoffPolicy::exponential(Duration::from_secs(2));

        assert_eq!(policy.next(0), Duration::from_secs(1));
        assert_eq!(policy.next(1), Duration::from_secs(2));
        assert_eq!(policy.next(2), Duration::from_secs(4));
        assert_eq!(policy.next(3), Duration::from_secs(8));
        assert_eq!(policy.next(9), Duration::from_secs(512));
    }

    #[test]
    fn test_fixed_is_constant() {
        let policy = BackoffPolicy::fixed(Duration::from_millis(500));
        for attempt in 0..10 {
            assert_eq!(
                policy.next(attempt),
                Duration::from_millis(500),
                "attempt {} should be constant at 500ms",
                attempt
            );
        }
    }

    #[test]
    fn test_fractional_base() {
        let policy = BackoffPolicy::exponential(Duration::from_millis(1500));
        assert_eq!(policy.next(0), Duration::from_millis(1000));
        assert_eq!(policy.next(1), Duration::from_millis(1500));
        assert_eq!(policy.next(2), Duration::from_millis(2250));
    }

    #[test]
    fn test_clamped_to_max() {
        let policy = BackoffPolicy {
            base: Duration::from_secs(2),
            max: Duration::from_secs(10),
            mode: BackoffMode::Exponential,
        };
        assert_eq!(policy.next(10), Duration::from_secs(10));
        assert_eq!(policy.next(u32::MAX), Duration::from_secs(10));
    }
}
