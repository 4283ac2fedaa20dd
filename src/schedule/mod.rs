//! # Schedule sources.
//!
//! A [`ScheduleSource`] answers one question: given "now", when is the next occurrence?
//! The core treats it as opaque. [`Schedule`] is the built-in implementation, parsed
//! once at load time from configuration text:
//!
//! ```text
//! "every 10 seconds"        interval, aligned to multiples of the period since the epoch
//! "every minute"            same, N = 1
//! "*/15 * * * *"            5-field cron (seconds implied 0)
//! "0 30 9 * * Mon-Fri"      6/7-field cron
//! ```

mod expression;

pub use expression::Schedule;

use chrono::{DateTime, Utc};

/// Yields the next future occurrence of a recurring schedule.
pub trait ScheduleSource: Send + Sync + 'static {
    /// First occurrence strictly after `after`; `None` if the schedule has ended.
    fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>>;

    /// Human-readable form of the schedule, used in logs and events.
    fn describe(&self) -> String;
}
