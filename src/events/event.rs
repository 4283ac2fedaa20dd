//! # Runtime events emitted by the supervisor, the availability monitor and job executors.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Supervisor events**: start/stop of the supervisor and of the running set
//! - **Availability events**: connectivity observations and coarse state transitions
//! - **Job events**: per-occurrence execution flow (scheduled, starting, failed, retried)
//! - **Shutdown/subscriber events**: drain outcome, subscriber overflow and panics
//!
//! The [`Event`] struct carries additional metadata such as timestamps, job name,
//! schedule expression, reasons, and retry delays.
//!
//! Receivers on different tasks can observe events out of publication order; sort by
//! `seq` when the exact order matters (it is process-wide and strictly increasing).
//!
//! ```rust
//! use std::time::Duration as D;
//! use seedvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::JobFailed)
//!     .with_job("seedUsers")
//!     .with_reason("insert rejected")
//!     .with_attempt(2)
//!     .with_delay(D::from_secs(4));
//!
//! assert_eq!(ev.kind, EventKind::JobFailed);
//! assert_eq!(ev.job.as_deref(), Some("seedUsers"));
//! assert_eq!(ev.reason.as_deref(), Some("insert rejected"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::monitor::{AvailabilityState, RawState};

static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Supervisor events ===
    /// Supervisor started; availability monitoring is wired.
    SupervisorStarted,

    /// Supervisor stopped; monitor stopped and running set discarded.
    SupervisorStopped,

    /// Services became available; a running set is being created.
    ///
    /// Sets:
    /// - `count`: number of executors started
    JobsStarting,

    /// A running set is being discarded.
    ///
    /// Sets:
    /// - `reason`: "services unavailable" or "supervisor stopped"
    /// - `count`: number of executors cancelled
    JobsStopping,

    // === Availability events ===
    /// The mapped availability state changed.
    ///
    /// Sets:
    /// - `availability`: new state
    /// - `job`: monitored service name
    AvailabilityChanged,

    /// A raw connectivity state was observed (may or may not change availability).
    ///
    /// Sets:
    /// - `raw`: observed raw state
    /// - `availability`: the state it maps to
    /// - `job`: monitored service name
    ConnectivityObserved,

    /// The service connection handle could not be acquired; will retry.
    ///
    /// Sets:
    /// - `job`: service name
    /// - `reason`: failure message
    /// - `delay_ms`: delay before the next acquire
    ServiceAcquireFailed,

    /// Watching connectivity failed; availability falls back to unknown.
    ///
    /// Sets:
    /// - `job`: service name
    /// - `reason`: failure message
    /// - `delay_ms`: delay before re-acquiring
    WatchFailed,

    // === Job events ===
    /// Next occurrence computed; the executor is waiting for it.
    ///
    /// Sets:
    /// - `job`, `schedule`
    /// - `delay_ms`: time until the occurrence
    OccurrenceScheduled,

    /// A job attempt is starting.
    ///
    /// Sets:
    /// - `job`, `schedule`
    /// - `attempt`: attempt number within the occurrence (1-based)
    JobStarting,

    /// A job attempt finished successfully.
    JobSucceeded,

    /// A job attempt failed.
    ///
    /// Sets:
    /// - `attempt`, `reason`
    JobFailed,

    /// A job attempt exceeded its timeout.
    ///
    /// Sets:
    /// - `attempt`, `timeout_ms`
    TimeoutHit,

    /// Next attempt scheduled after a failure.
    ///
    /// Sets:
    /// - `attempt`: failed attempt number
    /// - `delay_ms`: delay before the next attempt
    /// - `reason`: last failure message
    RetryScheduled,

    /// All attempts for one occurrence failed; the executor moves on to the next occurrence.
    ///
    /// Sets:
    /// - `attempt`: total attempts made
    /// - `reason`: last failure message
    RetryExhausted,

    /// The schedule has no further occurrences; the executor exits.
    ScheduleExhausted,

    /// An executor exited after cancellation.
    ExecutorStopped,

    // === Shutdown events ===
    /// A termination signal arrived (`reason` carries its name).
    ShutdownRequested,

    /// All executors finished within the grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some executors did not finish in time.
    GraceExceeded,

    // === Subscriber events ===
    /// A subscriber's `on_event` panicked.
    ///
    /// Sets:
    /// - `job`: subscriber name
    /// - `reason`: panic info
    SubscriberPanicked,

    /// An event could not be queued for a subscriber.
    ///
    /// Sets:
    /// - `job`: subscriber name
    /// - `reason`: "full" or "closed"
    SubscriberOverflow,
}

/// One runtime event. Which optional fields are filled depends on [`EventKind`].
#[derive(Clone, Debug)]
pub struct Event {
    /// Publication order across the process.
    pub seq: u64,
    /// When the event was created.
    pub at: SystemTime,
    pub kind: EventKind,

    /// Job name (or service/subscriber name for non-job events).
    pub job: Option<Arc<str>>,
    /// Schedule expression the event relates to.
    pub schedule: Option<Arc<str>>,
    /// Error text, signal name or drop reason.
    pub reason: Option<Arc<str>>,
    /// Attempt number (starting from 1).
    pub attempt: Option<u32>,
    /// Delay in milliseconds (compact).
    pub delay_ms: Option<u64>,
    /// Timeout in milliseconds (compact).
    pub timeout_ms: Option<u64>,
    /// Coarse availability state.
    pub availability: Option<AvailabilityState>,
    /// Raw connectivity state.
    pub raw: Option<RawState>,
    /// Item count (executors started/stopped).
    pub count: Option<usize>,
}

impl Event {
    /// Stamps a bare event of `kind`.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            job: None,
            schedule: None,
            reason: None,
            attempt: None,
            delay_ms: None,
            timeout_ms: None,
            availability: None,
            raw: None,
            count: None,
        }
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a job (or service) name.
    #[inline]
    pub fn with_job(mut self, job: impl Into<Arc<str>>) -> Self {
        self.job = Some(job.into());
        self
    }

    /// Attaches a schedule expression.
    #[inline]
    pub fn with_schedule(mut self, schedule: impl Into<Arc<str>>) -> Self {
        self.schedule = Some(schedule.into());
        self
    }

    /// Attaches the per-attempt timeout.
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(d.as_millis().min(u128::from(u64::MAX)) as u64);
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(d.as_millis().min(u128::from(u64::MAX)) as u64);
        self
    }

    /// Attaches an attempt number.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a coarse availability state.
    #[inline]
    pub fn with_availability(mut self, state: AvailabilityState) -> Self {
        self.availability = Some(state);
        self
    }

    /// Attaches a raw connectivity state.
    #[inline]
    pub fn with_raw(mut self, raw: RawState) -> Self {
        self.raw = Some(raw);
        self
    }

    /// Attaches an item count.
    #[inline]
    pub fn with_count(mut self, n: usize) -> Self {
        self.count = Some(n);
        self
    }

    /// `SubscriberOverflow` for `subscriber`.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_job(subscriber)
            .with_reason(reason)
    }

    /// `SubscriberPanicked` for `subscriber`.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_job(subscriber)
            .with_reason(info)
    }

    /// True for events describing subscriber delivery problems.
    #[inline]
    pub fn is_subscriber_fault(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_monotonic() {
        let a = Event::new(EventKind::JobStarting);
        let b = Event::new(EventKind::JobSucceeded);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn builders_set_fields() {
        let ev = Event::new(EventKind::AvailabilityChanged)
            .with_job("video-catalog")
            .with_availability(AvailabilityState::Up)
            .with_delay(Duration::from_millis(1500));
        assert_eq!(ev.availability, Some(AvailabilityState::Up));
        assert_eq!(ev.delay_ms, Some(1500));
        assert!(!ev.is_subscriber_fault());
        assert!(Event::subscriber_overflow("log", "full").is_subscriber_fault());
    }
}
