//! # LogWriter: renders runtime events through `tracing`
//!
//! Severity mapping:
//! - `debug`: retry detail, raw connectivity observations, occurrence scheduling
//! - `info`: lifecycle (supervisor, running set, availability, job success)
//! - `warn`: transient dependency faults, subscriber overflow
//! - `error`: retry exhaustion, subscriber panics, grace exceeded
//!
//! Typical output:
//! ```text
//! INFO availability changed service="video-catalog" state=Up
//! INFO services available, starting scheduled jobs count=3
//! DEBUG retry scheduled job="seedUsers" attempt=1 delay_ms=1000 err="connection refused"
//! ERROR job did not successfully execute job="seedUsers" attempts=11 err="connection refused"
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Writes every event as a `tracing` record, one line per event.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let job = e.job.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::SupervisorStarted => info!("started supervisor"),
            EventKind::SupervisorStopped => info!("stopped supervisor"),
            EventKind::JobsStarting => {
                info!(count = ?e.count, "services available, starting scheduled jobs")
            }
            EventKind::JobsStopping => {
                info!(count = ?e.count, "{reason}, stopping scheduled jobs")
            }
            EventKind::AvailabilityChanged => {
                info!(service = job, state = ?e.availability, "availability changed")
            }
            EventKind::ConnectivityObserved => {
                debug!(service = job, raw = ?e.raw, state = ?e.availability, "connectivity observed")
            }
            EventKind::ServiceAcquireFailed => {
                warn!(service = job, delay_ms = ?e.delay_ms, err = reason, "could not acquire service connection")
            }
            EventKind::WatchFailed => {
                warn!(service = job, delay_ms = ?e.delay_ms, err = reason, "connectivity watch failed")
            }
            EventKind::OccurrenceScheduled => {
                debug!(job, schedule = ?e.schedule, delay_ms = ?e.delay_ms, "next occurrence scheduled")
            }
            EventKind::JobStarting => debug!(job, attempt = ?e.attempt, "job starting"),
            EventKind::JobSucceeded => info!(job, attempt = ?e.attempt, "job succeeded"),
            EventKind::JobFailed => debug!(job, attempt = ?e.attempt, err = reason, "job failed"),
            EventKind::TimeoutHit => {
                debug!(job, attempt = ?e.attempt, timeout_ms = ?e.timeout_ms, "job timed out")
            }
            EventKind::RetryScheduled => {
                debug!(job, attempt = ?e.attempt, delay_ms = ?e.delay_ms, err = reason, "retry scheduled")
            }
            EventKind::RetryExhausted => {
                error!(job, attempts = ?e.attempt, err = reason, "job did not successfully execute")
            }
            EventKind::ScheduleExhausted => info!(job, schedule = ?e.schedule, "schedule has no further occurrences"),
            EventKind::ExecutorStopped => debug!(job, schedule = ?e.schedule, "executor stopped"),
            EventKind::ShutdownRequested => info!("shutdown requested"),
            EventKind::AllStoppedWithin => info!("all jobs stopped within grace"),
            EventKind::GraceExceeded => error!(err = reason, "grace exceeded"),
            EventKind::SubscriberOverflow => {
                warn!(subscriber = job, reason, "subscriber overflow")
            }
            EventKind::SubscriberPanicked => {
                error!(subscriber = job, info = reason, "subscriber panicked")
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
