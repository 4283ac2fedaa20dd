//! # Run a single attempt of a job invocation.
//!
//! Executes one attempt of a [`Job`] with an optional timeout and publishes its
//! lifecycle to the [`Bus`].
//!
//! ## Event flow
//!
//! ```text
//! JobStarting ─► job.run(child) ─► Ok(())         ─► JobSucceeded
//!                               ─► Err(Canceled)  ─► (nothing; executor is stopping)
//!                               ─► Err(Fail)      ─► JobFailed
//!                timeout ─► cancel child ─► TimeoutHit ─► JobFailed
//! ```
//!
//! ## Rules
//! - Derives a **child token** per attempt; cancelling it never affects the executor.
//! - `TimeoutHit` is published **in addition to** `JobFailed`.
//! - A timed-out attempt is a regular failure and is retried like any other.

use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::error::JobError;
use crate::events::{Bus, Event, EventKind};
use crate::jobs::Job;

/// Executes attempt number `attempt` of `job`, publishing lifecycle events to `bus`.
///
/// `schedule` is the binding's label, attached to every event.
pub async fn run_once<J: Job + ?Sized>(
    job: &J,
    parent: &CancellationToken,
    timeout: Option<Duration>,
    attempt: u32,
    bus: &Bus,
    schedule: &Arc<str>,
) -> Result<(), JobError> {
    let child = parent.child_token();
    bus.publish(
        Event::new(EventKind::JobStarting)
            .with_job(job.name())
            .with_schedule(Arc::clone(schedule))
            .with_attempt(attempt),
    );

    let res = match timeout.filter(|d| *d > Duration::ZERO) {
        Some(dur) => match time::timeout(dur, job.run(child.clone())).await {
            Ok(r) => r,
            Err(_elapsed) => {
                child.cancel();
                bus.publish(
                    Event::new(EventKind::TimeoutHit)
                        .with_job(job.name())
                        .with_schedule(Arc::clone(schedule))
                        .with_timeout(dur)
                        .with_attempt(attempt),
                );
                Err(JobError::Timeout { timeout: dur })
            }
        },
        None => job.run(child.clone()).await,
    };

    match &res {
        Ok(()) => bus.publish(
            Event::new(EventKind::JobSucceeded)
                .with_job(job.name())
                .with_schedule(Arc::clone(schedule))
                .with_attempt(attempt),
        ),
        Err(JobError::Canceled) => {}
        Err(e) => bus.publish(
            Event::new(EventKind::JobFailed)
                .with_job(job.name())
                .with_schedule(Arc::clone(schedule))
                .with_attempt(attempt)
                .with_reason(e.to_string()),
        ),
    }
    res
}
