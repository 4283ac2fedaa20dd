//! # seedvisor
//!
//! **Seedvisor** runs named, independently scheduled recurring jobs against a remote
//! service and pauses or resumes all of them as that service's availability changes.
//!
//! Three pieces cooperate:
//! - an [`AvailabilityMonitor`] that turns raw connectivity signals into a coarse
//!   {UNKNOWN, UP, DOWN} state and notifies on every actual change;
//! - a [`Supervisor`] that starts one [`JobExecutor`] per (job, schedule) binding when
//!   the service goes UP and cancels them all when it leaves UP;
//! - per-binding executors that wait for the next occurrence and run the job under a
//!   [`RetryRunner`], cancellable at every suspension point.
//!
//! ## Architecture
//! ```text
//!            ServiceLocator ──► ConnectionHandle (get_state / watch)
//!                                      │
//!                                      ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │ AvailabilityMonitor                                              │
//! │  idle, connecting ─► UNKNOWN   transient/fatal failure ─► DOWN   │
//! │  ready ─► UP                   (notify only on mapped change)    │
//! └───────────────────────────────┬──────────────────────────────────┘
//!                                 │ Transition { state, ack }   (rendezvous)
//!                                 ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │ Supervisor   Stopped ─► Starting ◄──► Running                    │
//! │  UP           ─► RunningSet::start(bindings)                     │
//! │  DOWN/UNKNOWN ─► RunningSet::cancel_all()                        │
//! └──────┬──────────────────┬──────────────────┬─────────────────────┘
//!        ▼                  ▼                  ▼
//!  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐
//!  │ JobExecutor │   │ JobExecutor │   │ JobExecutor │   one per binding
//!  │ next_after  │   │ next_after  │   │ next_after  │
//!  │ sleep       │   │ sleep       │   │ sleep       │
//!  │ RetryRunner │   │ RetryRunner │   │ RetryRunner │
//!  └──────┬──────┘   └──────┬──────┘   └──────┬──────┘
//!         └─────── publish(Event) ────────────┘
//!                          ▼
//!              Bus (broadcast) ─► SubscriberSet ─► LogWriter, custom subscribers
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                              |
//! |-------------------|---------------------------------------------------------------|-------------------------------------------------|
//! | **Supervision**   | Availability-driven start/stop of all executors, drain.       | [`Supervisor`], [`SupervisorBuilder`], [`Phase`]|
//! | **Availability**  | Raw connectivity to coarse state, change notifications.       | [`AvailabilityMonitor`], [`ServiceLocator`]     |
//! | **Jobs**          | Jobs as trait objects or closures, validated registry.        | [`Job`], [`JobFn`], [`JobRegistry`]             |
//! | **Schedules**     | Interval text and cron, or any custom source.                 | [`Schedule`], [`ScheduleSource`]                |
//! | **Retry**         | Bounded retry with fixed or exponential backoff.              | [`RetryRunner`], [`RetryPolicy`]                |
//! | **Batches**       | Wait for all operations, collect every failure.               | [`when_all`], [`AggregateError`]                |
//! | **Subscriber API**| Hook into lifecycle events (logging, metrics, ...).           | [`Subscribe`], [`LogWriter`]                    |
//! | **Configuration** | Runtime knobs and JSON file.                                  | [`SupervisorConfig`], [`FileConfig`]            |
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use seedvisor::{BackoffPolicy, JobError, RetryPolicy, RetryRunner};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let runner = RetryRunner::new(RetryPolicy::new(
//!         3,
//!         BackoffPolicy::fixed(Duration::from_millis(10)),
//!     ));
//!     let token = CancellationToken::new();
//!
//!     let res: Result<(), _> = runner
//!         .run(&token, |_attempt| async { Err(JobError::fail("remote refused")) })
//!         .await;
//!
//!     let err = res.unwrap_err();
//!     assert_eq!(err.to_string(), "gave up after 4 attempts: execution failed: remote refused");
//! }
//! ```

mod config;
mod core;
mod error;
mod events;
mod jobs;
mod monitor;
mod policies;
mod schedule;
mod subscribers;

#[cfg(test)]
mod testing;

// ---- Public re-exports ----

pub use config::{FileConfig, ServiceSection, StartupSection, SupervisorConfig, SupervisorSection};
pub use core::{
    ExecutorParams, JobExecutor, Phase, RetryRunner, RetryState, Supervisor, SupervisorBuilder,
    wait_for_shutdown_signal, when_all,
};
pub use error::{AggregateError, BoxError, JobError, RetryError, RuntimeError};
pub use events::{Bus, Event, EventKind};
pub use jobs::{Job, JobFn, JobRef, JobRegistry, ScheduleBinding, ScheduleConfig, load_bindings};
pub use monitor::{
    AvailabilityMonitor, AvailabilityState, ConnectionError, ConnectionHandle, ConnectionRef,
    RawState, ServiceLocator, StaticLocator, TcpChannel, TcpChannelConfig, Transition, Transitions,
};
pub use policies::{BackoffMode, BackoffPolicy, RetryPolicy};
pub use schedule::{Schedule, ScheduleSource};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
