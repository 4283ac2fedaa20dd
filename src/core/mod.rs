//! Runtime core: retry, scheduling loops and availability-driven orchestration.
//!
//! The public entry point is [`Supervisor`] (built with [`SupervisorBuilder`]);
//! [`RetryRunner`], [`when_all`] and [`JobExecutor`] are usable on their own.
//!
//! Internal modules:
//! - [`retry`]: bounded retry with cancellable backoff;
//! - [`aggregate`]: wait-for-all over a concurrent batch;
//! - [`runner`]: executes one attempt with timeout and event publishing;
//! - [`executor`]: runs one (job, schedule) binding until cancelled;
//! - [`running_set`]: the executors alive while availability is UP;
//! - [`supervisor`]: reacts to availability transitions, drains on shutdown;
//! - [`builder`]: validates configuration and assembles a supervisor;
//! - [`shutdown`]: termination signal handling.

mod aggregate;
mod builder;
mod executor;
mod retry;
mod runner;
mod running_set;
mod shutdown;
mod supervisor;

pub use aggregate::when_all;
pub use builder::SupervisorBuilder;
pub use executor::{ExecutorParams, JobExecutor};
pub use retry::{RetryRunner, RetryState};
pub use shutdown::wait_for_shutdown_signal;
pub use supervisor::{Phase, Supervisor};
