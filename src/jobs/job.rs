//! # Job abstraction.
//!
//! A [`Job`] is the unit the supervisor schedules. It has a stable [`name`](Job::name)
//! (the key used in schedule configuration) and an async [`run`](Job::run) method that
//! receives a [`CancellationToken`].
//!
//! Cancellation is cooperative: an in-flight invocation is allowed to finish. Jobs that
//! do long I/O should check the token and return [`JobError::Canceled`] promptly.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::JobError;

/// # Asynchronous, cancelable job.
///
/// # Example
/// ```
/// use tokio_util::sync::CancellationToken;
/// use async_trait::async_trait;
/// use seedvisor::{Job, JobError};
///
/// struct SeedUsers;
///
/// #[async_trait]
/// impl Job for SeedUsers {
///     fn name(&self) -> &str { "seedUsers" }
///
///     async fn run(&self, ctx: CancellationToken) -> Result<(), JobError> {
///         if ctx.is_cancelled() {
///             return Err(JobError::Canceled);
///         }
///         // insert a user...
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Job: Send + Sync + 'static {
    /// Returns the stable job name.
    fn name(&self) -> &str;

    /// Executes one invocation.
    async fn run(&self, ctx: CancellationToken) -> Result<(), JobError>;
}

/// Shared handle to a job.
pub type JobRef = Arc<dyn Job>;
