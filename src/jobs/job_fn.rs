//! # Closure jobs.
//!
//! Most seeding jobs are a single async call, so [`JobFn`] lets a closure stand in for a
//! full [`Job`] impl. Each occurrence and each retry calls the closure again for a new
//! future; state that must survive between attempts goes in a captured `Arc`.
//!
//! ## Example
//! ```rust
//! use tokio_util::sync::CancellationToken;
//! use seedvisor::{JobFn, JobRef, JobError};
//!
//! let j: JobRef = JobFn::arc("seedVideos", |_ctx: CancellationToken| async move {
//!     Ok::<_, JobError>(())
//! });
//!
//! assert_eq!(j.name(), "seedVideos");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::JobError;
use crate::jobs::job::Job;

/// A named closure run as a [`Job`].
#[derive(Debug)]
pub struct JobFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> JobFn<F> {
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self { name: name.into(), f }
    }

    /// Same as [`new`](Self::new), ready to go into a [`JobRegistry`](crate::JobRegistry).
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> Job for JobFn<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), JobError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: CancellationToken) -> Result<(), JobError> {
        (self.f)(ctx).await
    }
}
