//! # RetryRunner: bounded retry around a fallible async operation.
//!
//! Runs an operation up to `max_retries + 1` times, sleeping between attempts as
//! dictated by the [`RetryPolicy`]'s backoff. The sleep is raced against a
//! [`CancellationToken`], so a cancelled caller never waits out a long delay.
//!
//! ## Flow
//! ```text
//! loop {
//!   ├─► token cancelled?            ─► Err(Canceled)
//!   ├─► op(attempt)
//!   │     ├─► Ok(v)                 ─► return Ok(v)
//!   │     └─► Err(e)
//!   │           ├─► budget spent    ─► Err(Exhausted { attempts, last: e })
//!   │           ├─► token cancelled ─► Err(Canceled)
//!   │           ├─► on_retry(&state, &e)
//!   │           └─► sleep(backoff.next(retry_count))   (cancellable)
//! }
//! ```
//!
//! ## Rules
//! - The final error is the **last underlying error**; intermediate errors are only logged.
//! - No jitter and no total-time budget.
//! - [`RetryState`] lives for one `run` call and is never persisted.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::error::RetryError;
use crate::policies::RetryPolicy;

/// Ephemeral bookkeeping of one retry loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryState {
    /// Failed attempts so far.
    pub retry_count: u32,
    /// Delay before the next attempt.
    pub next_delay: Duration,
}

/// Generic bounded-retry wrapper.
///
/// # Example
/// ```rust
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
/// use seedvisor::{BackoffPolicy, RetryPolicy, RetryRunner};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let runner = RetryRunner::new(RetryPolicy::new(2, BackoffPolicy::fixed(Duration::from_millis(1))));
/// let token = CancellationToken::new();
///
/// let res = runner
///     .run(&token, |attempt| async move {
///         if attempt < 3 { Err("not yet") } else { Ok(attempt) }
///     })
///     .await;
/// assert_eq!(res.unwrap(), 3);
/// # }
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct RetryRunner {
    policy: RetryPolicy,
}

impl RetryRunner {
    /// Creates a runner with the given budget and backoff.
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// The policy this runner applies.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs `op` until it succeeds, the budget is spent, or `token` is cancelled.
    ///
    /// `op` receives the 1-based attempt number.
    pub async fn run<T, E, F, Fut>(
        &self,
        token: &CancellationToken,
        op: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        self.run_with(token, op, |_, _| {}).await
    }

    /// Same as [`run`](Self::run), calling `on_retry` after every failure that will be retried.
    pub async fn run_with<T, E, F, Fut, H>(
        &self,
        token: &CancellationToken,
        mut op: F,
        mut on_retry: H,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
        H: FnMut(&RetryState, &E),
    {
        let mut state = RetryState {
            retry_count: 0,
            next_delay: Duration::ZERO,
        };

        loop {
            if token.is_cancelled() {
                return Err(RetryError::Canceled);
            }

            let attempt = state.retry_count + 1;
            let err = match op(attempt).await {
                Ok(v) => return Ok(v),
                Err(e) => e,
            };

            if state.retry_count >= self.policy.max_retries {
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: err,
                });
            }
            if token.is_cancelled() {
                return Err(RetryError::Canceled);
            }

            state.next_delay = self.policy.backoff.next(state.retry_count);
            tracing::debug!(
                attempt,
                delay_ms = state.next_delay.as_millis() as u64,
                error = %err,
                "attempt failed; retrying"
            );
            on_retry(&state, &err);
            drop(err);

            tokio::select! {
                biased;
                _ = token.cancelled() => return Err(RetryError::Canceled),
                _ = time::sleep(state.next_delay) => {}
            }
            state.retry_count += 1;
        }
    }
}
