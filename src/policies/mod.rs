//! Retry policies.
//!
//! This module groups the knobs that control **how often** an operation is retried
//! and **how long** to wait between attempts.
//!
//! ## Contents
//! - [`RetryPolicy`]  retry-count budget (attempts = `max_retries + 1`)
//! - [`BackoffPolicy`] how retry delays evolve (base / mode / max)
//! - [`BackoffMode`]  fixed or exponential growth
//!
//! ## Quick wiring
//! ```text
//! SupervisorConfig { job_retry: RetryPolicy, .. }
//!      └─► core::executor::JobExecutor builds a RetryRunner per occurrence:
//!           - max_retries bounds the attempts
//!           - backoff.next(retry_index) schedules the next attempt
//! ```
//!
//! ## Defaults
//! - `RetryPolicy::default()` → 10 retries, exponential, base=2s.
//! - `BackoffPolicy::default()` → base=2s, exponential, max=1h.

mod backoff;
mod retry;

pub use backoff::{BackoffMode, BackoffPolicy};
pub use retry::RetryPolicy;
