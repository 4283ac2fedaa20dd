//! # Job abstractions, registry and schedule bindings.
//!
//! - [`Job`] - trait for implementing async cancelable jobs
//! - [`JobFn`] - function-backed job implementation
//! - [`JobRef`] - shared reference to a job (`Arc<dyn Job>`)
//! - [`JobRegistry`] - name → job table, read-only after load
//! - [`ScheduleBinding`] - one (job, schedule) pair; [`load_bindings`] builds them from config

mod binding;
mod job;
mod job_fn;
mod registry;

pub use binding::{ScheduleBinding, ScheduleConfig, load_bindings};
pub use job::{Job, JobRef};
pub use job_fn::JobFn;
pub use registry::JobRegistry;
