//! Error types used by the seedvisor runtime and jobs.
//!
//! This module defines the error enums shared across the crate:
//!
//! - [`RuntimeError`]: configuration faults and failures of the supervisor itself.
//! - [`JobError`]: errors raised by a single job invocation.
//! - [`RetryError`]: outcome of a [`RetryRunner`](crate::RetryRunner) that did not succeed.
//! - [`AggregateError`]: several independent failures collected from a concurrent batch.
//!
//! Enums provide helper methods (`as_label`, `as_message`) for logging.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Boxed, thread-safe error used where causes are heterogeneous.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// # Errors produced by the seedvisor runtime.
///
/// Configuration errors (`UnknownJob`, `ScheduleParse`, `Protocol`, `Config`) are fatal
/// and surface at load or transition time; they are never retried.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// A schedule names a job that is not present in the registry.
    #[error("could not find a job named '{job}' in the registry")]
    UnknownJob {
        /// The unresolved job name.
        job: String,
    },

    /// A configured schedule expression could not be parsed.
    #[error("error parsing '{job}' schedule '{expression}': {reason}")]
    ScheduleParse {
        /// Job the schedule belongs to.
        job: String,
        /// The offending expression.
        expression: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// A connectivity or availability value outside the known set was observed.
    #[error("unrecognized availability value {value}")]
    Protocol {
        /// The raw value as received.
        value: i64,
    },

    /// `start()` was called outside of a tokio runtime, so monitoring cannot be established.
    #[error("supervisor must be started from within a tokio runtime")]
    NoRuntime,

    /// Configuration could not be read or is invalid.
    #[error("invalid configuration: {reason}")]
    Config {
        /// What went wrong.
        reason: String,
    },

    /// Drain after stop exceeded its grace period; some executors were still running a job.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Jobs whose executors did not finish in time.
        stuck: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use seedvisor::RuntimeError;
    ///
    /// let err = RuntimeError::UnknownJob { job: "seedUsers".into() };
    /// assert_eq!(err.as_label(), "runtime_unknown_job");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::UnknownJob { .. } => "runtime_unknown_job",
            RuntimeError::ScheduleParse { .. } => "runtime_schedule_parse",
            RuntimeError::Protocol { .. } => "runtime_protocol",
            RuntimeError::NoRuntime => "runtime_no_runtime",
            RuntimeError::Config { .. } => "runtime_config",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::UnknownJob { job } => format!("unknown job {job}"),
            RuntimeError::ScheduleParse {
                job,
                expression,
                reason,
            } => format!("bad schedule job={job} expression={expression:?}: {reason}"),
            RuntimeError::Protocol { value } => format!("unrecognized value {value}"),
            RuntimeError::NoRuntime => "no tokio runtime".to_string(),
            RuntimeError::Config { reason } => format!("config: {reason}"),
            RuntimeError::GraceExceeded { grace, stuck } => {
                format!("grace exceeded after {grace:?}; stuck jobs={stuck:?}")
            }
        }
    }

    /// True for errors that indicate a configuration mistake rather than a runtime fault.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            RuntimeError::UnknownJob { .. }
                | RuntimeError::ScheduleParse { .. }
                | RuntimeError::Protocol { .. }
                | RuntimeError::Config { .. }
        )
    }
}

/// # Errors produced by a job invocation.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum JobError {
    /// Invocation exceeded its timeout duration.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Invocation failed; it may succeed if retried.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Invocation observed cancellation and stopped early.
    #[error("context cancelled")]
    Canceled,
}

impl JobError {
    /// Convenience constructor for [`JobError::Fail`].
    pub fn fail(error: impl fmt::Display) -> Self {
        JobError::Fail {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use seedvisor::JobError;
    /// use std::time::Duration;
    ///
    /// let err = JobError::Timeout { timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "job_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            JobError::Timeout { .. } => "job_timeout",
            JobError::Fail { .. } => "job_failed",
            JobError::Canceled => "job_canceled",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            JobError::Timeout { timeout } => format!("timeout: {timeout:?}"),
            JobError::Fail { error } => format!("error: {error}"),
            JobError::Canceled => "context cancelled".to_string(),
        }
    }
}

/// # Outcome of a retried operation that did not succeed.
#[derive(Error, Debug)]
pub enum RetryError<E> {
    /// Every attempt failed; carries the error of the last attempt.
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        /// Total attempts made (`max_retries + 1`).
        attempts: u32,
        /// The last underlying error.
        last: E,
    },

    /// Cancellation was observed before the next attempt could start.
    #[error("retry cancelled")]
    Canceled,
}

impl<E> RetryError<E> {
    /// Returns the last underlying error, if retries were exhausted.
    pub fn into_last(self) -> Option<E> {
        match self {
            RetryError::Exhausted { last, .. } => Some(last),
            RetryError::Canceled => None,
        }
    }

    /// True if the retry loop stopped because of cancellation.
    pub fn is_canceled(&self) -> bool {
        matches!(self, RetryError::Canceled)
    }
}

/// # Several independent failures from one concurrent batch.
///
/// Nested `AggregateError`s are flattened on construction, so [`errors`](Self::errors)
/// always lists leaf causes.
#[derive(Error, Debug)]
#[error("{} operations failed; see errors() for details", .errors.len())]
pub struct AggregateError {
    errors: Vec<BoxError>,
}

impl AggregateError {
    /// Collects `errors`, flattening any that are themselves aggregates.
    pub fn new(errors: impl IntoIterator<Item = BoxError>) -> Self {
        let mut flat = Vec::new();
        for err in errors {
            match err.downcast::<AggregateError>() {
                Ok(nested) => flat.extend(nested.errors),
                Err(leaf) => flat.push(leaf),
            }
        }
        Self { errors: flat }
    }

    /// Underlying causes.
    pub fn errors(&self) -> &[BoxError] {
        &self.errors
    }

    /// Consumes the aggregate, returning the underlying causes.
    pub fn into_errors(self) -> Vec<BoxError> {
        self.errors
    }

    /// Number of underlying causes.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// True if no causes were collected.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_flattens_nested() {
        let inner = AggregateError::new(vec![
            BoxError::from(JobError::fail("a")),
            BoxError::from(JobError::fail("b")),
        ]);
        let outer = AggregateError::new(vec![
            BoxError::from(inner),
            BoxError::from(JobError::fail("c")),
        ]);

        assert_eq!(outer.len(), 3);
        let messages: Vec<String> = outer.errors().iter().map(|e| e.to_string()).collect();
        assert_eq!(
            messages,
            vec![
                "execution failed: a",
                "execution failed: b",
                "execution failed: c"
            ]
        );
    }

    #[test]
    fn retry_error_keeps_last() {
        let err: RetryError<JobError> = RetryError::Exhausted {
            attempts: 4,
            last: JobError::fail("boom"),
        };
        assert_eq!(err.to_string(), "gave up after 4 attempts: execution failed: boom");
        assert!(matches!(err.into_last(), Some(JobError::Fail { .. })));
    }

    #[test]
    fn config_errors_are_flagged() {
        assert!(RuntimeError::UnknownJob { job: "x".into() }.is_config());
        assert!(!RuntimeError::NoRuntime.is_config());
    }
}
