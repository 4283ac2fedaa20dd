//! # Schedule bindings.
//!
//! A [`ScheduleBinding`] pairs one resolved job with one schedule. A job listed with
//! several expressions gets one binding per expression; each binding later becomes
//! exactly one [`JobExecutor`](crate::JobExecutor).
//!
//! ```text
//! { "seedUsers": ["every 10 seconds", "0 0 * * *"], "seedVideos": ["every minute"] }
//!     └─► load_bindings ─► [seedUsers/every 10 seconds, seedUsers/0 0 * * *, seedVideos/every minute]
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::RuntimeError;
use crate::jobs::{JobRef, JobRegistry};
use crate::schedule::{Schedule, ScheduleSource};

/// Configuration shape: job name → schedule expressions.
pub type ScheduleConfig = BTreeMap<String, Vec<String>>;

/// Immutable (job, schedule) pair.
#[derive(Clone)]
pub struct ScheduleBinding {
    job: JobRef,
    schedule: Arc<dyn ScheduleSource>,
    label: Arc<str>,
}

impl ScheduleBinding {
    /// Binds `job` to `schedule`.
    pub fn new(job: JobRef, schedule: Arc<dyn ScheduleSource>) -> Self {
        let label = schedule.describe().into();
        Self {
            job,
            schedule,
            label,
        }
    }

    /// The resolved job.
    pub fn job(&self) -> &JobRef {
        &self.job
    }

    /// Job name.
    pub fn name(&self) -> &str {
        self.job.name()
    }

    /// The occurrence source.
    pub fn schedule(&self) -> &Arc<dyn ScheduleSource> {
        &self.schedule
    }

    /// Schedule description, shared cheaply with events.
    pub fn label(&self) -> &Arc<str> {
        &self.label
    }
}

impl std::fmt::Debug for ScheduleBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduleBinding")
            .field("job", &self.name())
            .field("schedule", &self.label)
            .finish()
    }
}

/// Parses every expression and resolves every job name.
///
/// Fails on the first unknown job or malformed expression.
pub fn load_bindings(
    config: &ScheduleConfig,
    registry: &JobRegistry,
) -> Result<Vec<ScheduleBinding>, RuntimeError> {
    let mut bindings = Vec::new();
    for (name, expressions) in config {
        let job = registry.lookup(name)?;
        for expression in expressions {
            let schedule =
                Schedule::parse(expression).map_err(|reason| RuntimeError::ScheduleParse {
                    job: name.clone(),
                    expression: expression.clone(),
                    reason,
                })?;
            tracing::debug!(job = %name, schedule = %expression, "loaded job schedule");
            bindings.push(ScheduleBinding::new(Arc::clone(&job), Arc::new(schedule)));
        }
    }
    Ok(bindings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JobError;
    use crate::jobs::JobFn;
    use tokio_util::sync::CancellationToken;

    fn registry() -> JobRegistry {
        ["seedUsers", "seedVideos"]
            .into_iter()
            .map(|name| -> JobRef {
                JobFn::arc(name, |_ctx: CancellationToken| async { Ok::<_, JobError>(()) })
            })
            .collect()
    }

    fn config(entries: &[(&str, &[&str])]) -> ScheduleConfig {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
            .collect()
    }

    #[test]
    fn one_binding_per_expression() {
        let cfg = config(&[
            ("seedUsers", &["every 10 seconds", "0 0 * * *"]),
            ("seedVideos", &["every minute"]),
        ]);
        let bindings = load_bindings(&cfg, &registry()).unwrap();

        let pairs: Vec<(&str, &str)> = bindings.iter().map(|b| (b.name(), &**b.label())).collect();
        assert_eq!(
            pairs,
            vec![
                ("seedUsers", "every 10 seconds"),
                ("seedUsers", "0 0 * * *"),
                ("seedVideos", "every minute"),
            ]
        );
    }

    #[test]
    fn unknown_job_is_fatal() {
        let cfg = config(&[("seedUser", &["every minute"])]);
        let err = load_bindings(&cfg, &registry()).unwrap_err();
        assert!(matches!(err, RuntimeError::UnknownJob { job } if job == "seedUser"));
    }

    #[test]
    fn malformed_expression_is_fatal() {
        let cfg = config(&[("seedVideos", &["every fortnight"])]);
        let err = load_bindings(&cfg, &registry()).unwrap_err();
        assert_eq!(err.as_label(), "runtime_schedule_parse");
        assert!(err.to_string().contains("every fortnight"));
    }
}
