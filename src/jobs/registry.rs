//! # Job registry.
//!
//! Maps job names to implementations. Populated once at process start and read-only
//! afterwards; schedule bindings resolve against it eagerly, so a typo in configuration
//! fails at load time instead of at the first occurrence.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::RuntimeError;
use crate::jobs::JobRef;

/// Name → job lookup table.
#[derive(Clone, Default)]
pub struct JobRegistry {
    jobs: HashMap<String, JobRef>,
}

impl JobRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `job` under its own name, replacing any previous entry.
    pub fn register(&mut self, job: JobRef) -> &mut Self {
        self.jobs.insert(job.name().to_string(), job);
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, job: JobRef) -> Self {
        self.register(job);
        self
    }

    /// Looks up a job by name.
    pub fn lookup(&self, name: &str) -> Result<JobRef, RuntimeError> {
        self.jobs
            .get(name)
            .map(Arc::clone)
            .ok_or_else(|| RuntimeError::UnknownJob {
                job: name.to_string(),
            })
    }

    /// Sorted list of registered names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.jobs.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Number of registered jobs.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

impl FromIterator<JobRef> for JobRegistry {
    fn from_iter<I: IntoIterator<Item = JobRef>>(iter: I) -> Self {
        let mut registry = Self::new();
        for job in iter {
            registry.register(job);
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JobError;
    use crate::jobs::JobFn;
    use tokio_util::sync::CancellationToken;

    fn noop(name: &'static str) -> JobRef {
        JobFn::arc(name, |_ctx: CancellationToken| async { Ok::<_, JobError>(()) })
    }

    #[test]
    fn lookup_hits_and_misses() {
        let registry: JobRegistry = [noop("seedUsers"), noop("seedVideos")].into_iter().collect();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.lookup("seedUsers").unwrap().name(), "seedUsers");
        assert!(matches!(
            registry.lookup("seedComments"),
            Err(RuntimeError::UnknownJob { job }) if job == "seedComments"
        ));
        assert_eq!(registry.names(), vec!["seedUsers", "seedVideos"]);
    }
}
