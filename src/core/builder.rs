use std::sync::Arc;

use crate::{
    config::SupervisorConfig,
    error::RuntimeError,
    jobs::{JobRegistry, ScheduleBinding, ScheduleConfig, load_bindings},
    monitor::ServiceLocator,
    subscribers::Subscribe,
};

use super::supervisor::Supervisor;

/// Builder for constructing a [`Supervisor`].
///
/// Schedules are resolved against the registry and parsed in [`build`](Self::build),
/// so configuration mistakes surface before anything runs.
pub struct SupervisorBuilder {
    cfg: SupervisorConfig,
    registry: JobRegistry,
    schedules: ScheduleConfig,
    bindings: Vec<ScheduleBinding>,
    locator: Option<Arc<dyn ServiceLocator>>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl SupervisorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: SupervisorConfig) -> Self {
        Self {
            cfg,
            registry: JobRegistry::new(),
            schedules: ScheduleConfig::new(),
            bindings: Vec::new(),
            locator: None,
            subscribers: Vec::new(),
        }
    }

    /// Sets the jobs that schedules may refer to.
    pub fn with_registry(mut self, registry: JobRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Sets the job name → schedule expressions mapping.
    pub fn with_schedules(mut self, schedules: ScheduleConfig) -> Self {
        self.schedules = schedules;
        self
    }

    /// Adds pre-built bindings (custom [`ScheduleSource`](crate::ScheduleSource)s).
    pub fn with_bindings(mut self, bindings: Vec<ScheduleBinding>) -> Self {
        self.bindings.extend(bindings);
        self
    }

    /// Sets how the monitored service's connection is obtained.
    pub fn with_locator(mut self, locator: Arc<dyn ServiceLocator>) -> Self {
        self.locator = Some(locator);
        self
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (availability, job lifecycle, failures)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Validates schedules and returns the Supervisor instance.
    ///
    /// Fails with [`RuntimeError::UnknownJob`] or [`RuntimeError::ScheduleParse`] for a
    /// bad schedule entry, and [`RuntimeError::Config`] if no locator was set.
    pub fn build(self) -> Result<Arc<Supervisor>, RuntimeError> {
        let locator = self.locator.ok_or_else(|| RuntimeError::Config {
            reason: "no service locator configured".to_string(),
        })?;

        let mut bindings = load_bindings(&self.schedules, &self.registry)?;
        bindings.extend(self.bindings);
        tracing::debug!(
            service = %self.cfg.service,
            bindings = bindings.len(),
            "supervisor built"
        );

        Ok(Arc::new(Supervisor::new_internal(
            self.cfg,
            bindings,
            locator,
            self.subscribers,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobFn;
    use crate::monitor::RawState;
    use crate::testing::{FakeChannel, FakeLocator};
    use crate::JobError;
    use tokio_util::sync::CancellationToken;

    fn registry() -> JobRegistry {
        JobRegistry::new().with(JobFn::arc("addSampleUser", |_ctx: CancellationToken| async {
            Ok::<_, JobError>(())
        }))
    }

    fn schedules(name: &str, expr: &str) -> ScheduleConfig {
        let mut s = ScheduleConfig::new();
        s.insert(name.to_string(), vec![expr.to_string()]);
        s
    }

    #[test]
    fn build_validates_schedules_eagerly() {
        let locator = FakeLocator::ready(FakeChannel::new(RawState::Idle));

        let ok = SupervisorBuilder::new(SupervisorConfig::default())
            .with_registry(registry())
            .with_schedules(schedules("addSampleUser", "every 10 seconds"))
            .with_locator(locator.clone())
            .build()
            .unwrap();
        assert_eq!(ok.bindings().len(), 1);

        let unknown = SupervisorBuilder::new(SupervisorConfig::default())
            .with_registry(registry())
            .with_schedules(schedules("addSampleUsr", "every 10 seconds"))
            .with_locator(locator.clone())
            .build();
        assert!(matches!(unknown, Err(RuntimeError::UnknownJob { .. })));

        let malformed = SupervisorBuilder::new(SupervisorConfig::default())
            .with_registry(registry())
            .with_schedules(schedules("addSampleUser", "every blue moon"))
            .with_locator(locator)
            .build();
        assert!(matches!(malformed, Err(RuntimeError::ScheduleParse { .. })));
    }

    #[test]
    fn build_requires_locator() {
        let err = SupervisorBuilder::new(SupervisorConfig::default())
            .build()
            .err()
            .unwrap();
        assert!(err.is_config());
    }
}
