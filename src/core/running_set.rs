//! # RunningSet: the executors that are alive while availability is UP.
//!
//! Built from the full binding list in one go and torn down in one go; membership is
//! never edited in between. Owned exclusively by the supervisor.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::core::executor::{ExecutorParams, JobExecutor};
use crate::events::Bus;
use crate::jobs::ScheduleBinding;

/// Executors started for one UP period.
pub(crate) struct RunningSet {
    executors: Vec<JobExecutor>,
}

impl RunningSet {
    /// Creates one executor per binding and starts all of them.
    pub(crate) fn start(
        bindings: &[ScheduleBinding],
        params: ExecutorParams,
        bus: &Bus,
        semaphore: Option<&Arc<Semaphore>>,
    ) -> Self {
        let executors: Vec<JobExecutor> = bindings
            .iter()
            .map(|b| JobExecutor::new(b.clone(), params, bus.clone(), semaphore.cloned()))
            .collect();
        for exec in &executors {
            exec.start();
        }
        Self { executors }
    }

    /// Number of executors.
    pub(crate) fn len(&self) -> usize {
        self.executors.len()
    }

    /// Job names, one per executor (a job with several schedules appears several times).
    pub(crate) fn names(&self) -> Vec<String> {
        self.executors.iter().map(|e| e.name().to_string()).collect()
    }

    /// Cancels every executor, returning their join handles keyed by job name.
    pub(crate) fn cancel_all(self) -> Vec<(String, JoinHandle<()>)> {
        self.executors
            .iter()
            .filter_map(|e| e.stop().map(|join| (e.name().to_string(), join)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Periodic, Recorder, bind};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn one_executor_per_binding() {
        let bus = Bus::new(64);
        let user = Recorder::ok("addSampleUser");
        let bindings = vec![
            bind(user.clone(), Periodic::every(Duration::from_secs(10))),
            bind(user, Periodic::every(Duration::from_secs(60))),
            bind(
                Recorder::ok("addSampleVideo"),
                Periodic::every(Duration::from_secs(30)),
            ),
        ];

        let set = RunningSet::start(&bindings, ExecutorParams::default(), &bus, None);
        assert_eq!(set.len(), 3);
        assert_eq!(
            set.names(),
            vec!["addSampleUser", "addSampleUser", "addSampleVideo"]
        );

        let joins = set.cancel_all();
        assert_eq!(joins.len(), 3);
        for (_, join) in joins {
            join.await.unwrap();
        }
    }
}
