//! # Supervisor: availability-driven orchestration of job executors.
//!
//! The [`Supervisor`] owns the event bus, the [`AvailabilityMonitor`] for the dependent
//! service, and at most one [`RunningSet`] of executors. Availability transitions are
//! the **only** thing that creates or destroys the running set.
//!
//! ## Phases
//! ```text
//!            start()                    UP
//! Stopped ───────────► Starting ───────────────► Running
//!    ▲                    ▲                          │
//!    │ stop()             └──── DOWN / UNKNOWN ──────┘
//!    └──────────────────── (from any phase)
//! ```
//!
//! ## Architecture
//! ```text
//! start():
//!   monitor.start() ─► Transitions (capacity 1, acked)
//!                          │
//!                   listener task
//!                          ├─► UP            ─► RunningSet::start(bindings)   (one executor each)
//!                          ├─► DOWN/UNKNOWN  ─► RunningSet::cancel_all()      (handles kept for drain)
//!                          └─► transition.ack() ─► monitor watches again
//!
//!   Bus.subscribe() ─► fan-out task ─► SubscriberSet::emit(&Event)
//!
//! shutdown(grace):
//!   stop() ─► monitor.stop(), cancel running set
//!          ─► when_all(executor + monitor handles) within grace
//!                ├─ Ok       → AllStoppedWithin
//!                └─ timeout  → GraceExceeded(stuck jobs)
//!          ─► flush subscribers
//! ```
//!
//! ## Rules
//! - `start()`/`stop()` are idempotent and non-blocking.
//! - Reactions are serialized: one transition is fully handled (and acked) before the
//!   monitor delivers the next.
//! - The supervisor never reacts to job outcomes; executors handle their own retries.
//!
//! ## Example
//! ```rust,no_run
//! use std::collections::HashMap;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use seedvisor::{
//!     JobError, JobFn, JobRegistry, LogWriter, ScheduleConfig, StaticLocator,
//!     SupervisorBuilder, SupervisorConfig, TcpChannelConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = JobRegistry::new().with(JobFn::arc("seedUsers", |_ctx: CancellationToken| async {
//!         Ok::<_, JobError>(())
//!     }));
//!     let mut schedules = ScheduleConfig::new();
//!     schedules.insert("seedUsers".into(), vec!["every 10 seconds".into()]);
//!
//!     let mut addresses = HashMap::new();
//!     addresses.insert("video-catalog".to_string(), "127.0.0.1:50101".to_string());
//!
//!     let sup = SupervisorBuilder::new(SupervisorConfig::default())
//!         .with_registry(registry)
//!         .with_schedules(schedules)
//!         .with_locator(Arc::new(StaticLocator::new(addresses, TcpChannelConfig::default())))
//!         .with_subscribers(vec![Arc::new(LogWriter)])
//!         .build()?;
//!
//!     sup.run_until_signal().await?;
//!     Ok(())
//! }
//! ```

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{Semaphore, broadcast};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::config::SupervisorConfig;
use crate::core::aggregate::when_all;
use crate::core::executor::ExecutorParams;
use crate::core::running_set::RunningSet;
use crate::core::shutdown;
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::jobs::ScheduleBinding;
use crate::monitor::{AvailabilityMonitor, AvailabilityState, ServiceLocator, Transitions};
use crate::subscribers::{Subscribe, SubscriberSet};

/// Supervisor lifecycle phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Not started; no monitor, no executors.
    Stopped,
    /// Monitor running; no running set.
    Starting,
    /// Monitor running; running set active.
    Running,
}

/// A spawned background task and its cancellation token.
struct Background {
    token: CancellationToken,
    join: JoinHandle<()>,
}

/// Mutable state, guarded by one mutex so every reaction is serialized.
struct State {
    phase: Phase,
    generation: u64,
    running: Option<RunningSet>,
    listener: Option<Background>,
    fanout: Option<Background>,
    draining: Vec<(String, JoinHandle<()>)>,
}

/// State shared with the transition listener.
struct Shared {
    bus: Bus,
    bindings: Vec<ScheduleBinding>,
    params: ExecutorParams,
    semaphore: Option<Arc<Semaphore>>,
    state: Mutex<State>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Applies one availability transition delivered to listener `generation`.
    fn react(&self, availability: AvailabilityState, generation: u64) {
        let mut st = self.lock();
        if st.generation != generation || st.phase == Phase::Stopped {
            return;
        }

        match availability {
            AvailabilityState::Up => {
                if st.running.is_none() {
                    let set = RunningSet::start(
                        &self.bindings,
                        self.params,
                        &self.bus,
                        self.semaphore.as_ref(),
                    );
                    self.bus
                        .publish(Event::new(EventKind::JobsStarting).with_count(set.len()));
                    st.running = Some(set);
                    st.phase = Phase::Running;
                }
            }
            AvailabilityState::Down | AvailabilityState::Unknown => {
                if let Some(set) = st.running.take() {
                    self.discard(&mut st, set, "services unavailable");
                    st.phase = Phase::Starting;
                }
            }
        }
    }

    /// Cancels `set` and keeps its handles for a later drain.
    fn discard(&self, st: &mut State, set: RunningSet, reason: &'static str) {
        self.bus.publish(
            Event::new(EventKind::JobsStopping)
                .with_reason(reason)
                .with_count(set.len()),
        );
        st.draining.retain(|(_, join)| !join.is_finished());
        st.draining.extend(set.cancel_all());
    }
}

/// Orchestrates the availability monitor and the job executors.
pub struct Supervisor {
    cfg: SupervisorConfig,
    monitor: AvailabilityMonitor,
    subscribers: Vec<Arc<dyn Subscribe>>,
    shared: Arc<Shared>,
}

impl Supervisor {
    pub(crate) fn new_internal(
        cfg: SupervisorConfig,
        bindings: Vec<ScheduleBinding>,
        locator: Arc<dyn ServiceLocator>,
        subscribers: Vec<Arc<dyn Subscribe>>,
    ) -> Self {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        let monitor = AvailabilityMonitor::new(
            cfg.service.as_str(),
            locator,
            cfg.reacquire_delay,
            bus.clone(),
        );
        let semaphore = cfg
            .concurrency_limit()
            .map(Semaphore::new)
            .map(Arc::new);
        let params = ExecutorParams {
            retry: cfg.job_retry,
            timeout: cfg.timeout(),
        };

        let shared = Arc::new(Shared {
            bus,
            bindings,
            params,
            semaphore,
            state: Mutex::new(State {
                phase: Phase::Stopped,
                generation: 0,
                running: None,
                listener: None,
                fanout: None,
                draining: Vec::new(),
            }),
        });
        Self {
            cfg,
            monitor,
            subscribers,
            shared,
        }
    }

    /// Starts availability monitoring.
    ///
    /// Returns once the monitor and listener are wired, not once jobs run. A no-op if
    /// already started. Fails with [`RuntimeError::NoRuntime`] outside a tokio runtime.
    pub fn start(&self) -> Result<(), RuntimeError> {
        tokio::runtime::Handle::try_current().map_err(|_| RuntimeError::NoRuntime)?;

        let mut st = self.shared.lock();
        if st.phase != Phase::Stopped {
            return Ok(());
        }
        if st.fanout.is_none() {
            st.fanout = Some(self.spawn_fanout());
        }
        let Some(transitions) = self.monitor.start() else {
            return Ok(());
        };

        st.generation += 1;
        let token = CancellationToken::new();
        let join = tokio::spawn(listen(
            Arc::clone(&self.shared),
            transitions,
            token.clone(),
            st.generation,
        ));
        st.listener = Some(Background { token, join });
        st.phase = Phase::Starting;

        self.shared.bus.publish(
            Event::new(EventKind::SupervisorStarted)
                .with_job(self.monitor.service())
                .with_count(self.shared.bindings.len()),
        );
        Ok(())
    }

    /// Stops monitoring and cancels every running executor.
    ///
    /// Returns once cancellation has been issued; in-flight invocations may still be
    /// finishing (see [`shutdown`](Self::shutdown)). A no-op if already stopped.
    pub fn stop(&self) {
        let mut st = self.shared.lock();
        if st.phase == Phase::Stopped {
            return;
        }
        st.phase = Phase::Stopped;

        if let Some(listener) = st.listener.take() {
            listener.token.cancel();
        }
        if let Some(observer) = self.monitor.stop() {
            st.draining
                .push((format!("{} monitor", self.monitor.service()), observer));
        }
        if let Some(set) = st.running.take() {
            self.shared.discard(&mut st, set, "supervisor stopped");
        }
        self.shared
            .bus
            .publish(Event::new(EventKind::SupervisorStopped).with_job(self.monitor.service()));
    }

    /// Stops, then waits up to `grace` for cancelled executors and the monitor loop to finish.
    ///
    /// Subscribers are flushed afterwards. Fails with [`RuntimeError::GraceExceeded`]
    /// naming the jobs whose executors did not finish in time.
    pub async fn shutdown(&self, grace: Duration) -> Result<(), RuntimeError> {
        self.stop();

        let (mut draining, fanout) = {
            let mut st = self.shared.lock();
            (std::mem::take(&mut st.draining), st.fanout.take())
        };

        let joined = time::timeout(
            grace,
            when_all(draining.iter_mut().map(|(_, join)| join)),
        )
        .await;

        let res = match joined {
            Ok(Ok(_)) => {
                self.shared
                    .bus
                    .publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Ok(Err(failed)) => {
                for err in failed.errors() {
                    tracing::error!(error = %err, "executor ended abnormally");
                }
                self.shared
                    .bus
                    .publish(Event::new(EventKind::AllStoppedWithin).with_count(failed.len()));
                Ok(())
            }
            Err(_elapsed) => {
                let stuck: Vec<String> = draining
                    .iter()
                    .filter(|(_, join)| !join.is_finished())
                    .map(|(name, _)| name.clone())
                    .collect();
                self.shared.bus.publish(
                    Event::new(EventKind::GraceExceeded)
                        .with_timeout(grace)
                        .with_reason(stuck.join(", "))
                        .with_count(stuck.len()),
                );
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        };

        if let Some(fanout) = fanout {
            fanout.token.cancel();
            let _ = fanout.join.await;
        }
        res
    }

    /// Starts, waits for a termination signal, then shuts down with the configured grace.
    pub async fn run_until_signal(&self) -> Result<(), RuntimeError> {
        self.start()?;

        let signal = match shutdown::wait_for_shutdown_signal().await {
            Ok(name) => name,
            Err(e) => {
                tracing::error!(error = %e, "cannot listen for termination signals");
                "signal handler error"
            }
        };
        self.shared
            .bus
            .publish(Event::new(EventKind::ShutdownRequested).with_reason(signal));
        self.shutdown(self.cfg.grace).await
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.shared.lock().phase
    }

    /// Job names of the running set (empty unless [`Phase::Running`]).
    pub fn running_jobs(&self) -> Vec<String> {
        self.shared
            .lock()
            .running
            .as_ref()
            .map(RunningSet::names)
            .unwrap_or_default()
    }

    /// Latest availability reported by the monitor; `None` while stopped.
    pub fn availability(&self) -> Option<AvailabilityState> {
        self.monitor.state()
    }

    /// Receiver for runtime events published from now on.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.shared.bus.subscribe()
    }

    /// The validated (job, schedule) bindings.
    pub fn bindings(&self) -> &[ScheduleBinding] {
        &self.shared.bindings
    }

    /// Runtime configuration.
    pub fn config(&self) -> &SupervisorConfig {
        &self.cfg
    }

    /// Forwards bus events to the subscriber set until cancelled, then flushes it.
    fn spawn_fanout(&self) -> Background {
        let token = CancellationToken::new();
        let mut rx = self.shared.bus.subscribe();
        let set = SubscriberSet::new(self.subscribers.clone(), self.shared.bus.clone());
        let cancelled = token.clone();

        let join = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    ev = rx.recv() => match ev {
                        Ok(ev) => set.emit(&ev),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "subscriber fan-out lagged behind the bus");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
            while let Ok(ev) = rx.try_recv() {
                set.emit(&ev);
            }
            set.shutdown().await;
        });
        Background { token, join }
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        let mut st = self.shared.lock();
        if let Some(listener) = st.listener.take() {
            listener.token.cancel();
        }
        if let Some(fanout) = st.fanout.take() {
            fanout.token.cancel();
        }
        if let Some(set) = st.running.take() {
            drop(set.cancel_all());
        }
    }
}

/// Delivers transitions to [`Shared::react`] and acks each one afterwards.
async fn listen(
    shared: Arc<Shared>,
    mut transitions: Transitions,
    token: CancellationToken,
    generation: u64,
) {
    loop {
        let transition = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            next = transitions.recv() => match next {
                Some(t) => t,
                None => break,
            },
        };
        shared.react(transition.state, generation);
        transition.ack();
    }
}
