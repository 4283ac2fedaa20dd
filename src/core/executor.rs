//! # JobExecutor: one (job, schedule) pair run forever until cancelled.
//!
//! Each executor owns a single [`ScheduleBinding`] and runs its job once per scheduled
//! occurrence, with bounded retry.
//!
//! ## Architecture
//! ```text
//! loop {
//!   ├─► at = schedule.next_after(now)       None ─► ScheduleExhausted, exit
//!   ├─► publish OccurrenceScheduled
//!   ├─► sleep until `at`                    (cancellable)
//!   ├─► acquire global permit               (cancellable, optional)
//!   ├─► RetryRunner::run_with(run_once)     (inter-attempt delay cancellable)
//!   │     ├─► Ok                            ─► next occurrence
//!   │     ├─► Exhausted                     ─► RetryExhausted, next occurrence
//!   │     └─► Canceled                      ─► exit
//! }
//! publish ExecutorStopped
//! ```
//!
//! ## Rules
//! - Iterations are **strictly sequential**: the next occurrence is computed only after
//!   the previous one (with all its retries) has resolved.
//! - Missed occurrences are never caught up; each iteration starts from "now".
//! - Cancellation interrupts the occurrence wait, the permit wait and the retry delay.
//!   An in-flight job invocation is allowed to finish.
//! - "Now" is derived from the tokio clock anchored to wall time when the loop starts,
//!   so an occurrence is never computed twice.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::core::retry::RetryRunner;
use crate::core::runner::run_once;
use crate::error::RetryError;
use crate::events::{Bus, Event, EventKind};
use crate::jobs::ScheduleBinding;
use crate::policies::RetryPolicy;

/// Per-executor parameters shared by every executor of a supervisor.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExecutorParams {
    /// Retry budget and backoff applied to each occurrence.
    pub retry: RetryPolicy,
    /// Optional per-attempt timeout.
    pub timeout: Option<Duration>,
}

struct Running {
    token: CancellationToken,
    join: JoinHandle<()>,
}

/// Runs one [`ScheduleBinding`] on its schedule until stopped.
pub struct JobExecutor {
    binding: ScheduleBinding,
    params: ExecutorParams,
    bus: Bus,
    semaphore: Option<Arc<Semaphore>>,
    running: Mutex<Option<Running>>,
}

impl JobExecutor {
    /// Creates a stopped executor.
    pub fn new(
        binding: ScheduleBinding,
        params: ExecutorParams,
        bus: Bus,
        semaphore: Option<Arc<Semaphore>>,
    ) -> Self {
        Self {
            binding,
            params,
            bus,
            semaphore,
            running: Mutex::new(None),
        }
    }

    /// The binding this executor runs.
    pub fn binding(&self) -> &ScheduleBinding {
        &self.binding
    }

    /// Job name.
    pub fn name(&self) -> &str {
        self.binding.name()
    }

    /// True while the loop is started and has not exited.
    pub fn is_running(&self) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|r| !r.join.is_finished())
    }

    /// Begins the loop. Returns `false` if it was already started.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> bool {
        let mut running = self.lock();
        if running.is_some() {
            return false;
        }

        let token = CancellationToken::new();
        let job_loop = JobLoop {
            binding: self.binding.clone(),
            runner: RetryRunner::new(self.params.retry),
            timeout: self.params.timeout,
            bus: self.bus.clone(),
            semaphore: self.semaphore.clone(),
        };
        let join = tokio::spawn(job_loop.run(token.clone()));
        *running = Some(Running { token, join });
        true
    }

    /// Cancels the current suspension and ends the loop.
    ///
    /// Returns the loop's join handle the first time; `None` if never started or
    /// already stopped.
    pub fn stop(&self) -> Option<JoinHandle<()>> {
        let running = self.lock().take()?;
        running.token.cancel();
        Some(running.join)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for JobExecutor {
    fn drop(&mut self) {
        if let Some(running) = self.lock().take() {
            running.token.cancel();
        }
    }
}

/// Wall time derived from the tokio clock.
struct Clock {
    wall: DateTime<Utc>,
    mono: Instant,
}

impl Clock {
    fn anchor() -> Self {
        Self {
            wall: Utc::now(),
            mono: Instant::now(),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        let elapsed =
            chrono::Duration::from_std(self.mono.elapsed()).unwrap_or(chrono::Duration::zero());
        self.wall + elapsed
    }
}

/// State owned by one run of the executor loop.
struct JobLoop {
    binding: ScheduleBinding,
    runner: RetryRunner,
    timeout: Option<Duration>,
    bus: Bus,
    semaphore: Option<Arc<Semaphore>>,
}

impl JobLoop {
    async fn run(self, token: CancellationToken) {
        let clock = Clock::anchor();
        let job = self.binding.job();
        let label = self.binding.label();

        loop {
            let now = clock.now();
            let Some(at) = self.binding.schedule().next_after(now) else {
                self.publish(EventKind::ScheduleExhausted);
                break;
            };
            let wait = (at - now).to_std().unwrap_or(Duration::ZERO);
            self.bus.publish(
                Event::new(EventKind::OccurrenceScheduled)
                    .with_job(self.binding.name())
                    .with_schedule(Arc::clone(label))
                    .with_delay(wait),
            );

            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = time::sleep(wait) => {}
            }

            let _permit = match &self.semaphore {
                Some(sem) => tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    res = Arc::clone(sem).acquire_owned() => match res {
                        Ok(permit) => Some(permit),
                        Err(_closed) => break,
                    },
                },
                None => None,
            };

            let res = self
                .runner
                .run_with(
                    &token,
                    |attempt| {
                        run_once(
                            &**job,
                            &token,
                            self.timeout,
                            attempt,
                            &self.bus,
                            label,
                        )
                    },
                    |state, err| {
                        self.bus.publish(
                            Event::new(EventKind::RetryScheduled)
                                .with_job(self.binding.name())
                                .with_schedule(Arc::clone(label))
                                .with_attempt(state.retry_count + 1)
                                .with_delay(state.next_delay)
                                .with_reason(err.to_string()),
                        );
                    },
                )
                .await;

            match res {
                Ok(()) => {}
                Err(RetryError::Exhausted { attempts, last }) => {
                    self.bus.publish(
                        Event::new(EventKind::RetryExhausted)
                            .with_job(self.binding.name())
                            .with_schedule(Arc::clone(label))
                            .with_attempt(attempts)
                            .with_reason(last.to_string()),
                    );
                }
                Err(RetryError::Canceled) => break,
            }
        }

        self.publish(EventKind::ExecutorStopped);
    }

    fn publish(&self, kind: EventKind) {
        self.bus.publish(
            Event::new(kind)
                .with_job(self.binding.name())
                .with_schedule(Arc::clone(self.binding.label())),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::BackoffPolicy;
    use crate::testing::{Periodic, Recorder, bind, secs};

    fn executor(binding: ScheduleBinding, retry: RetryPolicy, bus: &Bus) -> JobExecutor {
        JobExecutor::new(
            binding,
            ExecutorParams {
                retry,
                timeout: None,
            },
            bus.clone(),
            None,
        )
    }

    fn count(rx: &mut tokio::sync::broadcast::Receiver<Event>, kind: EventKind) -> usize {
        let mut n = 0;
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == kind {
                n += 1;
            }
        }
        n
    }

    #[tokio::test(start_paused = true)]
    async fn runs_once_per_occurrence() {
        let bus = Bus::new(256);
        let job = Recorder::ok("addSampleUser");
        let exec = executor(
            bind(job.clone(), Periodic::every(Duration::from_secs(10))),
            RetryPolicy::default(),
            &bus,
        );

        assert!(exec.start());
        time::sleep(Duration::from_secs(35)).await;
        assert_eq!(job.calls(), secs(&[10, 20, 30]));
        assert!(exec.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_move_on_to_next_occurrence() {
        let bus = Bus::new(256);
        let mut rx = bus.subscribe();
        let job = Recorder::failing("addSampleVideo");
        let exec = executor(
            bind(job.clone(), Periodic::every(Duration::from_secs(10))),
            RetryPolicy::new(1, BackoffPolicy::fixed(Duration::from_secs(1))),
            &bus,
        );

        exec.start();
        time::sleep(Duration::from_secs(25)).await;

        // occurrence at 10s: attempts at 10 and 11; next occurrence computed from 11s.
        assert_eq!(job.calls(), secs(&[10, 11, 21, 22]));
        assert!(exec.is_running());
        assert_eq!(count(&mut rx, EventKind::RetryExhausted), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_interrupts_retry_delay() {
        let bus = Bus::new(256);
        let mut rx = bus.subscribe();
        let job = Recorder::failing("addSampleComment");
        let exec = executor(
            bind(job.clone(), Periodic::every(Duration::from_secs(10))),
            RetryPolicy::new(10, BackoffPolicy::fixed(Duration::from_secs(3600))),
            &bus,
        );

        exec.start();
        time::sleep(Duration::from_secs(15)).await;
        let started = Instant::now();
        let join = exec.stop().expect("running");
        join.await.unwrap();

        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(job.calls(), secs(&[10]));
        assert_eq!(count(&mut rx, EventKind::ExecutorStopped), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn start_and_stop_are_idempotent() {
        let bus = Bus::new(16);
        let exec = executor(
            bind(
                Recorder::ok("addSampleRating"),
                Periodic::every(Duration::from_secs(10)),
            ),
            RetryPolicy::default(),
            &bus,
        );

        assert!(exec.stop().is_none());
        assert!(exec.start());
        assert!(!exec.start());
        assert!(exec.stop().is_some());
        assert!(exec.stop().is_none());
        assert!(!exec.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn exits_when_schedule_is_exhausted() {
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let job = Recorder::ok("addSampleVideoView");
        let exec = executor(
            bind(job.clone(), Periodic::limited(Duration::from_secs(5), 2)),
            RetryPolicy::default(),
            &bus,
        );

        exec.start();
        time::sleep(Duration::from_secs(60)).await;

        assert_eq!(job.calls(), secs(&[5, 10]));
        assert!(!exec.is_running());
        assert_eq!(count(&mut rx, EventKind::ScheduleExhausted), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn global_permit_serializes_invocations() {
        let bus = Bus::new(256);
        let semaphore = Some(Arc::new(Semaphore::new(1)));
        let params = ExecutorParams::default();
        let a = Recorder::busy("addSampleUser", Duration::from_secs(3));
        let b = Recorder::busy("addSampleVideo", Duration::from_secs(3));
        let execs: Vec<JobExecutor> = [a.clone(), b.clone()]
            .into_iter()
            .map(|job| {
                JobExecutor::new(
                    bind(job, Periodic::every(Duration::from_secs(10))),
                    params,
                    bus.clone(),
                    semaphore.clone(),
                )
            })
            .collect();

        for exec in &execs {
            exec.start();
        }
        time::sleep(Duration::from_secs(15)).await;

        let mut starts = [a.calls(), b.calls()].concat();
        starts.sort();
        assert_eq!(starts, secs(&[10, 13]));
    }
}
