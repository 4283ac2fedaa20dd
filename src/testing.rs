//! Fakes shared by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::JobError;
use crate::jobs::{Job, ScheduleBinding};
use crate::monitor::{ConnectionError, ConnectionHandle, ConnectionRef, RawState, ServiceLocator};
use crate::schedule::ScheduleSource;

#[derive(Clone, Copy)]
struct FakeState {
    raw: RawState,
    fail_pending: bool,
}

/// Connection whose raw state is driven by the test.
pub(crate) struct FakeChannel {
    state: watch::Sender<FakeState>,
    watches: AtomicUsize,
}

impl FakeChannel {
    pub(crate) fn new(raw: RawState) -> Arc<Self> {
        let (state, _rx) = watch::channel(FakeState {
            raw,
            fail_pending: false,
        });
        Arc::new(Self {
            state,
            watches: AtomicUsize::new(0),
        })
    }

    pub(crate) fn set(&self, raw: RawState) {
        self.state.send_modify(|s| s.raw = raw);
    }

    /// Makes the pending (or next) `watch` call fail once.
    pub(crate) fn fail_next_watch(&self) {
        self.state.send_modify(|s| s.fail_pending = true);
    }

    pub(crate) fn watches(&self) -> usize {
        self.watches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectionHandle for FakeChannel {
    fn get_state(&self, _try_to_connect: bool) -> RawState {
        self.state.borrow().raw
    }

    async fn watch(
        &self,
        last: RawState,
        _deadline: Option<Instant>,
    ) -> Result<RawState, ConnectionError> {
        self.watches.fetch_add(1, Ordering::SeqCst);
        let mut rx = self.state.subscribe();
        let seen = *rx
            .wait_for(|s| s.raw != last || s.fail_pending)
            .await
            .map_err(|_| ConnectionError::Watch {
                reason: "closed".to_string(),
            })?;
        if seen.fail_pending {
            self.state.send_modify(|s| s.fail_pending = false);
            return Err(ConnectionError::Watch {
                reason: "injected".to_string(),
            });
        }
        Ok(seen.raw)
    }
}

/// Locator that fails a fixed number of times before handing out its channel.
pub(crate) struct FakeLocator {
    channel: Arc<FakeChannel>,
    failures_left: AtomicUsize,
    acquisitions: AtomicUsize,
}

impl FakeLocator {
    pub(crate) fn ready(channel: Arc<FakeChannel>) -> Arc<Self> {
        Self::failing_first(channel, 0)
    }

    pub(crate) fn failing_first(channel: Arc<FakeChannel>, failures: usize) -> Arc<Self> {
        Arc::new(Self {
            channel,
            failures_left: AtomicUsize::new(failures),
            acquisitions: AtomicUsize::new(0),
        })
    }

    pub(crate) fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ServiceLocator for FakeLocator {
    async fn acquire(&self, service: &str) -> Result<ConnectionRef, ConnectionError> {
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(ConnectionError::NotRegistered {
                service: service.to_string(),
            });
        }
        Ok(self.channel.clone())
    }
}

/// Unaligned schedule: each occurrence is exactly `period` after the given instant.
pub(crate) struct Periodic {
    period: Duration,
    remaining: Option<AtomicUsize>,
}

impl Periodic {
    pub(crate) fn every(period: Duration) -> Arc<Self> {
        Arc::new(Self {
            period,
            remaining: None,
        })
    }

    /// Yields `n` occurrences, then reports the schedule as exhausted.
    pub(crate) fn limited(period: Duration, n: usize) -> Arc<Self> {
        Arc::new(Self {
            period,
            remaining: Some(AtomicUsize::new(n)),
        })
    }
}

impl ScheduleSource for Periodic {
    fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if let Some(remaining) = &self.remaining {
            remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .ok()?;
        }
        Some(after + chrono::Duration::from_std(self.period).ok()?)
    }

    fn describe(&self) -> String {
        format!("every {}ms", self.period.as_millis())
    }
}

/// Job that records when it ran (relative to its creation) and optionally fails.
pub(crate) struct Recorder {
    name: &'static str,
    origin: Instant,
    fail: bool,
    work: Duration,
    calls: Mutex<Vec<Duration>>,
}

impl Recorder {
    pub(crate) fn ok(name: &'static str) -> Arc<Self> {
        Self::build(name, false, Duration::ZERO)
    }

    pub(crate) fn failing(name: &'static str) -> Arc<Self> {
        Self::build(name, true, Duration::ZERO)
    }

    /// Succeeds after `work`, ignoring cancellation.
    pub(crate) fn busy(name: &'static str, work: Duration) -> Arc<Self> {
        Self::build(name, false, work)
    }

    fn build(name: &'static str, fail: bool, work: Duration) -> Arc<Self> {
        Arc::new(Self {
            name,
            origin: Instant::now(),
            fail,
            work,
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Start offsets of every invocation so far.
    pub(crate) fn calls(&self) -> Vec<Duration> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Job for Recorder {
    fn name(&self) -> &str {
        self.name
    }

    async fn run(&self, _ctx: CancellationToken) -> Result<(), JobError> {
        self.calls.lock().unwrap().push(self.origin.elapsed());
        if !self.work.is_zero() {
            tokio::time::sleep(self.work).await;
        }
        if self.fail {
            Err(JobError::fail("injected failure"))
        } else {
            Ok(())
        }
    }
}

/// Wraps a test job and schedule into a binding.
pub(crate) fn bind(job: Arc<Recorder>, schedule: Arc<Periodic>) -> ScheduleBinding {
    ScheduleBinding::new(job, schedule)
}

/// Whole-second offsets as `Duration`s.
pub(crate) fn secs(offsets: &[u64]) -> Vec<Duration> {
    offsets.iter().map(|s| Duration::from_secs(*s)).collect()
}
