//! # AvailabilityMonitor: connectivity observer for one dependent service.
//!
//! Converts raw channel signals into the coarse [`AvailabilityState`] and notifies a
//! single subscriber on every actual transition.
//!
//! ## Observation loop
//! ```text
//! loop {                                            (outer: acquire)
//!   ├─► locator.acquire(service)     err ─► ServiceAcquireFailed, sleep(reacquire_delay), retry
//!   ├─► raw = handle.get_state(true) ─► apply(raw)
//!   └─► loop {                                      (inner: watch)
//!         ├─► handle.watch(raw, None)  err ─► WatchFailed, apply(Unknown),
//!         │                                   sleep(reacquire_delay), restart outer
//!         └─► raw = handle.get_state(true) ─► apply(raw)
//!       }
//! }
//!
//! apply(state):
//!   state == current ─► nothing
//!   state != current ─► current = state, AvailabilityChanged,
//!                       send Transition over the rendezvous channel, await ack
//! ```
//!
//! ## Rules
//! - `start()`/`stop()` are idempotent; `stop()` resets the state to `None`.
//! - Notifications are emitted only when the **mapped** state changes.
//! - The transition channel has capacity 1 and every transition carries an ack; the
//!   monitor does not watch again until the subscriber has finished reacting.
//! - Every wait (acquire, watch, delay, ack) is raced against the monitor's token.
//! - Acquire and watch failures never end the loop.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::events::{Bus, Event, EventKind};
use crate::monitor::{AvailabilityState, ConnectionRef, RawState, ServiceLocator};

/// One availability transition delivered to the subscriber.
///
/// The monitor waits until the subscriber calls [`Transition::ack`] (or drops the
/// transition) before it proceeds.
#[derive(Debug)]
pub struct Transition {
    /// The new coarse state.
    pub state: AvailabilityState,
    ack: oneshot::Sender<()>,
}

impl Transition {
    /// Signals that the reaction to this transition is complete.
    pub fn ack(self) {
        let _ = self.ack.send(());
    }
}

/// Receiving side of the transition channel returned by [`AvailabilityMonitor::start`].
pub type Transitions = mpsc::Receiver<Transition>;

/// Running loop bookkeeping.
struct Running {
    token: CancellationToken,
    join: JoinHandle<()>,
}

/// Watches one service's connection and exposes a three-state availability signal.
pub struct AvailabilityMonitor {
    service: Arc<str>,
    locator: Arc<dyn ServiceLocator>,
    reacquire_delay: Duration,
    bus: Bus,
    state: Arc<watch::Sender<Option<AvailabilityState>>>,
    running: Mutex<Option<Running>>,
}

impl AvailabilityMonitor {
    /// Creates a stopped monitor for `service`.
    pub fn new(
        service: impl Into<Arc<str>>,
        locator: Arc<dyn ServiceLocator>,
        reacquire_delay: Duration,
        bus: Bus,
    ) -> Self {
        let (state, _rx) = watch::channel(None);
        Self {
            service: service.into(),
            locator,
            reacquire_delay,
            bus,
            state: Arc::new(state),
            running: Mutex::new(None),
        }
    }

    /// Monitored service name.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Current availability; `None` while stopped or before the first observation.
    pub fn state(&self) -> Option<AvailabilityState> {
        *self.state.borrow()
    }

    /// Receiver that observes every state update (including resets to `None`).
    pub fn subscribe_state(&self) -> watch::Receiver<Option<AvailabilityState>> {
        self.state.subscribe()
    }

    /// True while the observation loop is running.
    pub fn is_running(&self) -> bool {
        self.lock().is_some()
    }

    /// Launches the observation loop.
    ///
    /// Returns the transition receiver, or `None` if the monitor is already running.
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> Option<Transitions> {
        let mut running = self.lock();
        if running.is_some() {
            return None;
        }

        let (tx, rx) = mpsc::channel(1);
        let token = CancellationToken::new();
        let observer = Observer {
            service: Arc::clone(&self.service),
            locator: Arc::clone(&self.locator),
            reacquire_delay: self.reacquire_delay,
            bus: self.bus.clone(),
            state: Arc::clone(&self.state),
            transitions: tx,
            token: token.clone(),
        };
        let join = tokio::spawn(observer.run());
        *running = Some(Running { token, join });
        Some(rx)
    }

    /// Cancels the observation loop and resets the state to `None`.
    ///
    /// Returns the loop's join handle the first time; `None` if already stopped.
    pub fn stop(&self) -> Option<JoinHandle<()>> {
        let running = self.lock().take()?;
        running.token.cancel();
        self.state.send_replace(None);
        Some(running.join)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for AvailabilityMonitor {
    fn drop(&mut self) {
        if let Some(running) = self.lock().take() {
            running.token.cancel();
        }
    }
}

/// State owned by one run of the observation loop.
struct Observer {
    service: Arc<str>,
    locator: Arc<dyn ServiceLocator>,
    reacquire_delay: Duration,
    bus: Bus,
    state: Arc<watch::Sender<Option<AvailabilityState>>>,
    transitions: mpsc::Sender<Transition>,
    token: CancellationToken,
}

impl Observer {
    async fn run(self) {
        let mut current: Option<AvailabilityState> = None;

        'acquire: loop {
            let Some(handle) = self.acquire().await else {
                return;
            };

            let mut raw = handle.get_state(true);
            if !self.apply(&mut current, raw).await {
                return;
            }

            loop {
                let watched = tokio::select! {
                    _ = self.token.cancelled() => return,
                    res = handle.watch(raw, None) => res,
                };

                match watched {
                    Ok(_) => {
                        raw = handle.get_state(true);
                        if !self.apply(&mut current, raw).await {
                            return;
                        }
                    }
                    Err(e) => {
                        self.bus.publish(
                            Event::new(EventKind::WatchFailed)
                                .with_job(Arc::clone(&self.service))
                                .with_reason(e.to_string())
                                .with_delay(self.reacquire_delay),
                        );
                        if !self.set(&mut current, AvailabilityState::Unknown).await {
                            return;
                        }
                        if !self.pause().await {
                            return;
                        }
                        continue 'acquire;
                    }
                }
            }
        }
    }

    /// Acquires a handle, retrying indefinitely. `None` means cancelled.
    async fn acquire(&self) -> Option<ConnectionRef> {
        loop {
            let res = tokio::select! {
                _ = self.token.cancelled() => return None,
                res = self.locator.acquire(&self.service) => res,
            };
            match res {
                Ok(handle) => return Some(handle),
                Err(e) => {
                    self.bus.publish(
                        Event::new(EventKind::ServiceAcquireFailed)
                            .with_job(Arc::clone(&self.service))
                            .with_reason(e.to_string())
                            .with_delay(self.reacquire_delay),
                    );
                    if !self.pause().await {
                        return None;
                    }
                }
            }
        }
    }

    /// Maps `raw` and forwards it to [`Self::set`]. Returns `false` if cancelled.
    async fn apply(&self, current: &mut Option<AvailabilityState>, raw: RawState) -> bool {
        let mapped = raw.availability();
        self.bus.publish(
            Event::new(EventKind::ConnectivityObserved)
                .with_job(Arc::clone(&self.service))
                .with_raw(raw)
                .with_availability(mapped),
        );
        self.set(current, mapped).await
    }

    /// Records `next` and notifies on change. Returns `false` if cancelled.
    async fn set(&self, current: &mut Option<AvailabilityState>, next: AvailabilityState) -> bool {
        if *current == Some(next) {
            return true;
        }
        *current = Some(next);
        // Checked under the watch lock: once `stop()` has cancelled, its reset to `None`
        // must not be overwritten.
        let token = &self.token;
        let published = self.state.send_if_modified(|state| {
            if token.is_cancelled() {
                return false;
            }
            *state = Some(next);
            true
        });
        if !published {
            return false;
        }
        self.bus.publish(
            Event::new(EventKind::AvailabilityChanged)
                .with_job(Arc::clone(&self.service))
                .with_availability(next),
        );

        let (ack_tx, ack_rx) = oneshot::channel();
        let transition = Transition {
            state: next,
            ack: ack_tx,
        };
        tokio::select! {
            _ = self.token.cancelled() => false,
            _ = async {
                if self.transitions.send(transition).await.is_ok() {
                    // A dropped transition counts as acknowledged.
                    let _ = ack_rx.await;
                }
            } => true,
        }
    }

    /// Cancellable fixed delay. Returns `false` if cancelled.
    async fn pause(&self) -> bool {
        tokio::select! {
            _ = self.token.cancelled() => false,
            _ = time::sleep(self.reacquire_delay) => true,
        }
    }
}
