//! # Event bus.
//!
//! Every component publishes [`Event`]s onto one [`Bus`]. The supervisor's fan-out task
//! is the main reader; tests and embedders can take extra receivers through
//! `Supervisor::events()`.
//!
//! ```text
//!   JobExecutor ─┐
//!   run_once    ─┼─► Bus ─┬─► fan-out task ─► SubscriberSet
//!   Monitor     ─┤        └─► Supervisor::events() receivers
//!   Supervisor  ─┘
//! ```
//!
//! Publishing never waits. Receivers that fall behind by more than the capacity see
//! `RecvError::Lagged` and lose the oldest events; with no receivers, events vanish.
//! Availability transitions do not use the bus: they travel over the monitor's own
//! rendezvous channel (see [`crate::monitor`]).

use tokio::sync::broadcast;

use super::event::Event;

/// Cloneable handle to the runtime's event channel.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<Event>(capacity);
        Self { tx }
    }

    /// Publishes to whoever is listening right now.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Receiver for events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}
