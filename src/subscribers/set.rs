//! # Subscriber fan-out.
//!
//! [`SubscriberSet`] hands every bus event to each interested subscriber's queue and
//! returns without waiting for any of them. One worker task per subscriber drains its
//! queue in order, so a slow log sink never holds up an executor or the monitor.
//!
//! ```text
//!   emit(&Event) ──┬─ accepts? ─► [queue: log]     ─► worker ─► on_event()
//!                  ├─ accepts? ─► [queue: metrics] ─► worker ─► on_event()
//!                  └─ accepts? ─► [queue: custom]  ─► worker ─► on_event()
//! ```
//!
//! Order is preserved per subscriber only. A full or closed queue drops the event for
//! that subscriber and reports `SubscriberOverflow`; a panicking handler is reported as
//! `SubscriberPanicked` and its worker keeps going.

use std::sync::Arc;

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::events::{Bus, Event};

use super::Subscribe;

struct Queue {
    sub: Arc<dyn Subscribe>,
    tx: mpsc::Sender<Arc<Event>>,
}

/// Set of subscribers, each behind its own bounded queue and worker.
pub struct SubscriberSet {
    queues: Vec<Queue>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl SubscriberSet {
    /// Spawns one worker per subscriber. Faults are reported on `bus`.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let mut queues = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let (tx, rx) = mpsc::channel::<Arc<Event>>(sub.queue_capacity().max(1));
            workers.push(tokio::spawn(drain(Arc::clone(&sub), rx, bus.clone())));
            queues.push(Queue { sub, tx });
        }

        Self {
            queues,
            workers,
            bus,
        }
    }

    /// Queues `event` for every subscriber that accepts its kind.
    ///
    /// Fault events are never re-reported, so an overflowing subscriber cannot feed itself.
    pub fn emit(&self, event: &Event) {
        let shared = Arc::new(event.clone());
        for q in &self.queues {
            if !q.sub.accepts(event.kind) {
                continue;
            }
            let reason = match q.tx.try_send(Arc::clone(&shared)) {
                Ok(()) => continue,
                Err(mpsc::error::TrySendError::Full(_)) => "full",
                Err(mpsc::error::TrySendError::Closed(_)) => "closed",
            };
            tracing::warn!(subscriber = q.sub.name(), reason, kind = ?event.kind, "event dropped");
            if !event.is_subscriber_fault() {
                self.bus
                    .publish(Event::subscriber_overflow(q.sub.name(), reason));
            }
        }
    }

    /// Closes every queue and waits until the workers have handled what was queued.
    pub async fn shutdown(self) {
        drop(self.queues);
        for worker in self.workers {
            let _ = worker.await;
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queues.len()
    }
}

async fn drain(sub: Arc<dyn Subscribe>, mut rx: mpsc::Receiver<Arc<Event>>, bus: Bus) {
    while let Some(ev) = rx.recv().await {
        let handled = std::panic::AssertUnwindSafe(sub.on_event(&ev))
            .catch_unwind()
            .await;
        if let Err(payload) = handled {
            let info = panic_message(payload.as_ref());
            tracing::error!(subscriber = sub.name(), %info, "subscriber panicked");
            if !ev.is_subscriber_fault() {
                bus.publish(Event::subscriber_panicked(sub.name(), info));
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
