//! # Subscriber trait.
//!
//! [`Subscribe`] is how code outside the core observes the supervisor: availability
//! transitions, occurrences, attempts, retries and shutdown outcomes all arrive as
//! [`Event`]s.
//!
//! ```text
//! Bus ──► fan-out ──► accepts(kind)? ──► [bounded queue] ──► worker ──► on_event()
//! ```
//!
//! A subscriber never slows publishers down: when its queue is full the event is dropped
//! for that subscriber alone and a `SubscriberOverflow` event is published. A panic in
//! `on_event` is caught and published as `SubscriberPanicked`.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use seedvisor::{Event, EventKind, Subscribe};
//!
//! /// Counts occurrences that gave up after every retry.
//! struct Exhaustions;
//!
//! #[async_trait]
//! impl Subscribe for Exhaustions {
//!     async fn on_event(&self, ev: &Event) {
//!         // only RetryExhausted reaches this point
//!         let _job = ev.job.as_deref();
//!     }
//!
//!     fn name(&self) -> &'static str { "exhaustions" }
//!
//!     fn accepts(&self, kind: EventKind) -> bool {
//!         kind == EventKind::RetryExhausted
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};

/// Observer of runtime events.
///
/// `on_event` runs on the subscriber's own worker task, one event at a time in
/// publication order. Blocking inside it only delays this subscriber.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event.
    async fn on_event(&self, event: &Event);

    /// Short name used in overflow and panic reports.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Queue length before events are dropped for this subscriber (minimum 1).
    fn queue_capacity(&self) -> usize {
        1024
    }

    /// Filters events before they are queued. Defaults to every kind.
    fn accepts(&self, _kind: EventKind) -> bool {
        true
    }
}
