//! Runtime events.
//!
//! [`Event`] and [`EventKind`] describe what happened; [`Bus`] carries them from the
//! supervisor, the availability monitor, job executors and subscriber workers to the
//! subscriber fan-out and to any receiver obtained from `Supervisor::events()`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
