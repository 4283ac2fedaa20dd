//! # Event subscribers for the seedvisor runtime.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out and the
//! built-in [`LogWriter`] that renders events through `tracing`.
//!
//! ```text
//!   Bus ──► fan-out task ──► SubscriberSet ──┬──► LogWriter
//!                                            └──► custom subscribers
//! ```

mod log;
mod set;
mod subscriber;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
