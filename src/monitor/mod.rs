//! Availability monitoring.
//!
//! ## Contents
//! - [`RawState`], [`AvailabilityState`] and the mapping between them
//! - [`ConnectionHandle`], [`ServiceLocator`] injected connection primitives
//! - [`TcpChannel`], [`StaticLocator`] TCP reachability implementation
//! - [`AvailabilityMonitor`] the observation loop and its [`Transition`] channel

mod availability;
mod connection;
mod state;
mod tcp;

pub use availability::{AvailabilityMonitor, Transition, Transitions};
pub use connection::{ConnectionError, ConnectionHandle, ConnectionRef, ServiceLocator};
pub use state::{AvailabilityState, RawState};
pub use tcp::{StaticLocator, TcpChannel, TcpChannelConfig};
