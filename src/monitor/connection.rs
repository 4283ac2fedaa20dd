//! # Connection primitives consumed by the availability monitor.
//!
//! - [`ConnectionHandle`] exposes a channel's raw connectivity state and a way to wait
//!   for it to change.
//! - [`ServiceLocator`] hands out connection handles by service name. Acquisition may
//!   fail transiently (the service may not be registered yet); callers retry.
//!
//! Both are injected into [`AvailabilityMonitor`](crate::AvailabilityMonitor), so tests
//! substitute fakes without any process-wide state.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::Instant;

use crate::monitor::RawState;

/// Errors raised by connection primitives.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum ConnectionError {
    /// No endpoint is registered for the service (yet).
    #[error("service '{service}' is not registered")]
    NotRegistered {
        /// The requested service name.
        service: String,
    },

    /// Watching the channel failed.
    #[error("watch failed: {reason}")]
    Watch {
        /// What went wrong.
        reason: String,
    },

    /// The watch deadline elapsed without a state change.
    #[error("deadline exceeded while watching connectivity")]
    DeadlineExceeded,
}

/// Low-level handle to a service connection.
#[async_trait]
pub trait ConnectionHandle: Send + Sync + 'static {
    /// Returns the current raw state; with `try_to_connect` an idle channel starts connecting.
    fn get_state(&self, try_to_connect: bool) -> RawState;

    /// Waits until the state differs from `last`, or until `deadline` (`None` = no deadline).
    ///
    /// Returns the new state.
    async fn watch(&self, last: RawState, deadline: Option<Instant>)
    -> Result<RawState, ConnectionError>;
}

/// Shared handle to a connection.
pub type ConnectionRef = Arc<dyn ConnectionHandle>;

/// Resolves service names to connection handles.
#[async_trait]
pub trait ServiceLocator: Send + Sync + 'static {
    /// Returns a handle for `service`.
    async fn acquire(&self, service: &str) -> Result<ConnectionRef, ConnectionError>;
}
