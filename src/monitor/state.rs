//! # Connectivity and availability states.
//!
//! [`RawState`] mirrors the five low-level channel states; [`AvailabilityState`] is the
//! coarse signal the supervisor reacts to. The only way from one to the other is
//! [`RawState::availability`]:
//!
//! ```text
//! Idle, Connecting                  → Unknown
//! TransientFailure, FatalFailure    → Down
//! Ready                             → Up
//! ```

use crate::error::RuntimeError;

/// Coarse availability of the monitored dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AvailabilityState {
    /// Not known yet (connecting, idle, or the watch itself failed).
    Unknown,
    /// Reachable; jobs may run.
    Up,
    /// Unreachable; jobs must not run.
    Down,
}

/// Low-level connectivity state of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawState {
    Idle,
    Connecting,
    Ready,
    TransientFailure,
    FatalFailure,
}

impl RawState {
    /// Maps a raw channel state to the coarse availability signal.
    pub fn availability(self) -> AvailabilityState {
        match self {
            RawState::Idle | RawState::Connecting => AvailabilityState::Unknown,
            RawState::TransientFailure | RawState::FatalFailure => AvailabilityState::Down,
            RawState::Ready => AvailabilityState::Up,
        }
    }
}

impl TryFrom<i32> for RawState {
    type Error = RuntimeError;

    /// Decodes the numeric connectivity codes used by grpc-style channels
    /// (`0` idle .. `4` fatal failure).
    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(RawState::Idle),
            1 => Ok(RawState::Connecting),
            2 => Ok(RawState::Ready),
            3 => Ok(RawState::TransientFailure),
            4 => Ok(RawState::FatalFailure),
            other => Err(RuntimeError::Protocol {
                value: i64::from(other),
            }),
        }
    }
}
