//! Connection collaborator seams.
//!
//! The call layer never owns a socket. It consumes two narrow seams from
//! whatever owns the persistent connection:
//!
//! - [`LinkStatus`]: polled readiness signal (connected / timed out).
//!   Calls poll this in their first suspension; nothing is pushed.
//! - [`Transport`]: the "hand bytes to the wire" primitive. Sends are
//!   fire-and-forget from this layer's point of view: a failed write
//!   surfaces later through the connection state, never synchronously.
//!
//! [`SharedLinkState`] is the stock implementation of [`LinkStatus`]: an
//! atomic state cell the connection owner updates from its own event loop
//! and any number of call drivers poll without locking.

// Rust guideline compliant 2026-02

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

/// Connection lifecycle state as observed by the call layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected, still expected to come up.
    Disconnected,
    /// Connection attempt in progress.
    Connecting,
    /// Connected and ready to carry calls.
    Connected,
    /// The transport gave up: the connection will not come up.
    TimedOut,
}

impl ConnectionState {
    fn as_u8(self) -> u8 {
        match self {
            Self::Disconnected => 0,
            Self::Connecting => 1,
            Self::Connected => 2,
            Self::TimedOut => 3,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::TimedOut,
            _ => Self::Disconnected,
        }
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::Disconnected
    }
}

/// Polled connection readiness, consumed by call drivers.
///
/// Both methods are plain reads; drivers call them once per poll
/// iteration, so implementations must not block.
pub trait LinkStatus: Send + Sync {
    /// Whether the connection is currently ready to carry calls.
    fn connected(&self) -> bool;

    /// Whether the transport has given up on the connection.
    ///
    /// Once true, calls still waiting to send complete with
    /// [`crate::CallError::ConnectionTimeout`] without sending.
    fn timed_out(&self) -> bool;
}

/// The outbound wire primitive.
///
/// Implementors hand the frame to the underlying connection (typically by
/// queueing it on the writer task). Failure is not reported here: a dead
/// connection shows up through [`LinkStatus`], and the affected calls are
/// resolved by cancellation or by the connection owner's shutdown path.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Hand one serialized frame to the wire.
    async fn send(&self, frame: String);
}

/// Shared connection state cell.
///
/// The connection owner calls [`set`](Self::set) from its event loop; call
/// drivers poll through the [`LinkStatus`] impl. Backed by a single atomic
/// so polls are lock-free.
#[derive(Debug, Default)]
pub struct SharedLinkState {
    state: AtomicU8,
}

impl SharedLinkState {
    /// Create new shared state, starting disconnected.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Get the current state.
    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Set the state.
    pub fn set(&self, new_state: ConnectionState) {
        self.state.store(new_state.as_u8(), Ordering::SeqCst);
    }
}

impl LinkStatus for SharedLinkState {
    fn connected(&self) -> bool {
        self.get() == ConnectionState::Connected
    }

    fn timed_out(&self) -> bool {
        self.get() == ConnectionState::TimedOut
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_disconnected() {
        let state = SharedLinkState::new();
        assert_eq!(state.get(), ConnectionState::Disconnected);
        assert!(!state.connected());
        assert!(!state.timed_out());
    }

    #[test]
    fn state_transitions_are_observable() {
        let state = SharedLinkState::new();

        state.set(ConnectionState::Connecting);
        assert_eq!(state.get(), ConnectionState::Connecting);
        assert!(!state.connected());

        state.set(ConnectionState::Connected);
        assert!(state.connected());
        assert!(!state.timed_out());

        state.set(ConnectionState::TimedOut);
        assert!(!state.connected());
        assert!(state.timed_out());
    }

    #[test]
    fn state_round_trips_through_raw_repr() {
        for state in [
            ConnectionState::Disconnected,
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::TimedOut,
        ] {
            assert_eq!(ConnectionState::from_u8(state.as_u8()), state);
        }
    }
}
