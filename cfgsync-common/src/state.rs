//! # Lifecycle State
//!
//! Every long-lived client moves through `Uninitialized -> Normal -> Closed`
//! exactly once. Transitions happen under the owner's lock; reads from other
//! threads go through an atomic load.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of a connection-owning component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    /// Constructed, `init` not yet completed.
    Uninitialized = 0,
    /// Initialized and serving.
    Normal = 1,
    /// Terminal. A new instance is needed to reconnect.
    Closed = 2,
}

impl ConnectionState {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ConnectionState::Uninitialized,
            1 => ConnectionState::Normal,
            _ => ConnectionState::Closed,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Uninitialized => "uninitialized",
            ConnectionState::Normal => "normal",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Atomic cell holding a [`ConnectionState`].
///
/// `Closed` is sticky: once stored, no other state can replace it.
#[derive(Debug)]
pub struct AtomicState(AtomicU8);

impl AtomicState {
    /// Creates a cell in the `Uninitialized` state.
    pub const fn new() -> Self {
        AtomicState(AtomicU8::new(ConnectionState::Uninitialized as u8))
    }

    /// Returns the current state.
    #[inline]
    pub fn load(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves `from -> to`. Returns false when the current state is not `from`.
    pub fn transition(&self, from: ConnectionState, to: ConnectionState) -> bool {
        if from == ConnectionState::Closed {
            return false;
        }
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Moves to `Closed`. Returns the previous state.
    pub fn close(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.swap(ConnectionState::Closed as u8, Ordering::AcqRel))
    }

    /// True while the state is `Normal`.
    #[inline]
    pub fn is_normal(&self) -> bool {
        self.load() == ConnectionState::Normal
    }
}

impl Default for AtomicState {
    fn default() -> Self {
        Self::new()
    }
}
