//! Connection management for participant sessions.
//!
//! This module handles the lifecycle of live connections: the per-connection
//! [`Session`] state and the [`ConnectionManager`] that tracks every session
//! currently open on this process.

pub mod manager;
pub mod session;

pub use manager::ConnectionManager;
pub use session::{Outbound, Position, Session, SessionState};

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of a single live connection.
///
/// Connection IDs are ephemeral: a participant who reconnects gets a new one.
/// On the wire they serialize as a plain UUID string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Generates a fresh random connection ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
