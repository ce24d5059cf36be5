//! Connection manager for tracking live sessions.
//!
//! This module provides the process-wide view of every connection that has
//! passed the gatekeeper, used for connection limits, shutdown and health
//! reporting. Room membership is tracked separately by the room
//! registry.

use super::{session::Session, ConnectionId};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Bookkeeping kept for each live connection.
#[derive(Debug, Clone)]
struct ClientConnection {
    session: Arc<Session>,
    remote_addr: SocketAddr,
}

/// Central manager for all live connections.
///
/// # Architecture
///
/// * Uses `RwLock<HashMap>` for thread-safe connection storage
/// * Holds the `Arc<Session>` created for each admitted connection
/// * Lets the gatekeeper enforce the configured connection limit
#[derive(Debug, Default)]
pub struct ConnectionManager {
    /// Map of connection ID to connection information
    connections: Arc<RwLock<HashMap<ConnectionId, ClientConnection>>>,
}

impl ConnectionManager {
    /// Creates an empty connection manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a newly admitted session.
    pub async fn add_connection(&self, session: Arc<Session>, remote_addr: SocketAddr) {
        let connection_id = session.id();
        let mut connections = self.connections.write().await;
        connections.insert(connection_id, ClientConnection { session, remote_addr });
        info!("🔗 Connection {} from {}", connection_id, remote_addr);
    }

    /// Removes a connection. Safe to call more than once.
    pub async fn remove_connection(&self, connection_id: ConnectionId) {
        let mut connections = self.connections.write().await;
        if let Some(connection) = connections.remove(&connection_id) {
            info!(
                "❌ Connection {} from {} disconnected",
                connection_id, connection.remote_addr
            );
        }
    }

    /// Number of live connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Asks every live connection to close, used during shutdown.
    pub async fn disconnect_all(&self, reason: &str) -> usize {
        let connections = self.connections.read().await;
        for connection in connections.values() {
            connection.session.disconnect(reason);
        }
        connections.len()
    }
}
