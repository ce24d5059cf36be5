//! Server configuration types and defaults.
//!
//! This module contains the server configuration structure and default values
//! used to initialize and customize the realtime space server.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Configuration structure for the space server.
///
/// Contains the network settings, the proximity call radius, the spawn region
/// for newly joined participants and the credential settings used by the
/// connection gatekeeper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The socket address to bind the server to
    pub bind_address: SocketAddr,

    /// Maximum number of concurrent live sessions allowed
    pub max_connections: usize,

    /// Maximum size of a single inbound text frame in bytes
    pub max_message_size: usize,

    /// Distance at or below which two participants are put on a call
    pub call_radius: f64,

    /// Region new participants are dropped into when they join a space
    pub spawn: SpawnRegion,

    /// Timeout applied to every directory lookup, in milliseconds
    pub lookup_timeout_ms: u64,

    /// Credential verification settings
    pub auth: AuthConfig,
}

/// Axis-aligned rectangle spawn positions are drawn from (bounds inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnRegion {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

/// Settings for verifying bearer tokens presented during the handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Shared HMAC secret tokens are signed with
    pub jwt_secret: String,

    /// Clock skew tolerated when checking `exp`, in seconds
    pub leeway_secs: u64,
}

impl ServerConfig {
    /// Directory lookup timeout as a [`Duration`].
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }
}

impl SpawnRegion {
    /// Returns `true` if the point lies inside the region, edges included.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:5000".parse().expect("Invalid default bind address"),
            max_connections: 1000,
            max_message_size: 64 * 1024, // 64KB
            call_radius: 100.0,
            spawn: SpawnRegion::default(),
            lookup_timeout_ms: 5000,
            auth: AuthConfig::default(),
        }
    }
}

impl Default for SpawnRegion {
    fn default() -> Self {
        Self {
            min_x: 549.0,
            max_x: 550.0,
            min_y: 749.0,
            max_y: 750.0,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: std::env::var("JWT_SECRET").unwrap_or_else(|_| "supersecret".to_string()),
            leeway_secs: 0,
        }
    }
}
