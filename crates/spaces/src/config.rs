//! Configuration management for the spaces server.
//!
//! This module handles loading, validation, and conversion of server configuration
//! from TOML files and command-line arguments.

use serde::{Deserialize, Serialize};
use space_server::config::{AuthConfig, SpawnRegion};
use space_server::directory::{SpaceInfo, UserProfile};
use space_server::{InMemoryDirectory, ServerConfig};
use std::path::PathBuf;
use tracing::info;

/// Application configuration loaded from TOML file.
///
/// This is the main configuration structure that encompasses all server
/// settings: networking, realtime behavior, credentials, logging and the
/// seed data for the in-process directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration settings
    #[serde(default)]
    pub server: ServerSettings,
    /// Proximity and spawn settings
    #[serde(default)]
    pub realtime: RealtimeSettings,
    /// Credential verification settings
    #[serde(default)]
    pub auth: AuthSettings,
    /// Logging configuration settings
    #[serde(default)]
    pub logging: LoggingSettings,
    /// Spaces and profiles served by the in-process directory
    #[serde(default)]
    pub directory: DirectorySettings,
}

/// Network binding and connection limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Network address to bind the server to (e.g., "127.0.0.1:5000")
    pub bind_address: String,
    /// Maximum number of concurrent client connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Largest inbound text frame accepted, in bytes
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

fn default_max_connections() -> usize {
    1000
}

fn default_max_message_size() -> usize {
    64 * 1024
}

/// Proximity, spawn and directory timing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeSettings {
    /// Distance at or below which two participants are put on a call
    pub call_radius: f64,
    /// Timeout for each directory lookup, in milliseconds
    #[serde(default = "default_lookup_timeout_ms")]
    pub lookup_timeout_ms: u64,
    /// Region joining participants are dropped into
    #[serde(default)]
    pub spawn: SpawnRegion,
}

fn default_lookup_timeout_ms() -> u64 {
    5000
}

/// Credential verification settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthSettings {
    /// Shared token secret. When unset the `JWT_SECRET` environment variable
    /// is used, falling back to the development secret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwt_secret: Option<String>,
    /// Clock skew tolerated when checking token expiry, in seconds
    #[serde(default)]
    pub leeway_secs: u64,
}

/// Logging system configuration.
///
/// Controls log output format and level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    pub json_format: bool,
}

/// Seed data for the in-process directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectorySettings {
    /// Spaces participants may join
    #[serde(default)]
    pub spaces: Vec<SpaceInfo>,
    /// Stored avatar profiles
    #[serde(default)]
    pub users: Vec<UserProfile>,
    /// Avatar handed to accounts without a stored profile. Leave unset to
    /// refuse them with "user data not found!".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_avatar_url: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:5000".to_string(),
            max_connections: default_max_connections(),
            max_message_size: default_max_message_size(),
        }
    }
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            call_radius: 100.0,
            lookup_timeout_ms: default_lookup_timeout_ms(),
            spawn: SpawnRegion::default(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl Default for DirectorySettings {
    fn default() -> Self {
        Self {
            spaces: vec![SpaceInfo {
                id: "lobby".to_string(),
                name: "Lobby".to_string(),
                dimensions: Some("1000x1000".to_string()),
            }],
            users: Vec::new(),
            fallback_avatar_url: None,
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file, creating a default one if missing.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// The loaded (or freshly created default) configuration, or an error if
    /// the file could not be read, parsed or written.
    pub async fn load_from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Converts the application configuration into the library's `ServerConfig`.
    pub fn to_server_config(&self) -> Result<ServerConfig, Box<dyn std::error::Error>> {
        let mut auth = AuthConfig {
            leeway_secs: self.auth.leeway_secs,
            ..AuthConfig::default()
        };
        if let Some(secret) = &self.auth.jwt_secret {
            auth.jwt_secret = secret.clone();
        }

        Ok(ServerConfig {
            bind_address: self.server.bind_address.parse()?,
            max_connections: self.server.max_connections,
            max_message_size: self.server.max_message_size,
            call_radius: self.realtime.call_radius,
            spawn: self.realtime.spawn,
            lookup_timeout_ms: self.realtime.lookup_timeout_ms,
            auth,
        })
    }

    /// Builds the in-process directory from the seed data.
    pub fn to_directory(&self) -> InMemoryDirectory {
        let directory = InMemoryDirectory::seeded(
            self.directory.spaces.iter().cloned(),
            self.directory.users.iter().cloned(),
        );
        match &self.directory.fallback_avatar_url {
            Some(avatar) => directory.with_fallback_avatar(avatar.clone()),
            None => directory,
        }
    }

    /// Validates the configuration for correctness.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the configuration is valid, or an error message describing
    /// the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        // Validate bind address
        if self.server.bind_address.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!("Invalid bind address: {}", &self.server.bind_address));
        }

        if self.server.max_connections == 0 {
            return Err("server.max_connections must be greater than 0".to_string());
        }
        if self.server.max_message_size == 0 {
            return Err("server.max_message_size must be greater than 0".to_string());
        }

        if !self.realtime.call_radius.is_finite() || self.realtime.call_radius <= 0.0 {
            return Err(format!(
                "realtime.call_radius must be a positive number, got {}",
                self.realtime.call_radius
            ));
        }
        if self.realtime.lookup_timeout_ms == 0 {
            return Err("realtime.lookup_timeout_ms must be greater than 0".to_string());
        }

        // Validate spawn bounds
        let spawn = &self.realtime.spawn;
        if ![spawn.min_x, spawn.max_x, spawn.min_y, spawn.max_y]
            .iter()
            .all(|bound| bound.is_finite())
        {
            return Err("Spawn bounds must be finite numbers".to_string());
        }
        if spawn.min_x > spawn.max_x {
            return Err("Spawn min_x must not exceed max_x".to_string());
        }
        if spawn.min_y > spawn.max_y {
            return Err("Spawn min_y must not exceed max_y".to_string());
        }

        if matches!(&self.auth.jwt_secret, Some(secret) if secret.is_empty()) {
            return Err("auth.jwt_secret cannot be empty".to_string());
        }

        // Validate log level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        if let Some(space) = self.directory.spaces.iter().find(|s| s.id.is_empty()) {
            return Err(format!("directory space '{}' has an empty id", space.name));
        }

        Ok(())
    }
}
