//! Utility functions and helper methods for the space server.
//!
//! This module provides convenient factory functions for creating server
//! instances with different configurations.

use crate::{config::ServerConfig, directory::InMemoryDirectory, server::SpaceServer};
use std::sync::Arc;

/// Creates a new space server with default configuration and an empty
/// in-memory directory.
///
/// Every join against such a server fails until spaces and profiles are
/// added, so this is mostly useful in tests.
///
/// # Example
///
/// ```rust
/// use space_server::create_server;
///
/// let server = create_server();
/// assert_eq!(server.config().call_radius, 100.0);
/// ```
pub fn create_server() -> SpaceServer {
    create_server_with_config(ServerConfig::default())
}

/// Creates a new space server with custom configuration and an empty
/// in-memory directory.
pub fn create_server_with_config(config: ServerConfig) -> SpaceServer {
    create_server_with_directory(config, Arc::new(InMemoryDirectory::new()))
}

/// Creates a space server backed by the given in-memory directory.
///
/// # Example
///
/// ```rust
/// use space_server::{create_server_with_directory, InMemoryDirectory, ServerConfig};
/// use space_server::directory::SpaceInfo;
/// use std::sync::Arc;
///
/// let directory = Arc::new(InMemoryDirectory::new());
/// directory.insert_space(SpaceInfo {
///     id: "lobby".to_string(),
///     name: "Lobby".to_string(),
///     dimensions: None,
/// });
///
/// let config = ServerConfig {
///     bind_address: "0.0.0.0:9000".parse().unwrap(),
///     max_connections: 5000,
///     ..Default::default()
/// };
/// let server = create_server_with_directory(config, directory);
/// ```
pub fn create_server_with_directory(config: ServerConfig, directory: Arc<InMemoryDirectory>) -> SpaceServer {
    SpaceServer::new(config, directory.clone(), directory)
}
