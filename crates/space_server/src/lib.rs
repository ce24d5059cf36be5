//! # Space Server - Realtime Layer for Shared 2-D Spaces
//!
//! Participants connect over WebSocket, join a *space* (a room), move their
//! avatar around a 2-D map and are automatically put on media calls with
//! whoever walks within a fixed radius of them. This crate holds the whole
//! realtime layer; account management, space CRUD and the media transport
//! itself live elsewhere.
//!
//! ## Architecture Overview
//!
//! ### Core Components
//!
//! * **Connection Gatekeeper** ([`auth`]) - verifies the bearer token of every
//!   handshake and attaches the caller's identity
//! * **Session** ([`connection`]) - per-connection state: identity, position,
//!   room and media peer identifier
//! * **Room Registry** ([`rooms`]) - which sessions are in which room; rooms
//!   exist only while they have members
//! * **Message Router** ([`messaging`]) - applies `join` and `move` messages
//! * **Proximity Evaluator** ([`proximity`]) - decides who should be on a call
//!   after every move
//! * **Directories** ([`directory`]) - lookups against the account and space
//!   stores
//!
//! ### Message Flow
//!
//! 1. The client connects with `?token=<jwt>`; the gatekeeper admits or
//!    refuses the handshake
//! 2. The client sends `{"type":"join","payload":{"spaceId":..,"peerId":..}}`
//!    and receives `space-joined`; the room receives `user-joined`
//! 3. Every `move` updates the position, is relayed to the room as
//!    `movement` and triggers `call_init` / `removePeerId` signals
//! 4. On disconnect the room receives `user-left`
//!
//! ## Configuration
//!
//! The server is configured through the [`ServerConfig`] struct:
//!
//! * **Network settings** - bind address, connection and message size limits
//! * **Realtime settings** - call radius, spawn region, directory timeout
//! * **Credentials** - JWT secret and clock-skew leeway
//!
//! ## Error Handling
//!
//! Infrastructure failures surface as [`ServerError`]. Failures while handling
//! a client message never escape the router: they are reported to the client
//! as an `error` message.
//!
//! ## Thread Safety
//!
//! * Room membership and live connections use `RwLock<HashMap>` for shared
//!   state
//! * Each session handles its own messages one at a time, in arrival order
//! * Outbound delivery is a push onto an unbounded channel, so nothing waits
//!   on a socket while holding a lock

// Re-export core types and functions for easy access
pub use config::ServerConfig;
pub use directory::InMemoryDirectory;
pub use error::ServerError;
pub use server::{ShutdownState, SpaceServer};
pub use utils::{create_server, create_server_with_config, create_server_with_directory};

// Public module declarations
pub mod auth;
pub mod config;
pub mod connection;
pub mod directory;
pub mod error;
pub mod messaging;
pub mod proximity;
pub mod rooms;
pub mod server;
pub mod utils;

mod tests;
