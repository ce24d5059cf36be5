//! Core server implementation and connection handling.
//!
//! This module contains the main space server structure, the per-connection
//! handler and the shutdown state shared with the application layer.

pub mod core;
pub mod handlers;
pub mod shutdown;

pub use core::SpaceServer;
pub use handlers::ConnectionLimits;
pub use shutdown::ShutdownState;
