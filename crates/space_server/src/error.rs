//! Error types and handling for the space server.
//!
//! This module defines the error types that can occur during server operations,
//! providing clear categorization of the different failure modes a live
//! connection can run into.

use crate::connection::ConnectionId;
use std::time::Duration;

/// Enumeration of possible server errors.
///
/// Categorizes errors into network-related, configuration and internal server
/// errors to help with debugging and error handling.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Network-related errors such as binding failures or connection issues
    #[error("Network error: {0}")]
    Network(String),

    /// Configuration values that cannot be turned into a running server
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Reasons a connection is refused by the gatekeeper before a session exists.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AuthError {
    /// No token in the handshake query string or `Authorization` header
    #[error("No token provided")]
    MissingCredential,

    /// Signature, expiry or claim shape did not verify
    #[error("Invalid token: {0}")]
    InvalidCredential(String),

    /// The server is already holding its configured maximum of live sessions
    #[error("Connection limit of {0} reached")]
    ConnectionLimit(usize),
}

/// Failures reported by the external user and space directories.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DirectoryError {
    /// The backing store could not answer
    #[error("Directory unavailable: {0}")]
    Unavailable(String),

    /// The lookup did not complete within the configured boundary timeout
    #[error("Directory lookup timed out after {0:?}")]
    Timeout(Duration),
}

/// Outcomes of handling a single inbound message that are not a plain success.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    /// The join referenced data that does not exist. Reported to the client,
    /// after which the connection is closed.
    #[error("{0}")]
    Validation(String),

    /// Unexpected failure while handling the message. Reported generically,
    /// the connection stays open.
    #[error("Runtime fault: {0}")]
    Fault(String),

    /// The frame could not be decoded into a known message shape.
    #[error("Malformed message: {0}")]
    Malformed(String),
}

impl From<DirectoryError> for SessionError {
    fn from(error: DirectoryError) -> Self {
        SessionError::Fault(error.to_string())
    }
}

/// A send to a session's outbound channel failed because its writer is gone.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Connection {0} is no longer accepting messages")]
pub struct DeliveryError(pub ConnectionId);
