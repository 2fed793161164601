//! Error types for the chat server
//!
//! Defines application-level errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Application-level errors
///
/// Handler errors are logged at the worker loop and never cross into other
/// connections or rooms. Config errors are fatal at startup.
#[derive(Debug, Error)]
pub enum AppError {
    /// IO error (read/write failure, broken pipe, bind failure)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Peer closed the connection before sending a request line
    #[error("Connection closed before a request line was received")]
    EmptyRequest,

    /// Peer did not send a complete request in time
    #[error("Timed out waiting for the request")]
    RequestTimeout,

    /// Invalid configuration value
    #[error("Invalid value for {key}: '{value}'")]
    Config { key: String, value: String },
}
