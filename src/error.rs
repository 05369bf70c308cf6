//! Error types for rgbclient
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using RgbError
pub type Result<T> = std::result::Result<T, RgbError>;

/// Unified error type for rgbclient operations
#[derive(Debug, Error)]
pub enum RgbError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    /// Any failure of the underlying stream, including end-of-stream
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    /// The server sent bytes that are not a valid frame
    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RgbError {
    /// Whether this error is an I/O failure of the underlying stream
    pub fn is_io(&self) -> bool {
        matches!(self, RgbError::Io(_))
    }
}
