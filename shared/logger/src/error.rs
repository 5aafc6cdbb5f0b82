//! Error types for logging operations.

use std::io;
use thiserror::Error;

/// Result type for logging operations.
pub type Result<T> = std::result::Result<T, LoggingError>;

/// Errors that can occur while setting up a logger.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// I/O error from file operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The log path cannot be split into a directory and a file name.
    #[error("Invalid log path: {0}")]
    InvalidPath(String),
    /// The file appender could not be initialized.
    #[error("Logging error: {0}")]
    Logging(String),
}
