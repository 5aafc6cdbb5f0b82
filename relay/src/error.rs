//! Relay error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RelayError>;

/// Errors surfaced by the relay engine and binary
#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Network(#[from] network::NetworkError),
    #[error("Configuration error: {0}")]
    Config(#[from] config_loader::ConfigError),
    #[error("Logging error: {0}")]
    Logging(#[from] logging::LoggingError),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Unknown SSRC: {0:#010x}")]
    UnknownSsrc(u32),
}
