//! Network error types
//!
//! This module defines the error types used throughout the network crate.
//! All errors are wrapped in `NetworkError` for consistent error handling.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, NetworkError>;

/// Network-related errors
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("RTP error: {0}")]
    Rtp(String),
    #[error("RTCP error: {0}")]
    Rtcp(String),
    #[error("Invalid packet: {0}")]
    InvalidPacket(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_network() {
        let err = NetworkError::Network("Connection refused".to_string());
        assert_eq!(err.to_string(), "Network error: Connection refused");
    }

    #[test]
    fn test_error_display_rtp() {
        let err = NetworkError::Rtp("Invalid packet format".to_string());
        assert_eq!(err.to_string(), "RTP error: Invalid packet format");
    }

    #[test]
    fn test_error_display_rtcp() {
        let err = NetworkError::Rtcp("SR packet too short".to_string());
        assert_eq!(err.to_string(), "RTCP error: SR packet too short");
    }

    #[test]
    fn test_error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "busy");
        let network_err: NetworkError = io_err.into();

        match network_err {
            NetworkError::Io(_) => {}
            _ => panic!("Expected NetworkError::Io"),
        }
    }

    #[test]
    fn test_error_is_error_trait() {
        let err = NetworkError::InvalidPacket("Test".to_string());
        let _: &dyn std::error::Error = &err;
    }
}
