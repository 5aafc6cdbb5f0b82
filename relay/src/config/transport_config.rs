use crate::error::{RelayError, Result};
use serde::Deserialize;
use std::net::SocketAddr;

/// UDP transport configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub bind_address: String,
    pub port: u16,
    /// Where relayed media goes; learned from the first datagram when unset
    pub remote_address: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            bind_address: "0.0.0.0".to_string(),
            port: 5004,
            remote_address: None,
        }
    }
}

impl TransportConfig {
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.bind_address, self.port)
            .parse()
            .map_err(|e| RelayError::InvalidConfig(format!("bind address: {}", e)))
    }

    pub fn remote_addr(&self) -> Result<Option<SocketAddr>> {
        self.remote_address
            .as_deref()
            .map(|addr| {
                addr.parse()
                    .map_err(|e| RelayError::InvalidConfig(format!("remote address: {}", e)))
            })
            .transpose()
    }
}
