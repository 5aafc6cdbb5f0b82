use crate::config::engine_config::{
    ContinuitySection, DepthModeConfig, JitterBufferSection, NackSection, NetworkStatusSection,
    RetransmitSection, RtcpSection, SendQueueSection, SourceConfig, StreamConfig,
};
use crate::config::{LoggingConfig, TransportConfig};
use crate::error::{RelayError, Result};
use serde::Deserialize;
use std::path::Path;

/// Shortest packet spacing assumed when checking a timestamp-span buffer
const MIN_PACKET_INTERVAL_MS: usize = 10;

/// Relay configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub logging: LoggingConfig,
    pub transport: TransportConfig,
    pub stream: StreamConfig,
    pub jitter_buffer: JitterBufferSection,
    pub nack: NackSection,
    pub retransmit: RetransmitSection,
    pub rtcp: RtcpSection,
    pub send_queue: SendQueueSection,
    pub network_status: NetworkStatusSection,
    pub continuity: ContinuitySection,
}

impl RelayConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: RelayConfig = config_loader::load_toml(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: RelayConfig = config_loader::parse_toml(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn builder() -> RelayConfigBuilder {
        RelayConfigBuilder::default()
    }

    /// Rejects values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.jitter_buffer.depth == 0 {
            return Err(RelayError::InvalidConfig(
                "jitter_buffer.depth must be at least 1".to_string(),
            ));
        }
        let (depth, max) = (self.jitter_buffer.depth, self.jitter_buffer.max);
        match self.jitter_buffer.depth_mode {
            DepthModeConfig::PacketCount if max < depth => {
                return Err(RelayError::InvalidConfig(format!(
                    "jitter_buffer.max ({}) is below depth ({})",
                    max, depth
                )));
            }
            // depth is milliseconds here; max packets must be able to span it
            DepthModeConfig::TimestampSpan
                if max.saturating_mul(MIN_PACKET_INTERVAL_MS) < depth =>
            {
                return Err(RelayError::InvalidConfig(format!(
                    "jitter_buffer.max ({} packets) cannot span depth ({} ms) at {} ms per packet",
                    max, depth, MIN_PACKET_INTERVAL_MS
                )));
            }
            _ => {}
        }
        if self.rtcp.tick_ms == 0 {
            return Err(RelayError::InvalidConfig(
                "rtcp.tick_ms must be positive".to_string(),
            ));
        }
        if self.stream.audio_clock_rate == 0 || self.stream.video_clock_rate == 0 {
            return Err(RelayError::InvalidConfig(
                "clock rates must be positive".to_string(),
            ));
        }
        if self.send_queue.capacity == 0 {
            return Err(RelayError::InvalidConfig(
                "send_queue.capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder used by tests and embedders
#[derive(Debug, Clone, Default)]
pub struct RelayConfigBuilder {
    config: RelayConfig,
}

impl RelayConfigBuilder {
    pub fn stream_id(mut self, stream_id: u32) -> Self {
        self.config.stream.stream_id = stream_id;
        self
    }

    pub fn local_ssrc(mut self, ssrc: u32) -> Self {
        self.config.stream.local_ssrc = ssrc;
        self
    }

    pub fn source(mut self, source: SourceConfig) -> Self {
        self.config.stream.sources.push(source);
        self
    }

    pub fn jitter_buffer(mut self, depth: usize, max: usize) -> Self {
        self.config.jitter_buffer.depth = depth;
        self.config.jitter_buffer.max = max;
        self
    }

    pub fn nack_enabled(mut self, enabled: bool) -> Self {
        self.config.nack.enabled = enabled;
        self
    }

    pub fn rtcp(mut self, rtcp: RtcpSection) -> Self {
        self.config.rtcp = rtcp;
        self
    }

    pub fn send_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.send_queue.capacity = capacity;
        self
    }

    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.config.logging = logging;
        self
    }

    pub fn build(self) -> Result<RelayConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
