//! Relay configuration

pub mod engine_config;
pub mod logging_config;
pub mod relay_config;
pub mod transport_config;

pub use engine_config::{
    ContinuitySection, DepthModeConfig, JitterBufferSection, MediaKindConfig, NackSection,
    NetworkStatusSection, RetransmitSection, RtcpSection, SendQueueSection, SourceConfig,
    StreamConfig,
};
pub use logging_config::LoggingConfig;
pub use relay_config::{RelayConfig, RelayConfigBuilder};
pub use transport_config::TransportConfig;
