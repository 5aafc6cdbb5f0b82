//! Telemetry collaborator.

/// Receives operational metrics; never consulted for engine decisions
pub trait TelemetrySink: Send + Sync {
    fn report(&self, stream_id: u32, key: &str, value: i64);
}

/// Discards every metric
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn report(&self, _stream_id: u32, _key: &str, _value: i64) {}
}

/// Telemetry keys
pub mod keys {
    pub const RTT: &str = "rtt";
    pub const AVG_RTT: &str = "avg_rtt";
    pub const SEND_FRACTION_LOST: &str = "send_fraction_lost";
    pub const RECV_FRACTION_LOST: &str = "recv_fraction_lost";
    pub const NETWORK_STATUS: &str = "network_status";
    pub const SEND_BITRATE: &str = "send_bitrate";
    pub const RECV_BITRATE: &str = "recv_bitrate";
    pub const TARGET_BITRATE: &str = "target_bitrate";
    pub const RETRANSMITTED: &str = "retransmitted";
    pub const LOST_RETRANSMITTED: &str = "lost_retransmitted";
}
