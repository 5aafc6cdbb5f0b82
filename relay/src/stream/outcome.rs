//! Results returned by the stream engine.

use network::stats::{NetworkSnapshot, NetworkStatusLevel, RttSample};

/// What an inbound RTCP datagram caused
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RtcpOutcome {
    /// New RTT samples, keyed by our SSRC
    pub rtt_samples: Vec<(u32, RttSample)>,
    pub sender_reports: usize,
    /// Packets queued for retransmission
    pub retransmitted: usize,
    /// Of those, how many were resent for the first time
    pub lost_retransmitted: usize,
    /// Key-frame requests forwarded upstream
    pub key_frame_requests: usize,
    pub remb: Option<u64>,
    pub bye: bool,
}

/// What one periodic round queued
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub sender_reports: usize,
    pub receiver_reports: usize,
    pub nacks: usize,
    pub key_frame_requests: usize,
}

impl TickReport {
    pub fn merge(&mut self, other: TickReport) {
        self.sender_reports += other.sender_reports;
        self.receiver_reports += other.receiver_reports;
        self.nacks += other.nacks;
        self.key_frame_requests += other.key_frame_requests;
    }
}

/// Aggregate link view for telemetry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkReport {
    pub snapshot: NetworkSnapshot,
    /// Mean latest RTT over our SSRCs, -1 when unknown
    pub rtt: i64,
    pub level: NetworkStatusLevel,
}

/// Receive statistics for one upstream source
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReceiveStats {
    pub expected: i64,
    pub received: i64,
    pub lost: u32,
    pub jitter: f64,
    pub extended_highest_seq: u32,
}
