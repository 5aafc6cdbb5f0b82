//! Jitter buffer statistics

/// Counters for the jitter buffer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JitterBufferStats {
    /// Packets accepted into the buffer
    pub packets_pushed: u64,
    /// Packets handed out by `pop`
    pub packets_released: u64,
    /// Packets discarded (duplicates)
    pub packets_duplicate: u64,
    /// Packets discarded (at or behind the last release)
    pub packets_late: u64,
    /// Packets dropped to stay within capacity
    pub packets_evicted: u64,
}
