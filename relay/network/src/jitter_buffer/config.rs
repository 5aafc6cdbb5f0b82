//! Jitter buffer configuration

/// How readiness depth is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DepthMode {
    /// `depth` is a number of buffered packets
    #[default]
    PacketCount,
    /// `depth` is milliseconds of media between the oldest and newest timestamp
    TimestampSpan,
}

/// Configuration for the sequence-ordered jitter buffer
#[derive(Debug, Clone)]
pub struct JitterBufferConfig {
    /// Reorder tolerance before packets are released
    pub depth: usize,
    /// Capacity is `max + 1` entries
    pub max: usize,
    pub mode: DepthMode,
}

impl JitterBufferConfig {
    pub fn new(depth: usize, max: usize) -> Self {
        Self {
            depth,
            max,
            mode: DepthMode::PacketCount,
        }
    }

    pub fn with_mode(mut self, mode: DepthMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn capacity(&self) -> usize {
        self.max + 1
    }
}

impl Default for JitterBufferConfig {
    fn default() -> Self {
        Self {
            depth: 5,                      // Hold five packets for reordering
            max: 100,                      // Capacity of 101 packets
            mode: DepthMode::PacketCount, // Count-based readiness
        }
    }
}
