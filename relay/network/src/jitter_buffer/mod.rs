//! Sequence-ordered jitter buffer
//!
//! Packets are held in circular sequence order until enough of them are
//! buffered to tolerate network reordering, then released smallest first.

mod config;
mod stats;

pub use config::{DepthMode, JitterBufferConfig};
pub use stats::JitterBufferStats;

use crate::codec::rtp::RtpPacketView;
use crate::codec::sequence::{SequenceUnwrapper, is_ahead};
use std::collections::BTreeMap;

/// Why a packet was not accepted by [`SequencedPacketBuffer::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushRejection {
    /// Sequence at or behind the last released packet
    Late,
    /// Sequence already buffered
    Duplicate,
}

/// Jitter buffer keyed by unwrapped sequence number
pub struct SequencedPacketBuffer {
    config: JitterBufferConfig,
    buffer: BTreeMap<u64, RtpPacketView>,
    unwrapper: SequenceUnwrapper,
    last_released: Option<u16>,
    timebase: Option<u32>,
    stats: JitterBufferStats,
}

impl SequencedPacketBuffer {
    pub fn new() -> Self {
        Self::with_config(JitterBufferConfig::default())
    }

    pub fn with_config(config: JitterBufferConfig) -> Self {
        Self {
            config,
            buffer: BTreeMap::new(),
            unwrapper: SequenceUnwrapper::new(),
            last_released: None,
            timebase: None,
            stats: JitterBufferStats::default(),
        }
    }

    /// Inserts a packet, evicting the oldest entry if capacity is reached.
    pub fn push(&mut self, packet: RtpPacketView) -> Result<(), PushRejection> {
        let sequence = packet.sequence_number();

        if self.is_late(sequence) {
            self.stats.packets_late += 1;
            return Err(PushRejection::Late);
        }

        let key = self.unwrapper.peek(sequence).0;
        if self.buffer.contains_key(&key) {
            self.stats.packets_duplicate += 1;
            return Err(PushRejection::Duplicate);
        }
        self.unwrapper.unwrap(sequence);

        if self.buffer.len() + 1 > self.config.capacity() {
            self.evict_oldest();
        }

        self.buffer.insert(key, packet);
        self.stats.packets_pushed += 1;
        Ok(())
    }

    /// Releases the oldest packet.
    ///
    /// Without `force`, returns `None` and leaves the buffer untouched until
    /// [`has_data`](Self::has_data) reports true.
    pub fn pop(&mut self, force: bool) -> Option<RtpPacketView> {
        if !force && !self.has_data() {
            return None;
        }

        let (_, packet) = self.buffer.pop_first()?;
        self.last_released = Some(packet.sequence_number());
        self.stats.packets_released += 1;
        Some(packet)
    }

    /// True once the configured depth is buffered and a timebase is set.
    pub fn has_data(&self) -> bool {
        let Some(timebase) = self.timebase else {
            return false;
        };
        if self.buffer.is_empty() {
            return false;
        }

        match self.config.mode {
            DepthMode::PacketCount => self.buffer.len() >= self.config.depth,
            DepthMode::TimestampSpan => {
                let required = self.config.depth as u64 * timebase as u64 / 1000;
                self.timestamp_span() as u64 >= required
            }
        }
    }

    /// Records the stream clock rate in Hz.
    pub fn set_timebase(&mut self, hz: u32) {
        self.timebase = (hz > 0).then_some(hz);
    }

    pub fn timebase(&self) -> Option<u32> {
        self.timebase
    }

    pub fn size(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity()
    }

    pub fn last_released_seq(&self) -> Option<u16> {
        self.last_released
    }

    pub fn stats(&self) -> &JitterBufferStats {
        &self.stats
    }

    /// Drops every entry and forgets the last released sequence.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.unwrapper.reset();
        self.last_released = None;
    }

    fn is_late(&self, sequence: u16) -> bool {
        match self.last_released {
            Some(released) => !is_ahead(released, sequence),
            None => false,
        }
    }

    fn evict_oldest(&mut self) {
        if self.buffer.pop_first().is_some() {
            self.stats.packets_evicted += 1;
        }
    }

    /// Wrap-aware timestamp distance between the oldest and newest entry.
    fn timestamp_span(&self) -> u32 {
        match (self.buffer.first_key_value(), self.buffer.last_key_value()) {
            (Some((_, oldest)), Some((_, newest))) => {
                newest.timestamp().wrapping_sub(oldest.timestamp())
            }
            _ => 0,
        }
    }
}

impl Default for SequencedPacketBuffer {
    fn default() -> Self {
        Self::new()
    }
}
