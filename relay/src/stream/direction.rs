//! Per-SSRC state of a media stream.

use crate::key_frame::KeyFrameRequester;
use network::jitter_buffer::{JitterBufferConfig, SequencedPacketBuffer};
use network::media::MediaKind;
use network::nack::{NackConfig, NackTracker, RetransmitCache, RetransmitConfig};
use network::stats::RtcpStatisticsContext;
use parking_lot::Mutex;

/// State for one upstream source we receive
pub struct InboundDirection {
    pub kind: MediaKind,
    pub ssrc: u32,
    pub clock_rate: u32,
    pub jitter_buffer: Mutex<SequencedPacketBuffer>,
    pub nack: Mutex<NackTracker>,
    pub statistics: Mutex<RtcpStatisticsContext>,
    pub key_frames: Mutex<KeyFrameRequester>,
    /// Time the last RR about this source was queued
    pub last_rr: Mutex<Option<u64>>,
}

impl InboundDirection {
    pub fn new(
        kind: MediaKind,
        ssrc: u32,
        clock_rate: u32,
        jitter_config: JitterBufferConfig,
        nack_config: NackConfig,
        fir_retry_ms: u64,
        fir_max_attempts: u32,
    ) -> Self {
        let max_nack_queue = nack_config.max_queue.min(u16::MAX as usize) as u16;
        let mut jitter_buffer = SequencedPacketBuffer::with_config(jitter_config);
        jitter_buffer.set_timebase(clock_rate);

        Self {
            kind,
            ssrc,
            clock_rate,
            jitter_buffer: Mutex::new(jitter_buffer),
            nack: Mutex::new(NackTracker::new(nack_config)),
            statistics: Mutex::new(RtcpStatisticsContext::new(clock_rate, max_nack_queue)),
            key_frames: Mutex::new(KeyFrameRequester::new(fir_retry_ms, fir_max_attempts)),
            last_rr: Mutex::new(None),
        }
    }
}

/// Counters that fill the sender-info block of our SR
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendCounters {
    pub packets: u32,
    /// Payload octets
    pub octets: u32,
    pub last_rtp_timestamp: u32,
    pub last_send_time: u64,
}

/// State for one downstream SSRC we send on
pub struct OutboundDirection {
    pub kind: MediaKind,
    pub ssrc: u32,
    pub clock_rate: u32,
    pub retransmit: Mutex<RetransmitCache>,
    pub counters: Mutex<SendCounters>,
    /// Time and packet count of the last SR queued
    pub last_sr: Mutex<Option<(u64, u32)>>,
}

impl OutboundDirection {
    pub fn new(kind: MediaKind, ssrc: u32, clock_rate: u32, retransmit: RetransmitConfig) -> Self {
        Self {
            kind,
            ssrc,
            clock_rate,
            retransmit: Mutex::new(RetransmitCache::new(retransmit)),
            counters: Mutex::new(SendCounters::default()),
            last_sr: Mutex::new(None),
        }
    }

    /// RTP timestamp corresponding to `now`, extrapolated from the last packet.
    pub fn rtp_timestamp_at(&self, counters: &SendCounters, now: u64) -> u32 {
        let elapsed = now.saturating_sub(counters.last_send_time);
        let ticks = (elapsed as u128 * self.clock_rate as u128 / 1000) as u32;
        counters.last_rtp_timestamp.wrapping_add(ticks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rtp_timestamp_extrapolation() {
        let direction = OutboundDirection::new(MediaKind::Video, 1, 90_000, RetransmitConfig::default());
        let counters = SendCounters {
            packets: 10,
            octets: 1000,
            last_rtp_timestamp: u32::MAX - 899,
            last_send_time: 1_000,
        };

        assert_eq!(direction.rtp_timestamp_at(&counters, 1_000), u32::MAX - 899);
        // 20 ms at 90 kHz crosses the wrap
        assert_eq!(direction.rtp_timestamp_at(&counters, 1_020), 900);
    }

    #[test]
    fn test_inbound_buffer_has_timebase() {
        let direction = InboundDirection::new(
            MediaKind::Audio,
            7,
            48_000,
            JitterBufferConfig::default(),
            NackConfig::default(),
            1000,
            3,
        );
        assert_eq!(direction.jitter_buffer.lock().timebase(), Some(48_000));
        assert!(!direction.statistics.lock().has_received());
    }
}
