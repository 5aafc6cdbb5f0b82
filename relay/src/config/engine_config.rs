//! Engine tuning sections and their conversion into network configs.

use network::continuity::ContinuityConfig;
use network::jitter_buffer::{DepthMode, JitterBufferConfig};
use network::media::MediaKind;
use network::nack::{NackConfig, RetransmitConfig};
use serde::Deserialize;

/// Media kind as written in configuration files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKindConfig {
    Audio,
    Video,
}

impl From<MediaKindConfig> for MediaKind {
    fn from(kind: MediaKindConfig) -> Self {
        match kind {
            MediaKindConfig::Audio => MediaKind::Audio,
            MediaKindConfig::Video => MediaKind::Video,
        }
    }
}

/// One upstream source relayed onto a downstream slot
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub kind: MediaKindConfig,
    pub upstream_ssrc: u32,
    pub downstream_ssrc: u32,
    #[serde(default)]
    pub source_id: u32,
    /// Payload type forced on the slot
    #[serde(default)]
    pub payload_type: Option<u8>,
}

/// Stream identity and media clocks
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub stream_id: u32,
    /// SSRC used as sender of RR and feedback; random when 0
    pub local_ssrc: u32,
    pub audio_clock_rate: u32,
    pub video_clock_rate: u32,
    pub sources: Vec<SourceConfig>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        StreamConfig {
            stream_id: 1,
            local_ssrc: 0,
            audio_clock_rate: MediaKind::Audio.default_clock_rate(),
            video_clock_rate: MediaKind::Video.default_clock_rate(),
            sources: Vec::new(),
        }
    }
}

impl StreamConfig {
    pub fn clock_rate(&self, kind: MediaKind) -> u32 {
        match kind {
            MediaKind::Audio => self.audio_clock_rate,
            MediaKind::Video => self.video_clock_rate,
        }
    }
}

/// Jitter buffer readiness measure as written in configuration files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthModeConfig {
    #[default]
    PacketCount,
    TimestampSpan,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JitterBufferSection {
    pub depth: usize,
    pub max: usize,
    pub depth_mode: DepthModeConfig,
}

impl Default for JitterBufferSection {
    fn default() -> Self {
        JitterBufferSection {
            depth: 5,
            max: 100,
            depth_mode: DepthModeConfig::PacketCount,
        }
    }
}

impl JitterBufferSection {
    pub fn to_config(&self) -> JitterBufferConfig {
        let mode = match self.depth_mode {
            DepthModeConfig::PacketCount => DepthMode::PacketCount,
            DepthModeConfig::TimestampSpan => DepthMode::TimestampSpan,
        };
        JitterBufferConfig::new(self.depth, self.max).with_mode(mode)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NackSection {
    pub enabled: bool,
    pub max_queue: usize,
    pub max_behind: u16,
    pub missing_wait_ms: u64,
    pub nacked_wait_ms: u64,
    pub max_retries: u32,
    pub storm_limit: usize,
    pub key_frame_interval_ms: u64,
}

impl Default for NackSection {
    fn default() -> Self {
        let defaults = NackConfig::default();
        NackSection {
            enabled: true,
            max_queue: defaults.max_queue,
            max_behind: defaults.max_behind,
            missing_wait_ms: defaults.missing_wait_ms,
            nacked_wait_ms: defaults.nacked_wait_ms,
            max_retries: defaults.max_retries,
            storm_limit: defaults.storm_limit,
            key_frame_interval_ms: defaults.key_frame_interval_ms,
        }
    }
}

impl NackSection {
    pub fn to_config(&self) -> NackConfig {
        NackConfig {
            max_queue: self.max_queue,
            max_behind: self.max_behind,
            missing_wait_ms: self.missing_wait_ms,
            nacked_wait_ms: self.nacked_wait_ms,
            max_retries: self.max_retries,
            storm_limit: self.storm_limit,
            key_frame_interval_ms: self.key_frame_interval_ms,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetransmitSection {
    pub capacity: usize,
    pub max_attempts: u32,
    pub wait_ms: u64,
}

impl Default for RetransmitSection {
    fn default() -> Self {
        let defaults = RetransmitConfig::default();
        RetransmitSection {
            capacity: defaults.capacity,
            max_attempts: defaults.max_attempts,
            wait_ms: defaults.retransmit_wait_ms,
        }
    }
}

impl RetransmitSection {
    pub fn to_config(&self) -> RetransmitConfig {
        RetransmitConfig {
            capacity: self.capacity,
            max_attempts: self.max_attempts,
            retransmit_wait_ms: self.wait_ms,
        }
    }
}

/// Periodic RTCP cadence
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RtcpSection {
    pub rr_interval_ms: u64,
    pub sr_interval_ms: u64,
    pub tick_ms: u64,
    pub history_depth: usize,
    pub fir_retry_ms: u64,
    /// Unanswered key-frame requests sent before giving up
    pub fir_max_attempts: u32,
    /// Local hostname-like identifier sent in SDES
    pub cname: String,
}

impl Default for RtcpSection {
    fn default() -> Self {
        RtcpSection {
            rr_interval_ms: 1000,
            sr_interval_ms: 500,
            tick_ms: 10,
            history_depth: 60,
            fir_retry_ms: 1000,
            fir_max_attempts: 3,
            cname: "relay".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SendQueueSection {
    pub capacity: usize,
    pub idle_sleep_ms: u64,
}

impl Default for SendQueueSection {
    fn default() -> Self {
        SendQueueSection {
            capacity: 2048,
            idle_sleep_ms: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkStatusSection {
    pub window_ms: u64,
}

impl Default for NetworkStatusSection {
    fn default() -> Self {
        NetworkStatusSection { window_ms: 3000 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContinuitySection {
    pub ts_step: u32,
    pub seq_jump_warn: u16,
}

impl Default for ContinuitySection {
    fn default() -> Self {
        let defaults = ContinuityConfig::default();
        ContinuitySection {
            ts_step: defaults.ts_step,
            seq_jump_warn: defaults.seq_jump_warn,
        }
    }
}

impl ContinuitySection {
    pub fn to_config(&self) -> ContinuityConfig {
        ContinuityConfig {
            ts_step: self.ts_step,
            seq_jump_warn: self.seq_jump_warn,
        }
    }
}
