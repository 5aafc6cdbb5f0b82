//! Media direction helpers.

/// Default RTP clock rate for audio (Opus).
pub const AUDIO_CLOCK_RATE: u32 = 48_000;
/// Default RTP clock rate for video.
pub const VIDEO_CLOCK_RATE: u32 = 90_000;

/// Kind of media carried by a stream direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    /// Clock rate assumed when none is negotiated.
    pub fn default_clock_rate(self) -> u32 {
        match self {
            MediaKind::Audio => AUDIO_CLOCK_RATE,
            MediaKind::Video => VIDEO_CLOCK_RATE,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_clock_rates() {
        assert_eq!(MediaKind::Audio.default_clock_rate(), 48_000);
        assert_eq!(MediaKind::Video.default_clock_rate(), 90_000);
    }
}
