//! Windowed loss and bitrate bookkeeping, plus the network quality scale.

use crate::media::MediaKind;
use std::collections::HashMap;

/// Default bookkeeping window.
pub const DEFAULT_WINDOW_MS: u64 = 3000;

/// Ordinal link quality, worst last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NetworkStatusLevel {
    Unknown,
    Great,
    Good,
    NotGood,
    Bad,
    VeryBad,
    CantConnect,
}

impl NetworkStatusLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            NetworkStatusLevel::Unknown => "unknown",
            NetworkStatusLevel::Great => "great",
            NetworkStatusLevel::Good => "good",
            NetworkStatusLevel::NotGood => "not_good",
            NetworkStatusLevel::Bad => "bad",
            NetworkStatusLevel::VeryBad => "very_bad",
            NetworkStatusLevel::CantConnect => "cant_connect",
        }
    }
}

fn level_from_loss(fraction_lost: u32) -> NetworkStatusLevel {
    match fraction_lost {
        0..=1 => NetworkStatusLevel::Great,
        2..=4 => NetworkStatusLevel::Good,
        5..=10 => NetworkStatusLevel::NotGood,
        11..=50 => NetworkStatusLevel::Bad,
        51..=80 => NetworkStatusLevel::VeryBad,
        _ => NetworkStatusLevel::CantConnect,
    }
}

fn level_from_rtt(rtt: i64) -> NetworkStatusLevel {
    match rtt {
        i64::MIN..=-1 => NetworkStatusLevel::Unknown,
        400.. => NetworkStatusLevel::VeryBad,
        300..=399 => NetworkStatusLevel::Bad,
        150..=299 => NetworkStatusLevel::NotGood,
        80..=149 => NetworkStatusLevel::Good,
        _ => NetworkStatusLevel::Great,
    }
}

/// Worse of the loss level (percent) and the RTT level (ms, negative when unknown).
pub fn network_status_level(fraction_lost: u32, rtt: i64) -> NetworkStatusLevel {
    level_from_loss(fraction_lost).max(level_from_rtt(rtt))
}

/// Send-side loss for one local SSRC as reported by the remote peer
#[derive(Debug, Clone, Default)]
struct SendLossWindow {
    window_start: u64,
    highest_seq: u32,
    cumulative_lost: u32,
    fraction_lost: u32,
    expected_in_window: u32,
    lost_in_window: u32,
}

impl SendLossWindow {
    fn start(highest_seq: u32, cumulative_lost: u32, now: u64) -> Self {
        Self {
            window_start: now,
            highest_seq,
            cumulative_lost,
            ..Self::default()
        }
    }

    fn update(&mut self, highest_seq: u32, cumulative_lost: u32, now: u64, window_ms: u64) {
        if now.saturating_sub(self.window_start) < window_ms {
            return;
        }

        let seq_delta = highest_seq.wrapping_sub(self.highest_seq) as i32 as i64;
        let lost_delta = cumulative_lost as i64 - self.cumulative_lost as i64;
        if seq_delta > 0 && lost_delta >= 0 {
            self.fraction_lost = (lost_delta * 100 / seq_delta) as u32;
        }

        self.window_start = now;
        self.highest_seq = highest_seq;
        self.cumulative_lost = cumulative_lost;
        self.expected_in_window = seq_delta.max(0) as u32;
        self.lost_in_window = lost_delta.max(0) as u32;
    }
}

/// Byte counter that turns into a bitrate once per window
#[derive(Debug, Clone, Default)]
struct BitrateWindow {
    window_start: Option<u64>,
    bytes: u64,
    bitrate: u64,
}

impl BitrateWindow {
    fn add(&mut self, bytes: usize, now: u64, window_ms: u64) {
        let start = *self.window_start.get_or_insert(now);
        self.bytes += bytes as u64;

        let elapsed = now.saturating_sub(start);
        if elapsed >= window_ms && elapsed > 0 {
            self.bitrate = self.bytes * 8 * 1000 / elapsed;
            self.bytes = 0;
            self.window_start = Some(now);
        }
    }
}

/// Point-in-time view of a stream's link statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSnapshot {
    pub send_fraction_lost: u32,
    pub receive_fraction_lost: u32,
    pub send_bitrate: u64,
    pub receive_bitrate: u64,
    pub audio_receive_bitrate: u64,
    pub video_receive_bitrate: u64,
    /// Sum of the known REMB estimates, -1 when none arrived
    pub target_bitrate: i64,
    pub packets_sent: u64,
    pub packets_received: u64,
}

/// Loss and bitrate tracker for one stream
#[derive(Debug, Clone)]
pub struct LossAndBitrateTracker {
    window_ms: u64,
    send_loss: HashMap<u32, SendLossWindow>,
    send_fraction_lost: u32,
    /// Receive-side fraction per upstream SSRC
    receive_loss: HashMap<u32, u32>,
    send_bitrate: BitrateWindow,
    receive_bitrate: BitrateWindow,
    audio_receive_bitrate: BitrateWindow,
    video_receive_bitrate: BitrateWindow,
    audio_target_bitrate: Option<u64>,
    video_target_bitrate: Option<u64>,
    packets_sent: u64,
    packets_received: u64,
}

impl LossAndBitrateTracker {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            send_loss: HashMap::new(),
            send_fraction_lost: 0,
            receive_loss: HashMap::new(),
            send_bitrate: BitrateWindow::default(),
            receive_bitrate: BitrateWindow::default(),
            audio_receive_bitrate: BitrateWindow::default(),
            video_receive_bitrate: BitrateWindow::default(),
            audio_target_bitrate: None,
            video_target_bitrate: None,
            packets_sent: 0,
            packets_received: 0,
        }
    }

    /// Feeds a report block about one of our SSRCs.
    ///
    /// The first report per SSRC sets the baseline; later ones recompute the
    /// fraction only when the window has elapsed.
    pub fn on_receiver_report(&mut self, ssrc: u32, highest_seq: u32, cumulative_lost: u32, now: u64) {
        let window_ms = self.window_ms;
        match self.send_loss.get_mut(&ssrc) {
            Some(window) => window.update(highest_seq, cumulative_lost, now, window_ms),
            None => {
                self.send_loss
                    .insert(ssrc, SendLossWindow::start(highest_seq, cumulative_lost, now));
            }
        }
        self.recompute_send_fraction();
    }

    fn recompute_send_fraction(&mut self) {
        let (expected, lost) = self
            .send_loss
            .values()
            .fold((0u64, 0u64), |(e, l), w| {
                (e + w.expected_in_window as u64, l + w.lost_in_window as u64)
            });
        if expected > 0 {
            self.send_fraction_lost = (lost * 100 / expected) as u32;
        }
    }

    /// Send-side fraction for one SSRC in percent.
    pub fn fraction_lost_of(&self, ssrc: u32) -> u32 {
        self.send_loss.get(&ssrc).map(|w| w.fraction_lost).unwrap_or(0)
    }

    /// Receive-side fraction in percent for one upstream SSRC, computed by
    /// its receive statistics.
    pub fn set_receive_fraction_lost(&mut self, ssrc: u32, fraction: u32) {
        self.receive_loss.insert(ssrc, fraction);
    }

    /// Forgets the receive-side fraction of a source that went away.
    pub fn remove_receive_source(&mut self, ssrc: u32) {
        self.receive_loss.remove(&ssrc);
    }

    /// Worst receive-side fraction over every upstream SSRC.
    pub fn receive_fraction_lost(&self) -> u32 {
        self.receive_loss.values().copied().max().unwrap_or(0)
    }

    /// Larger of the send and receive fractions.
    pub fn fraction_lost(&self) -> u32 {
        self.send_fraction_lost.max(self.receive_fraction_lost())
    }

    pub fn on_packet_sent(&mut self, bytes: usize, now: u64) {
        self.packets_sent += 1;
        self.send_bitrate.add(bytes, now, self.window_ms);
    }

    pub fn on_packet_received(&mut self, kind: MediaKind, bytes: usize, now: u64) {
        self.packets_received += 1;
        self.receive_bitrate.add(bytes, now, self.window_ms);
        match kind {
            MediaKind::Audio => self.audio_receive_bitrate.add(bytes, now, self.window_ms),
            MediaKind::Video => self.video_receive_bitrate.add(bytes, now, self.window_ms),
        }
    }

    /// Stores an externally estimated target bitrate (REMB).
    pub fn set_target_bitrate(&mut self, kind: MediaKind, bps: u64) {
        match kind {
            MediaKind::Audio => self.audio_target_bitrate = Some(bps),
            MediaKind::Video => self.video_target_bitrate = Some(bps),
        }
    }

    pub fn target_bitrate(&self) -> i64 {
        match (self.audio_target_bitrate, self.video_target_bitrate) {
            (None, None) => -1,
            (audio, video) => (audio.unwrap_or(0) + video.unwrap_or(0)) as i64,
        }
    }

    /// Quality level given the current loss and an RTT in ms.
    pub fn status_level(&self, rtt: i64) -> NetworkStatusLevel {
        network_status_level(self.fraction_lost(), rtt)
    }

    pub fn snapshot(&self) -> NetworkSnapshot {
        NetworkSnapshot {
            send_fraction_lost: self.send_fraction_lost,
            receive_fraction_lost: self.receive_fraction_lost(),
            send_bitrate: self.send_bitrate.bitrate,
            receive_bitrate: self.receive_bitrate.bitrate,
            audio_receive_bitrate: self.audio_receive_bitrate.bitrate,
            video_receive_bitrate: self.video_receive_bitrate.bitrate,
            target_bitrate: self.target_bitrate(),
            packets_sent: self.packets_sent,
            packets_received: self.packets_received,
        }
    }
}

impl Default for LossAndBitrateTracker {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loss_thresholds() {
        assert_eq!(network_status_level(0, 0), NetworkStatusLevel::Great);
        assert_eq!(network_status_level(1, 0), NetworkStatusLevel::Great);
        assert_eq!(network_status_level(4, 0), NetworkStatusLevel::Good);
        assert_eq!(network_status_level(10, 0), NetworkStatusLevel::NotGood);
        assert_eq!(network_status_level(50, 0), NetworkStatusLevel::Bad);
        assert_eq!(network_status_level(80, 0), NetworkStatusLevel::VeryBad);
        assert_eq!(network_status_level(81, 0), NetworkStatusLevel::CantConnect);
    }

    #[test]
    fn test_rtt_thresholds() {
        assert_eq!(network_status_level(0, 79), NetworkStatusLevel::Great);
        assert_eq!(network_status_level(0, 80), NetworkStatusLevel::Good);
        assert_eq!(network_status_level(0, 150), NetworkStatusLevel::NotGood);
        assert_eq!(network_status_level(0, 300), NetworkStatusLevel::Bad);
        assert_eq!(network_status_level(0, 400), NetworkStatusLevel::VeryBad);
    }

    #[test]
    fn test_worse_of_both_wins() {
        assert_eq!(network_status_level(30, 90), NetworkStatusLevel::Bad);
        assert_eq!(network_status_level(2, 450), NetworkStatusLevel::VeryBad);
        // Unknown RTT defers to loss
        assert_eq!(network_status_level(5, -1), NetworkStatusLevel::NotGood);
    }

    #[test]
    fn test_fraction_only_after_window() {
        let mut tracker = LossAndBitrateTracker::default();
        tracker.on_receiver_report(1, 1000, 0, 0);

        tracker.on_receiver_report(1, 1100, 10, 1000);
        assert_eq!(tracker.fraction_lost_of(1), 0);

        tracker.on_receiver_report(1, 1200, 20, 3000);
        assert_eq!(tracker.fraction_lost_of(1), 10);
        assert_eq!(tracker.snapshot().send_fraction_lost, 10);
    }

    #[test]
    fn test_fraction_retained_when_counters_regress() {
        let mut tracker = LossAndBitrateTracker::default();
        tracker.on_receiver_report(1, 0, 0, 0);
        tracker.on_receiver_report(1, 100, 5, 3000);
        assert_eq!(tracker.fraction_lost_of(1), 5);

        // Cumulative loss went down (duplicates), keep the previous value
        tracker.on_receiver_report(1, 200, 2, 6000);
        assert_eq!(tracker.fraction_lost_of(1), 5);
    }

    #[test]
    fn test_bitrate_per_window() {
        let mut tracker = LossAndBitrateTracker::default();
        tracker.on_packet_sent(1000, 0);
        tracker.on_packet_sent(1000, 1000);
        tracker.on_packet_sent(1000, 3000);

        // 3000 bytes over 3 s
        assert_eq!(tracker.snapshot().send_bitrate, 8000);
        assert_eq!(tracker.snapshot().packets_sent, 3);
    }

    #[test]
    fn test_receive_bitrate_split_by_kind() {
        let mut tracker = LossAndBitrateTracker::default();
        tracker.on_packet_received(MediaKind::Audio, 300, 0);
        tracker.on_packet_received(MediaKind::Video, 1200, 0);
        tracker.on_packet_received(MediaKind::Audio, 300, 3000);
        tracker.on_packet_received(MediaKind::Video, 1200, 3000);

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.audio_receive_bitrate, 1600);
        assert_eq!(snapshot.video_receive_bitrate, 6400);
        assert_eq!(snapshot.receive_bitrate, 8000);
    }

    #[test]
    fn test_target_bitrate_sum() {
        let mut tracker = LossAndBitrateTracker::default();
        assert_eq!(tracker.target_bitrate(), -1);

        tracker.set_target_bitrate(MediaKind::Video, 500_000);
        assert_eq!(tracker.target_bitrate(), 500_000);

        tracker.set_target_bitrate(MediaKind::Audio, 32_000);
        assert_eq!(tracker.target_bitrate(), 532_000);
    }

    #[test]
    fn test_status_uses_larger_fraction() {
        let mut tracker = LossAndBitrateTracker::default();
        tracker.set_receive_fraction_lost(1, 60);
        assert_eq!(tracker.status_level(20), NetworkStatusLevel::VeryBad);
    }

    #[test]
    fn test_receive_fraction_is_worst_source() {
        let mut tracker = LossAndBitrateTracker::default();
        tracker.set_receive_fraction_lost(1, 30);
        tracker.set_receive_fraction_lost(2, 0);
        assert_eq!(tracker.receive_fraction_lost(), 30);
        assert_eq!(tracker.snapshot().receive_fraction_lost, 30);

        // A later clean report from source 1 replaces its own value only
        tracker.set_receive_fraction_lost(1, 5);
        tracker.set_receive_fraction_lost(2, 12);
        assert_eq!(tracker.receive_fraction_lost(), 12);

        tracker.remove_receive_source(2);
        assert_eq!(tracker.receive_fraction_lost(), 5);
    }
}
