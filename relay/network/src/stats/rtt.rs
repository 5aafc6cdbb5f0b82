//! Round-trip time from SR/RR pairs and remote NTP estimation.

use crate::codec::rtcp::ntp::{NtpTime, compact_to_ms};
use crate::media::MediaKind;
use std::collections::{HashMap, VecDeque};

/// Default number of Sender Reports remembered per SSRC, doubled for the ring.
pub const DEFAULT_HISTORY_DEPTH: usize = 60;

/// Ring of (compact NTP, local send time) pairs for one local SSRC
#[derive(Debug, Clone)]
pub struct SendReportHistory {
    entries: VecDeque<(u32, u64)>,
    capacity: usize,
}

impl SendReportHistory {
    pub fn new(history_depth: usize) -> Self {
        let capacity = (history_depth * 2).max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, compact_ntp: u32, send_time: u64) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back((compact_ntp, send_time));
    }

    /// Send time of the report whose compact NTP matches `compact_ntp`.
    pub fn find(&self, compact_ntp: u32) -> Option<u64> {
        self.entries
            .iter()
            .rev()
            .find(|(ntp, _)| *ntp == compact_ntp)
            .map(|(_, time)| *time)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// RTT statistics for one SSRC, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RttSample {
    pub last: i64,
    pub min: i64,
    pub max: i64,
    pub avg: i64,
    pub count: u64,
}

impl RttSample {
    fn update(&mut self, rtt: i64) {
        self.last = rtt;
        self.max = self.max.max(rtt);
        self.min = if self.count == 0 { rtt } else { self.min.min(rtt) };

        self.avg = if self.count == 0 {
            rtt
        } else {
            let n = self.count as f64;
            let average = (n / (n + 1.0)) * self.avg as f64 + rtt as f64 / (n + 1.0);
            (average + 0.5) as i64
        };
        self.count += 1;
    }
}

/// Maps remote RTP timestamps onto the sender's wall clock using two SR anchors
#[derive(Debug, Clone)]
struct RemoteClock {
    clock_rate: u32,
    /// (ntp in ms, rtp timestamp), newest last
    anchors: VecDeque<(i64, u32)>,
}

impl RemoteClock {
    fn new(clock_rate: u32) -> Self {
        Self {
            clock_rate,
            anchors: VecDeque::with_capacity(2),
        }
    }

    fn update(&mut self, ntp_ms: i64, rtp_timestamp: u32) {
        if let Some(&(_, newest)) = self.anchors.back() {
            if newest == rtp_timestamp {
                return;
            }
        }
        if self.anchors.len() == 2 {
            self.anchors.pop_front();
        }
        self.anchors.push_back((ntp_ms, rtp_timestamp));
    }

    fn estimate(&self, rtp_timestamp: u32) -> i64 {
        let (Some(&(old_ms, old_ts)), Some(&(new_ms, new_ts))) =
            (self.anchors.front(), self.anchors.back())
        else {
            return -1;
        };
        if self.anchors.len() < 2 {
            return -1;
        }

        let ts_delta = new_ts.wrapping_sub(old_ts) as i32 as f64;
        let ms_delta = (new_ms - old_ms) as f64;
        let ticks_per_ms = if ts_delta > 0.0 && ms_delta > 0.0 {
            ts_delta / ms_delta
        } else {
            self.clock_rate as f64 / 1000.0
        };
        if ticks_per_ms <= 0.0 {
            return -1;
        }

        let offset = rtp_timestamp.wrapping_sub(new_ts) as i32 as f64;
        new_ms + (offset / ticks_per_ms).round() as i64
    }
}

/// Per-SSRC round-trip tracking plus per-kind remote clock mapping
#[derive(Debug, Clone)]
pub struct RttEstimator {
    history_depth: usize,
    histories: HashMap<u32, SendReportHistory>,
    samples: HashMap<u32, RttSample>,
    audio_clock: RemoteClock,
    video_clock: RemoteClock,
}

impl RttEstimator {
    pub fn new(history_depth: usize) -> Self {
        Self {
            history_depth,
            histories: HashMap::new(),
            samples: HashMap::new(),
            audio_clock: RemoteClock::new(MediaKind::Audio.default_clock_rate()),
            video_clock: RemoteClock::new(MediaKind::Video.default_clock_rate()),
        }
    }

    /// Overrides the nominal clock rate used before two anchors disagree.
    pub fn set_clock_rate(&mut self, kind: MediaKind, clock_rate: u32) {
        self.remote_clock_mut(kind).clock_rate = clock_rate;
    }

    /// Remembers a Sender Report we sent so a later RR can be matched.
    pub fn record_sr_sent(&mut self, local_ssrc: u32, ntp: NtpTime, send_time: u64) {
        let depth = self.history_depth;
        self.histories
            .entry(local_ssrc)
            .or_insert_with(|| SendReportHistory::new(depth))
            .push(ntp.compact(), send_time);
    }

    /// Computes a new RTT sample from a report block about `local_ssrc`.
    ///
    /// Returns `None` when `last_sr` is zero or matches no report we sent.
    pub fn on_rr_received(
        &mut self,
        local_ssrc: u32,
        last_sr: u32,
        delay_since_last_sr: u32,
        receive_time: u64,
    ) -> Option<RttSample> {
        if last_sr == 0 {
            return None;
        }
        let send_time = self.histories.get(&local_ssrc)?.find(last_sr)?;

        let delay = compact_to_ms(delay_since_last_sr) as i64;
        let rtt = (receive_time as i64 - delay - send_time as i64).max(1);

        let sample = self.samples.entry(local_ssrc).or_default();
        sample.update(rtt);
        Some(*sample)
    }

    /// Records a Sender Report received from the remote peer.
    pub fn on_remote_sr(&mut self, kind: MediaKind, ntp: NtpTime, rtp_timestamp: u32) {
        let ntp_ms = ntp_to_ms(ntp);
        self.remote_clock_mut(kind).update(ntp_ms, rtp_timestamp);
    }

    /// Sender wall-clock time in NTP milliseconds for an RTP timestamp, or -1
    /// until two Sender Reports of this kind have been seen.
    pub fn estimate_remote_ntp(&self, kind: MediaKind, rtp_timestamp: u32) -> i64 {
        match kind {
            MediaKind::Audio => self.audio_clock.estimate(rtp_timestamp),
            MediaKind::Video => self.video_clock.estimate(rtp_timestamp),
        }
    }

    pub fn sample(&self, local_ssrc: u32) -> Option<RttSample> {
        self.samples.get(&local_ssrc).copied()
    }

    pub fn average_rtt(&self, local_ssrc: u32) -> Option<i64> {
        self.samples.get(&local_ssrc).map(|s| s.avg)
    }

    /// Mean of the latest RTT over every SSRC with a sample, 0 when none.
    pub fn latest_rtt(&self) -> i64 {
        let values: Vec<i64> = self
            .samples
            .values()
            .map(|s| s.last)
            .filter(|rtt| *rtt > 0)
            .collect();
        if values.is_empty() {
            0
        } else {
            values.iter().sum::<i64>() / values.len() as i64
        }
    }

    fn remote_clock_mut(&mut self, kind: MediaKind) -> &mut RemoteClock {
        match kind {
            MediaKind::Audio => &mut self.audio_clock,
            MediaKind::Video => &mut self.video_clock,
        }
    }
}

impl Default for RttEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_DEPTH)
    }
}

fn ntp_to_ms(ntp: NtpTime) -> i64 {
    ntp.seconds as i64 * 1000 + ((ntp.fraction as u64 * 1000) >> 32) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::rtcp::ntp::ms_to_compact;

    fn ntp_at(seconds: u32) -> NtpTime {
        NtpTime::new(seconds, 0)
    }

    #[test]
    fn test_rtt_from_matching_report() {
        let mut estimator = RttEstimator::default();
        let ntp = ntp_at(100);
        estimator.record_sr_sent(1, ntp, 1_000);

        // Peer held the SR for 500 ms, RR arrives at 1_580
        let sample = estimator
            .on_rr_received(1, ntp.compact(), ms_to_compact(500), 1_580)
            .unwrap();
        assert_eq!(sample.last, 80);
        assert_eq!(sample.min, 80);
        assert_eq!(sample.max, 80);
        assert_eq!(sample.avg, 80);
        assert_eq!(sample.count, 1);
    }

    #[test]
    fn test_rtt_floor_is_one() {
        let mut estimator = RttEstimator::default();
        let ntp = ntp_at(5);
        estimator.record_sr_sent(1, ntp, 1_000);

        let sample = estimator
            .on_rr_received(1, ntp.compact(), ms_to_compact(500), 1_010)
            .unwrap();
        assert_eq!(sample.last, 1);
    }

    #[test]
    fn test_zero_or_unknown_lsr_is_ignored() {
        let mut estimator = RttEstimator::default();
        estimator.record_sr_sent(1, ntp_at(7), 0);

        assert!(estimator.on_rr_received(1, 0, 0, 100).is_none());
        assert!(estimator.on_rr_received(1, 0xDEAD_BEEF, 0, 100).is_none());
        assert!(estimator.on_rr_received(2, ntp_at(7).compact(), 0, 100).is_none());
        assert!(estimator.sample(1).is_none());
    }

    #[test]
    fn test_running_average_min_max() {
        let mut estimator = RttEstimator::default();
        for (i, rtt) in [100u64, 200, 60].into_iter().enumerate() {
            let ntp = ntp_at(i as u32 + 1);
            let sent = i as u64 * 1_000;
            estimator.record_sr_sent(9, ntp, sent);
            estimator.on_rr_received(9, ntp.compact(), 0, sent + rtt);
        }

        let sample = estimator.sample(9).unwrap();
        assert_eq!(sample.last, 60);
        assert_eq!(sample.min, 60);
        assert_eq!(sample.max, 200);
        // 100, then 150, then 150*2/3 + 60/3 = 120
        assert_eq!(sample.avg, 120);
        assert_eq!(estimator.average_rtt(9), Some(120));
    }

    #[test]
    fn test_history_ring_drops_oldest() {
        let mut history = SendReportHistory::new(2);
        for i in 0..5u32 {
            history.push(i, i as u64 * 10);
        }
        assert_eq!(history.len(), 4);
        assert!(history.find(0).is_none());
        assert_eq!(history.find(4), Some(40));
    }

    #[test]
    fn test_latest_rtt_averages_ssrcs() {
        let mut estimator = RttEstimator::default();
        assert_eq!(estimator.latest_rtt(), 0);

        for (ssrc, rtt) in [(1u32, 40u64), (2, 60)] {
            estimator.record_sr_sent(ssrc, ntp_at(ssrc), 0);
            estimator.on_rr_received(ssrc, ntp_at(ssrc).compact(), 0, rtt);
        }
        assert_eq!(estimator.latest_rtt(), 50);
    }

    #[test]
    fn test_remote_ntp_needs_two_reports() {
        let mut estimator = RttEstimator::default();
        assert_eq!(estimator.estimate_remote_ntp(MediaKind::Video, 0), -1);

        estimator.on_remote_sr(MediaKind::Video, ntp_at(10), 90_000);
        assert_eq!(estimator.estimate_remote_ntp(MediaKind::Video, 90_000), -1);

        estimator.on_remote_sr(MediaKind::Video, ntp_at(11), 180_000);
        assert_eq!(estimator.estimate_remote_ntp(MediaKind::Video, 180_000), 11_000);
        assert_eq!(estimator.estimate_remote_ntp(MediaKind::Video, 225_000), 11_500);
        assert_eq!(estimator.estimate_remote_ntp(MediaKind::Audio, 0), -1);
    }

    #[test]
    fn test_remote_ntp_across_timestamp_wrap() {
        let mut estimator = RttEstimator::default();
        estimator.on_remote_sr(MediaKind::Audio, ntp_at(1), u32::MAX - 47_999);
        estimator.on_remote_sr(MediaKind::Audio, ntp_at(2), 0);

        assert_eq!(estimator.estimate_remote_ntp(MediaKind::Audio, 24_000), 2_500);
        assert_eq!(estimator.estimate_remote_ntp(MediaKind::Audio, u32::MAX - 23_999), 1_500);
    }
}
