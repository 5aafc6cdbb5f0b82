//! NACK-based loss detection and retransmission.
//!
//! [`NackTracker`] follows one inbound media source. Every observed sequence
//! extends a window of per-sequence records; sequences skipped over become
//! `Missing` and are reported by [`NackTracker::build_nack`] until they
//! arrive or run out of retries. The window is a ring ordered by sequence,
//! newest at the back.
//!
//! [`on_nack_received`] serves the other direction: NACKs from a receiver are
//! answered from the [`RetransmitCache`].

pub mod retransmit_cache;

pub use retransmit_cache::{RetransmitCache, RetransmitConfig, RetransmitDecision, RetransmitEntry};

use crate::codec::sequence::{forward_distance, in_range};
use std::collections::VecDeque;

/// NACK generation limits
#[derive(Debug, Clone)]
pub struct NackConfig {
    /// Records kept in the window
    pub max_queue: usize,
    /// A sequence this far behind the newest one is still matched
    pub max_behind: u16,
    /// Delay before a missing sequence is first reported
    pub missing_wait_ms: u64,
    /// Delay before a reported sequence is reported again
    pub nacked_wait_ms: u64,
    /// Reports allowed after the first before giving up
    pub max_retries: u32,
    /// More reports than this in one round triggers a key-frame request
    pub storm_limit: usize,
    /// Minimum spacing between storm key-frame requests
    pub key_frame_interval_ms: u64,
}

impl Default for NackConfig {
    fn default() -> Self {
        Self {
            max_queue: 300,
            max_behind: 1000,
            missing_wait_ms: 12,
            nacked_wait_ms: 155,
            max_retries: 3,
            storm_limit: 100,
            key_frame_interval_ms: 3000,
        }
    }
}

/// Lifecycle of a tracked sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapState {
    Missing,
    Nacked,
    GivenUp,
    Received,
}

/// One tracked sequence number
#[derive(Debug, Clone)]
pub struct SeqGapState {
    pub sequence: u16,
    pub first_seen_time: u64,
    pub state: GapState,
    /// Number of NACKs that included this sequence
    pub retry_count: u32,
    last_nack_time: u64,
}

/// What `observe` did with a sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Observation {
    /// Sequences newly marked missing
    pub new_gaps: u16,
    /// The sequence filled an earlier gap
    pub recovered: bool,
    /// The jump was too large and all state was dropped
    pub resynced: bool,
}

/// Result of a NACK round
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NackDecision {
    /// Nothing to report
    Idle,
    /// Report these sequences, circular ascending
    Nack(Vec<u16>),
    /// Too many losses: state was cleared, ask for a key frame instead
    RequestKeyFrame { dropped: usize },
}

/// Per-source gap tracker
#[derive(Debug, Clone)]
pub struct NackTracker {
    config: NackConfig,
    records: VecDeque<SeqGapState>,
    last_storm_request: Option<u64>,
}

impl NackTracker {
    pub fn new(config: NackConfig) -> Self {
        Self {
            records: VecDeque::with_capacity(config.max_queue + 1),
            config,
            last_storm_request: None,
        }
    }

    /// Records the arrival of `sequence` at `now` (ms).
    pub fn observe(&mut self, sequence: u16, now: u64) -> Observation {
        let mut observation = Observation::default();
        let window = self.window_len();

        let mut current = match self.records.back() {
            Some(newest) => newest.sequence,
            None => sequence.wrapping_sub(1),
        };

        if !in_range(sequence, current, window) && !in_range(current, sequence, self.config.max_behind)
        {
            self.records.clear();
            current = sequence.wrapping_sub(1);
            observation.resynced = true;
        }

        if in_range(sequence, current, window) {
            while current != sequence {
                current = current.wrapping_add(1);
                let state = if current == sequence {
                    GapState::Received
                } else {
                    observation.new_gaps += 1;
                    GapState::Missing
                };
                self.records.push_back(SeqGapState {
                    sequence: current,
                    first_seen_time: now,
                    state,
                    retry_count: 0,
                    last_nack_time: now,
                });
            }
        } else if let Some(record) = self.record_mut(sequence)
            && record.state != GapState::Received
        {
            record.state = GapState::Received;
            observation.recovered = true;
        }

        while self.records.len() > self.config.max_queue {
            self.records.pop_front();
        }

        observation
    }

    /// Collects the sequences due for a NACK at `now`.
    pub fn build_nack(&mut self, now: u64) -> NackDecision {
        let missing_wait = self.config.missing_wait_ms;
        let nacked_wait = self.config.nacked_wait_ms;
        let max_retries = self.config.max_retries;
        let mut nacks = Vec::new();

        for record in self.records.iter_mut() {
            match record.state {
                GapState::Missing if now.saturating_sub(record.first_seen_time) > missing_wait => {
                    record.state = GapState::Nacked;
                    record.retry_count += 1;
                    record.last_nack_time = now;
                    nacks.push(record.sequence);
                }
                GapState::Nacked
                    if now.saturating_sub(record.last_nack_time) > nacked_wait
                        && record.retry_count <= max_retries =>
                {
                    record.retry_count += 1;
                    record.last_nack_time = now;
                    if record.retry_count > max_retries {
                        record.state = GapState::GivenUp;
                    }
                    nacks.push(record.sequence);
                }
                _ => {}
            }
        }

        if nacks.is_empty() {
            return NackDecision::Idle;
        }

        if nacks.len() > self.config.storm_limit && self.storm_request_allowed(now) {
            self.records.clear();
            self.last_storm_request = Some(now);
            return NackDecision::RequestKeyFrame {
                dropped: nacks.len(),
            };
        }

        NackDecision::Nack(nacks)
    }

    /// Current state of a sequence inside the window.
    pub fn state_of(&self, sequence: u16) -> Option<GapState> {
        self.index_of(sequence).map(|index| self.records[index].state)
    }

    /// Sequences still waiting for a first or repeated NACK.
    pub fn pending(&self) -> usize {
        self.records
            .iter()
            .filter(|r| matches!(r.state, GapState::Missing | GapState::Nacked))
            .count()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    fn window_len(&self) -> u16 {
        self.config.max_queue.min(u16::MAX as usize) as u16
    }

    fn storm_request_allowed(&self, now: u64) -> bool {
        match self.last_storm_request {
            Some(last) => now.saturating_sub(last) >= self.config.key_frame_interval_ms,
            None => true,
        }
    }

    fn index_of(&self, sequence: u16) -> Option<usize> {
        let newest = self.records.back()?.sequence;
        let behind = forward_distance(sequence, newest) as usize;
        (behind < self.records.len()).then(|| self.records.len() - 1 - behind)
    }

    fn record_mut(&mut self, sequence: u16) -> Option<&mut SeqGapState> {
        let index = self.index_of(sequence)?;
        self.records.get_mut(index)
    }
}

impl Default for NackTracker {
    fn default() -> Self {
        Self::new(NackConfig::default())
    }
}

/// Packets to resend in answer to a NACK
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Retransmission {
    pub packets: Vec<Vec<u8>>,
    /// Requested sequences resent for the first time (counted as lost)
    pub first_time: usize,
}

/// Looks every requested sequence up in `cache` and applies the resend policy.
///
/// Sequences the cache no longer holds, or that were resent too recently or
/// too often, are skipped.
pub fn on_nack_received(cache: &mut RetransmitCache, sequences: &[u16], now: u64) -> Retransmission {
    let mut result = Retransmission::default();
    for &sequence in sequences {
        if let RetransmitDecision::Resend {
            payload,
            first_time,
        } = cache.try_retransmit(sequence, now)
        {
            if first_time {
                result.first_time += 1;
            }
            result.packets.push(payload);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> NackTracker {
        NackTracker::default()
    }

    #[test]
    fn test_in_order_stream_has_no_gaps() {
        let mut nack = tracker();
        for seq in 0..50 {
            let observation = nack.observe(seq, 0);
            assert_eq!(observation.new_gaps, 0);
        }
        assert_eq!(nack.build_nack(1000), NackDecision::Idle);
    }

    #[test]
    fn test_gap_is_reported_after_missing_wait() {
        let mut nack = tracker();
        nack.observe(10, 0);
        let observation = nack.observe(13, 0);

        assert_eq!(observation.new_gaps, 2);
        assert_eq!(nack.state_of(11), Some(GapState::Missing));
        assert_eq!(nack.build_nack(12), NackDecision::Idle);
        assert_eq!(nack.build_nack(13), NackDecision::Nack(vec![11, 12]));
        assert_eq!(nack.state_of(12), Some(GapState::Nacked));
    }

    #[test]
    fn test_recovered_sequence_is_not_reported() {
        let mut nack = tracker();
        nack.observe(10, 0);
        nack.observe(13, 0);
        let observation = nack.observe(11, 5);

        assert!(observation.recovered);
        assert_eq!(nack.state_of(11), Some(GapState::Received));
        assert_eq!(nack.build_nack(100), NackDecision::Nack(vec![12]));
    }

    #[test]
    fn test_retries_then_give_up() {
        let mut nack = tracker();
        nack.observe(0, 0);
        nack.observe(2, 0);

        let mut now = 13;
        assert_eq!(nack.build_nack(now), NackDecision::Nack(vec![1]));

        // Too early for a repeat
        assert_eq!(nack.build_nack(now + 155), NackDecision::Idle);

        for _ in 0..3 {
            now += 156;
            assert_eq!(nack.build_nack(now), NackDecision::Nack(vec![1]));
        }
        assert_eq!(nack.state_of(1), Some(GapState::GivenUp));

        now += 10_000;
        assert_eq!(nack.build_nack(now), NackDecision::Idle);
        assert_eq!(nack.state_of(1), Some(GapState::GivenUp));
    }

    #[test]
    fn test_gap_across_wrap() {
        let mut nack = tracker();
        nack.observe(65534, 0);
        nack.observe(1, 0);

        assert_eq!(nack.build_nack(20), NackDecision::Nack(vec![65535, 0]));
    }

    #[test]
    fn test_big_jump_resyncs() {
        let mut nack = tracker();
        nack.observe(100, 0);
        nack.observe(102, 0);

        let observation = nack.observe(5000, 0);
        assert!(observation.resynced);
        assert_eq!(observation.new_gaps, 0);
        assert_eq!(nack.len(), 1);
        assert_eq!(nack.build_nack(1000), NackDecision::Idle);
    }

    #[test]
    fn test_late_packet_within_behind_window_does_not_resync() {
        let mut nack = tracker();
        nack.observe(2000, 0);
        let observation = nack.observe(1500, 0);

        assert!(!observation.resynced);
        assert_eq!(nack.len(), 1);
    }

    #[test]
    fn test_window_is_bounded() {
        let mut nack = tracker();
        for seq in 0..1000u16 {
            nack.observe(seq, 0);
        }
        assert_eq!(nack.len(), 300);
        assert_eq!(nack.state_of(699), None);
        assert_eq!(nack.state_of(700), Some(GapState::Received));
    }

    #[test]
    fn test_storm_requests_key_frame() {
        let mut nack = tracker();
        nack.observe(0, 0);
        nack.observe(150, 0);

        assert_eq!(
            nack.build_nack(20),
            NackDecision::RequestKeyFrame { dropped: 149 }
        );
        assert!(nack.is_empty());
    }

    #[test]
    fn test_storm_inside_interval_falls_back_to_nack() {
        let mut nack = tracker();
        nack.observe(0, 0);
        nack.observe(150, 0);
        nack.build_nack(20);

        nack.observe(1000, 100);
        nack.observe(1200, 100);
        match nack.build_nack(200) {
            NackDecision::Nack(list) => assert_eq!(list.len(), 199),
            other => panic!("Expected NACK list, got {:?}", other),
        }
    }

    #[test]
    fn test_on_nack_received_counts_first_time() {
        let mut cache = RetransmitCache::default();
        cache.push(1, vec![1], 0);
        cache.push(2, vec![2], 0);

        let first = on_nack_received(&mut cache, &[1, 2, 3], 10);
        assert_eq!(first.packets, vec![vec![1], vec![2]]);
        assert_eq!(first.first_time, 2);

        let again = on_nack_received(&mut cache, &[1], 50);
        assert_eq!(again.packets.len(), 1);
        assert_eq!(again.first_time, 0);

        let too_soon = on_nack_received(&mut cache, &[1], 60);
        assert!(too_soon.packets.is_empty());
    }
}
