//! Bounded history of sent packets for NACK-driven retransmission.

use std::collections::VecDeque;

/// Retransmission limits
#[derive(Debug, Clone)]
pub struct RetransmitConfig {
    /// Entries kept before the oldest is evicted
    pub capacity: usize,
    /// Resends allowed per entry
    pub max_attempts: u32,
    /// Minimum spacing between two resends of the same entry
    pub retransmit_wait_ms: u64,
}

impl Default for RetransmitConfig {
    fn default() -> Self {
        Self {
            capacity: 300,
            max_attempts: 5,
            retransmit_wait_ms: 30,
        }
    }
}

/// A packet that was sent and may be replayed.
#[derive(Debug, Clone)]
pub struct RetransmitEntry {
    pub sequence: u16,
    pub payload: Vec<u8>,
    pub enqueue_time: u64,
    pub attempt_count: u32,
    /// Time of the latest resend, or the enqueue time before any
    pub last_retransmit: u64,
}

/// Outcome of a retransmission request for one sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetransmitDecision {
    /// Resend these bytes; `first_time` is true for the first resend
    Resend { payload: Vec<u8>, first_time: bool },
    /// The previous resend was too recent
    TooSoon,
    /// The entry used up its attempts
    Exhausted,
    /// Aged out or never sent on this path
    NotFound,
}

/// FIFO of recently sent packets, oldest evicted first
#[derive(Debug, Clone)]
pub struct RetransmitCache {
    config: RetransmitConfig,
    entries: VecDeque<RetransmitEntry>,
}

impl RetransmitCache {
    pub fn new(config: RetransmitConfig) -> Self {
        Self {
            entries: VecDeque::with_capacity(config.capacity),
            config,
        }
    }

    /// Stores a sent packet.
    pub fn push(&mut self, sequence: u16, payload: Vec<u8>, now: u64) {
        self.entries.push_back(RetransmitEntry {
            sequence,
            payload,
            enqueue_time: now,
            attempt_count: 0,
            last_retransmit: now,
        });
        while self.entries.len() > self.config.capacity {
            self.entries.pop_front();
        }
    }

    /// Newest entry with this exact sequence.
    pub fn find(&self, sequence: u16) -> Option<&RetransmitEntry> {
        self.entries.iter().rev().find(|e| e.sequence == sequence)
    }

    pub fn find_mut(&mut self, sequence: u16) -> Option<&mut RetransmitEntry> {
        self.entries.iter_mut().rev().find(|e| e.sequence == sequence)
    }

    /// Applies the resend policy to one requested sequence.
    pub fn try_retransmit(&mut self, sequence: u16, now: u64) -> RetransmitDecision {
        let max_attempts = self.config.max_attempts;
        let wait = self.config.retransmit_wait_ms;

        let Some(entry) = self.find_mut(sequence) else {
            return RetransmitDecision::NotFound;
        };
        if entry.attempt_count >= max_attempts {
            return RetransmitDecision::Exhausted;
        }
        if entry.attempt_count > 0 && now.saturating_sub(entry.last_retransmit) <= wait {
            return RetransmitDecision::TooSoon;
        }

        let first_time = entry.attempt_count == 0;
        entry.attempt_count += 1;
        entry.last_retransmit = now;
        RetransmitDecision::Resend {
            payload: entry.payload.clone(),
            first_time,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for RetransmitCache {
    fn default() -> Self {
        Self::new(RetransmitConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_evicts_oldest() {
        let mut cache = RetransmitCache::new(RetransmitConfig {
            capacity: 3,
            ..RetransmitConfig::default()
        });
        for seq in 0..5 {
            cache.push(seq, vec![seq as u8], 0);
        }

        assert_eq!(cache.len(), 3);
        assert!(cache.find(0).is_none());
        assert!(cache.find(1).is_none());
        assert!(cache.find(4).is_some());
    }

    #[test]
    fn test_find_prefers_newest() {
        let mut cache = RetransmitCache::default();
        cache.push(9, vec![1], 0);
        cache.push(9, vec![2], 10);

        assert_eq!(cache.find(9).unwrap().payload, vec![2]);
    }

    #[test]
    fn test_first_resend_is_immediate() {
        let mut cache = RetransmitCache::default();
        cache.push(1, vec![0xAA], 100);

        let decision = cache.try_retransmit(1, 100);
        assert_eq!(
            decision,
            RetransmitDecision::Resend {
                payload: vec![0xAA],
                first_time: true
            }
        );
    }

    #[test]
    fn test_resend_spacing() {
        let mut cache = RetransmitCache::default();
        cache.push(1, vec![0xAA], 0);
        cache.try_retransmit(1, 0);

        assert_eq!(cache.try_retransmit(1, 30), RetransmitDecision::TooSoon);
        assert!(matches!(
            cache.try_retransmit(1, 31),
            RetransmitDecision::Resend { first_time: false, .. }
        ));
    }

    #[test]
    fn test_attempts_are_capped() {
        let mut cache = RetransmitCache::default();
        cache.push(1, vec![0xAA], 0);

        let mut now = 0;
        for _ in 0..5 {
            assert!(matches!(
                cache.try_retransmit(1, now),
                RetransmitDecision::Resend { .. }
            ));
            now += 100;
        }
        assert_eq!(cache.try_retransmit(1, now), RetransmitDecision::Exhausted);
        assert_eq!(cache.find(1).unwrap().attempt_count, 5);
    }

    #[test]
    fn test_unknown_sequence() {
        let mut cache = RetransmitCache::default();
        assert_eq!(cache.try_retransmit(42, 0), RetransmitDecision::NotFound);
    }
}
