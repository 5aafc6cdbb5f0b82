//! SSRC continuity for switched sources.
//!
//! A downstream slot is the SSRC a viewer's decoder is bound to. When a
//! different upstream source is assigned to the slot, outgoing sequence
//! numbers and timestamps continue from the last values sent on the slot
//! instead of jumping to the new source's own numbering.

use crate::codec::rtp::RtpPacketView;
use crate::codec::sequence::signed_delta;
use std::collections::HashMap;

/// Rewrite parameters
#[derive(Debug, Clone)]
pub struct ContinuityConfig {
    /// Timestamp gap inserted at a switch
    pub ts_step: u32,
    /// Output sequence jumps above this are flagged
    pub seq_jump_warn: u16,
}

impl Default for ContinuityConfig {
    fn default() -> Self {
        Self {
            ts_step: 2880,
            seq_jump_warn: 500,
        }
    }
}

/// Per downstream slot switch state
#[derive(Debug, Clone)]
pub struct SsrcSwitchContext {
    pub downstream_ssrc: u32,
    pub upstream_ssrc: u32,
    pub source_id: u32,
    /// First upstream seq/ts after the latest assignment, unset until it arrives
    pub base_seq: Option<u16>,
    pub base_ts: Option<u32>,
    /// Output values `base_seq`/`base_ts` map onto; unset on a fresh slot
    anchor_seq: Option<u16>,
    anchor_ts: Option<u32>,
    /// Last values written on this slot
    pub last_seq: Option<u16>,
    pub last_ts: Option<u32>,
    pub payload_type: Option<u8>,
    pub packets_relayed: u64,
}

impl SsrcSwitchContext {
    fn new(downstream_ssrc: u32, upstream_ssrc: u32, source_id: u32) -> Self {
        Self {
            downstream_ssrc,
            upstream_ssrc,
            source_id,
            base_seq: None,
            base_ts: None,
            anchor_seq: None,
            anchor_ts: None,
            last_seq: None,
            last_ts: None,
            payload_type: None,
            packets_relayed: 0,
        }
    }

    fn rearm(&mut self, upstream_ssrc: u32, source_id: u32, ts_step: u32) {
        if let (Some(seq), Some(ts)) = (self.last_seq, self.last_ts) {
            self.anchor_seq = Some(seq.wrapping_add(1));
            self.anchor_ts = Some(ts.wrapping_add(ts_step));
        }
        self.base_seq = None;
        self.base_ts = None;
        self.upstream_ssrc = upstream_ssrc;
        self.source_id = source_id;
    }
}

/// What [`SsrcContinuityRewriter::assign`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOutcome {
    Created,
    Switched { previous_upstream: u32 },
    Unchanged,
}

/// Values written by one rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewriteResult {
    pub downstream_ssrc: u32,
    pub sequence: u16,
    pub timestamp: u32,
    /// First packet since the slot was (re)assigned
    pub first_after_assign: bool,
    /// Output sequence jumped further than the warn threshold
    pub jump_detected: bool,
}

/// Continuity rewriter owning every slot of one stream
#[derive(Debug, Clone, Default)]
pub struct SsrcContinuityRewriter {
    config: ContinuityConfig,
    slots: HashMap<u32, SsrcSwitchContext>,
    /// upstream SSRC -> downstream SSRC
    routes: HashMap<u32, u32>,
}

impl SsrcContinuityRewriter {
    pub fn new(config: ContinuityConfig) -> Self {
        Self {
            config,
            slots: HashMap::new(),
            routes: HashMap::new(),
        }
    }

    /// Binds `upstream_ssrc` to the `downstream_ssrc` slot.
    pub fn assign(&mut self, downstream_ssrc: u32, upstream_ssrc: u32, source_id: u32) -> AssignOutcome {
        let ts_step = self.config.ts_step;

        let outcome = match self.slots.get_mut(&downstream_ssrc) {
            Some(slot) if slot.upstream_ssrc == upstream_ssrc => {
                slot.source_id = source_id;
                return AssignOutcome::Unchanged;
            }
            Some(slot) => {
                let previous_upstream = slot.upstream_ssrc;
                slot.rearm(upstream_ssrc, source_id, ts_step);
                self.routes.remove(&previous_upstream);
                AssignOutcome::Switched { previous_upstream }
            }
            None => {
                self.slots.insert(
                    downstream_ssrc,
                    SsrcSwitchContext::new(downstream_ssrc, upstream_ssrc, source_id),
                );
                AssignOutcome::Created
            }
        };

        // An upstream feeds a single slot
        if let Some(old_slot) = self.routes.insert(upstream_ssrc, downstream_ssrc) {
            if old_slot != downstream_ssrc {
                self.slots.remove(&old_slot);
            }
        }
        outcome
    }

    /// Drops a slot and its route.
    pub fn unassign(&mut self, downstream_ssrc: u32) -> Option<SsrcSwitchContext> {
        let slot = self.slots.remove(&downstream_ssrc)?;
        self.routes.remove(&slot.upstream_ssrc);
        Some(slot)
    }

    /// Forces a payload type on everything written to the slot.
    pub fn set_payload_type(&mut self, downstream_ssrc: u32, payload_type: Option<u8>) {
        if let Some(slot) = self.slots.get_mut(&downstream_ssrc) {
            slot.payload_type = payload_type;
        }
    }

    /// Rewrites SSRC, sequence and timestamp of `packet` in place.
    ///
    /// Returns `None`, leaving the packet untouched, when its SSRC is not the
    /// current upstream of any slot.
    pub fn rewrite(&mut self, packet: &mut RtpPacketView) -> Option<RewriteResult> {
        let downstream_ssrc = *self.routes.get(&packet.ssrc())?;
        let slot = self.slots.get_mut(&downstream_ssrc)?;

        let seq = packet.sequence_number();
        let ts = packet.timestamp();
        let first_after_assign = slot.base_seq.is_none();

        let base_seq = *slot.base_seq.get_or_insert(seq);
        let base_ts = *slot.base_ts.get_or_insert(ts);
        let anchor_seq = *slot.anchor_seq.get_or_insert(seq);
        let anchor_ts = *slot.anchor_ts.get_or_insert(ts);

        let out_seq = anchor_seq.wrapping_add(seq.wrapping_sub(base_seq));
        let out_ts = anchor_ts.wrapping_add(ts.wrapping_sub(base_ts));

        let jump_detected = match slot.last_seq {
            Some(last) => signed_delta(last, out_seq) > self.config.seq_jump_warn as i32,
            None => false,
        };

        packet.set_ssrc(downstream_ssrc);
        packet.set_sequence_number(out_seq);
        packet.set_timestamp(out_ts);
        if let Some(payload_type) = slot.payload_type {
            packet.set_payload_type(payload_type);
        }

        slot.last_seq = Some(out_seq);
        slot.last_ts = Some(out_ts);
        slot.packets_relayed += 1;

        Some(RewriteResult {
            downstream_ssrc,
            sequence: out_seq,
            timestamp: out_ts,
            first_after_assign,
            jump_detected,
        })
    }

    pub fn slot(&self, downstream_ssrc: u32) -> Option<&SsrcSwitchContext> {
        self.slots.get(&downstream_ssrc)
    }

    /// Slot currently fed by `upstream_ssrc`.
    pub fn route_of(&self, upstream_ssrc: u32) -> Option<u32> {
        self.routes.get(&upstream_ssrc).copied()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::rtp::{RtpHeader, RtpPacket};

    const SLOT: u32 = 0xD0D0;

    fn packet(ssrc: u32, seq: u16, ts: u32) -> RtpPacketView {
        let mut header = RtpHeader::new(96, ssrc);
        header.sequence_number = seq;
        header.timestamp = ts;
        RtpPacket::new(header, vec![0; 8]).into_view().unwrap()
    }

    fn relay(rewriter: &mut SsrcContinuityRewriter, ssrc: u32, seq: u16, ts: u32) -> RewriteResult {
        let mut p = packet(ssrc, seq, ts);
        let result = rewriter.rewrite(&mut p).unwrap();
        assert_eq!(p.ssrc(), SLOT);
        assert_eq!(p.sequence_number(), result.sequence);
        assert_eq!(p.timestamp(), result.timestamp);
        result
    }

    #[test]
    fn test_fresh_slot_passes_through() {
        let mut rewriter = SsrcContinuityRewriter::default();
        assert_eq!(rewriter.assign(SLOT, 1, 10), AssignOutcome::Created);

        let first = relay(&mut rewriter, 1, 500, 90_000);
        assert!(first.first_after_assign);
        assert_eq!((first.sequence, first.timestamp), (500, 90_000));

        let second = relay(&mut rewriter, 1, 501, 93_000);
        assert!(!second.first_after_assign);
        assert_eq!((second.sequence, second.timestamp), (501, 93_000));
    }

    #[test]
    fn test_switch_continues_numbering() {
        let mut rewriter = SsrcContinuityRewriter::default();
        rewriter.assign(SLOT, 1, 10);
        relay(&mut rewriter, 1, 100, 1_000);
        let before = relay(&mut rewriter, 1, 101, 4_000);

        assert_eq!(
            rewriter.assign(SLOT, 2, 20),
            AssignOutcome::Switched { previous_upstream: 1 }
        );
        let after = relay(&mut rewriter, 2, 40_000, 7_777_777);

        assert_eq!(after.sequence, before.sequence.wrapping_add(1));
        assert_eq!(after.timestamp, before.timestamp.wrapping_add(2880));
        assert!(after.first_after_assign);
        assert!(!after.jump_detected);

        let next = relay(&mut rewriter, 2, 40_001, 7_780_777);
        assert_eq!(next.sequence, after.sequence.wrapping_add(1));
        assert_eq!(next.timestamp, after.timestamp.wrapping_add(3000));
    }

    #[test]
    fn test_switch_across_wrap() {
        let mut rewriter = SsrcContinuityRewriter::default();
        rewriter.assign(SLOT, 1, 0);
        let before = relay(&mut rewriter, 1, u16::MAX, u32::MAX - 1000);

        rewriter.assign(SLOT, 2, 0);
        let after = relay(&mut rewriter, 2, 7, 7);
        assert_eq!(after.sequence, 0);
        assert_eq!(after.timestamp, before.timestamp.wrapping_add(2880));

        let next = relay(&mut rewriter, 2, 8, 3007);
        assert_eq!(next.sequence, 1);
    }

    #[test]
    fn test_old_source_is_not_relayed_after_switch() {
        let mut rewriter = SsrcContinuityRewriter::default();
        rewriter.assign(SLOT, 1, 0);
        relay(&mut rewriter, 1, 10, 0);
        rewriter.assign(SLOT, 2, 0);

        let mut stale = packet(1, 11, 3000);
        assert!(rewriter.rewrite(&mut stale).is_none());
        assert_eq!(stale.ssrc(), 1);
        assert_eq!(stale.sequence_number(), 11);
        assert_eq!(rewriter.route_of(1), None);
        assert_eq!(rewriter.route_of(2), Some(SLOT));
    }

    #[test]
    fn test_reassign_same_source_is_noop() {
        let mut rewriter = SsrcContinuityRewriter::default();
        rewriter.assign(SLOT, 1, 0);
        relay(&mut rewriter, 1, 10, 0);

        assert_eq!(rewriter.assign(SLOT, 1, 5), AssignOutcome::Unchanged);
        let next = relay(&mut rewriter, 1, 11, 3000);
        assert_eq!(next.sequence, 11);
        assert!(!next.first_after_assign);
    }

    #[test]
    fn test_upstream_moves_to_new_slot() {
        let mut rewriter = SsrcContinuityRewriter::default();
        rewriter.assign(SLOT, 1, 0);
        rewriter.assign(SLOT + 1, 1, 0);

        assert!(rewriter.slot(SLOT).is_none());
        assert_eq!(rewriter.route_of(1), Some(SLOT + 1));
    }

    #[test]
    fn test_payload_type_override() {
        let mut rewriter = SsrcContinuityRewriter::default();
        rewriter.assign(SLOT, 1, 0);
        rewriter.set_payload_type(SLOT, Some(100));

        let mut p = packet(1, 1, 1);
        rewriter.rewrite(&mut p).unwrap();
        assert_eq!(p.payload_type(), 100);
    }

    #[test]
    fn test_jump_detection() {
        let mut rewriter = SsrcContinuityRewriter::default();
        rewriter.assign(SLOT, 1, 0);
        relay(&mut rewriter, 1, 0, 0);

        assert!(!relay(&mut rewriter, 1, 400, 0).jump_detected);
        assert!(relay(&mut rewriter, 1, 1000, 0).jump_detected);
    }

    #[test]
    fn test_unassign_drops_route() {
        let mut rewriter = SsrcContinuityRewriter::default();
        rewriter.assign(SLOT, 1, 0);

        let slot = rewriter.unassign(SLOT).unwrap();
        assert_eq!(slot.upstream_ssrc, 1);
        assert!(rewriter.is_empty());

        let mut p = packet(1, 1, 1);
        assert!(rewriter.rewrite(&mut p).is_none());
    }
}
