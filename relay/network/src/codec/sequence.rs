//! Wraparound-aware arithmetic on 16-bit RTP sequence numbers.
//!
//! Sequence numbers wrap at 2^16, so ordering is defined by circular
//! distance: `b` is ahead of `a` when `(b - a) mod 65536` lies in
//! `1..32768`.

/// Half of the sequence space; distances at or beyond it point backwards.
pub const HALF_RANGE: u16 = 0x8000;

/// Forward distance from `a` to `b`, modulo 2^16.
pub fn forward_distance(a: u16, b: u16) -> u16 {
    b.wrapping_sub(a)
}

/// Whether `b` is strictly ahead of `a` in circular order.
pub fn is_ahead(a: u16, b: u16) -> bool {
    let distance = forward_distance(a, b);
    distance != 0 && distance < HALF_RANGE
}

/// Whether `value` falls within `[start, start + len)` circularly.
pub fn in_range(value: u16, start: u16, len: u16) -> bool {
    forward_distance(start, value) < len
}

/// Signed circular difference `b - a` in `-32768..32768`.
pub fn signed_delta(a: u16, b: u16) -> i32 {
    b.wrapping_sub(a) as i16 as i32
}

/// An unwrapped sequence number: `(cycles << 16) | sequence`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExtendedSequence(pub u64);

impl ExtendedSequence {
    pub fn new(cycles: u64, sequence: u16) -> Self {
        ExtendedSequence((cycles << 16) | sequence as u64)
    }

    pub fn cycles(self) -> u64 {
        self.0 >> 16
    }

    pub fn sequence(self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }

    /// Places `seq` on the timeline of `self`, taking the nearest candidate.
    pub fn unwrap_near(self, seq: u16) -> ExtendedSequence {
        let delta = signed_delta(self.sequence(), seq) as i64;
        let value = (self.0 as i64 + delta).max(0);
        ExtendedSequence(value as u64)
    }
}

/// Turns a stream of raw sequence numbers into monotonically comparable values.
///
/// The first value lands in cycle 1 so that late packets from just before it
/// still unwrap to a non-negative value.
#[derive(Debug, Clone, Default)]
pub struct SequenceUnwrapper {
    highest: Option<ExtendedSequence>,
}

impl SequenceUnwrapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unwraps `seq` and advances the reference when it is the newest so far.
    pub fn unwrap(&mut self, seq: u16) -> ExtendedSequence {
        let extended = self.peek(seq);
        match self.highest {
            Some(highest) if extended <= highest => {}
            _ => self.highest = Some(extended),
        }
        extended
    }

    /// Unwraps `seq` without moving the reference.
    pub fn peek(&self, seq: u16) -> ExtendedSequence {
        match self.highest {
            Some(highest) => highest.unwrap_near(seq),
            None => ExtendedSequence::new(1, seq),
        }
    }

    pub fn highest(&self) -> Option<ExtendedSequence> {
        self.highest
    }

    pub fn reset(&mut self) {
        self.highest = None;
    }
}
