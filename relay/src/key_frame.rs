//! Key-frame request throttling for one upstream video source.

/// A FIR/PLI pair should be sent with this FIR sequence number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyFrameRequest {
    pub fir_sequence: u8,
}

/// Tracks outstanding key-frame requests and their FIR sequence numbers
#[derive(Debug, Clone)]
pub struct KeyFrameRequester {
    retry_ms: u64,
    max_attempts: u32,
    attempts: u32,
    fir_sequence: u8,
    last_request: Option<u64>,
    pending: bool,
    requests_sent: u64,
}

impl KeyFrameRequester {
    pub fn new(retry_ms: u64, max_attempts: u32) -> Self {
        Self {
            retry_ms,
            max_attempts,
            attempts: 0,
            fir_sequence: 0,
            last_request: None,
            pending: false,
            requests_sent: 0,
        }
    }

    /// Asks for a key frame unless one was requested less than `retry_ms` ago.
    pub fn request(&mut self, now: u64) -> Option<KeyFrameRequest> {
        if self.pending && !self.retry_due(now) {
            return None;
        }
        self.attempts = 0;
        Some(self.issue(now))
    }

    /// Re-issues an unanswered request once the retry interval has passed.
    ///
    /// After `max_attempts` requests without an answer the request is
    /// dropped; a later `request` starts a new round.
    pub fn poll(&mut self, now: u64) -> Option<KeyFrameRequest> {
        if !self.pending || !self.retry_due(now) {
            return None;
        }
        if self.attempts >= self.max_attempts {
            self.pending = false;
            return None;
        }
        Some(self.issue(now))
    }

    /// A key frame arrived; stop retrying.
    pub fn on_key_frame_received(&mut self) {
        self.pending = false;
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn requests_sent(&self) -> u64 {
        self.requests_sent
    }

    fn retry_due(&self, now: u64) -> bool {
        match self.last_request {
            Some(last) => now.saturating_sub(last) >= self.retry_ms,
            None => true,
        }
    }

    fn issue(&mut self, now: u64) -> KeyFrameRequest {
        self.fir_sequence = self.fir_sequence.wrapping_add(1);
        self.last_request = Some(now);
        self.pending = true;
        self.attempts += 1;
        self.requests_sent += 1;
        KeyFrameRequest {
            fir_sequence: self.fir_sequence,
        }
    }
}

impl Default for KeyFrameRequester {
    fn default() -> Self {
        Self::new(1000, 3)
    }
}
