//! Time sources for the engine.

use network::codec::rtcp::ntp::NtpTime;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Monotonic milliseconds plus wall-clock NTP time
pub trait Clock: Send + Sync {
    /// Milliseconds on a monotonic timeline
    fn now_ms(&self) -> u64;

    /// Current wall-clock time as NTP
    fn ntp_now(&self) -> NtpTime;
}

/// Process clock
#[derive(Debug, Clone)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn ntp_now(&self) -> NtpTime {
        let unix_ms = chrono::Utc::now().timestamp_millis().max(0) as u64;
        NtpTime::from_unix_ms(unix_ms)
    }
}

/// Clock moved by hand, for deterministic tests
#[derive(Debug)]
pub struct ManualClock {
    now: AtomicU64,
    /// Wall-clock time at monotonic zero
    unix_base_ms: u64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
            unix_base_ms: 1_700_000_000_000,
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    fn ntp_now(&self) -> NtpTime {
        NtpTime::from_unix_ms(self.unix_base_ms + self.now_ms())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_moves_both_timelines() {
        let clock = ManualClock::new(100);
        let before = clock.ntp_now();

        clock.advance(500);
        assert_eq!(clock.now_ms(), 600);
        assert_eq!(clock.ntp_now().to_unix_ms() - before.to_unix_ms(), 500);

        clock.set(0);
        assert_eq!(clock.now_ms(), 0);
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now_ms();
        let b = clock.now_ms();
        assert!(b >= a);
        assert!(clock.ntp_now().seconds > 0);
    }
}
