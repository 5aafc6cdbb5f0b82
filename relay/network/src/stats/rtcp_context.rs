//! Receive-side RTCP statistics for one media direction (RFC 3550 A.3, A.8).

use crate::codec::rtcp::ntp::{NtpTime, ms_to_compact};
use crate::codec::rtcp::sender_report::{MAX_CUMULATIVE_LOST, ReportBlock};
use crate::codec::sequence::is_ahead;

/// Running counters that feed outbound Receiver Report blocks
#[derive(Debug, Clone)]
pub struct RtcpStatisticsContext {
    clock_rate: u32,
    max_nack_queue: u16,
    started: bool,
    base_seq: u16,
    cycle_count: u32,
    last_seq: u16,
    expected: i64,
    expected_prior: i64,
    received: i64,
    received_prior: i64,
    /// Interarrival jitter in timestamp units
    jitter: f64,
    transit: Option<u32>,
    last_sr_ntp: u32,
    last_sr_rtp_timestamp: u32,
    last_sr_local_time: Option<u64>,
}

impl RtcpStatisticsContext {
    pub fn new(clock_rate: u32, max_nack_queue: u16) -> Self {
        Self {
            clock_rate,
            max_nack_queue,
            started: false,
            base_seq: 0,
            cycle_count: 0,
            last_seq: 0,
            expected: 0,
            expected_prior: 0,
            received: 0,
            received_prior: 0,
            jitter: 0.0,
            transit: None,
            last_sr_ntp: 0,
            last_sr_rtp_timestamp: 0,
            last_sr_local_time: None,
        }
    }

    /// Accounts for one received RTP packet.
    pub fn on_rtp(&mut self, seq: u16, timestamp: u32, arrival_ms: u64) {
        if !self.started {
            self.started = true;
            self.base_seq = seq;
            self.last_seq = seq;
        } else if is_ahead(self.last_seq, seq) {
            if (seq as u32 + self.max_nack_queue as u32) < self.last_seq as u32 {
                self.cycle_count += 1;
            }
            self.last_seq = seq;
        }

        self.received += 1;
        self.expected = ((self.cycle_count as i64) << 16) + self.last_seq as i64
            - self.base_seq as i64
            + 1;

        self.update_jitter(timestamp, arrival_ms);
    }

    fn update_jitter(&mut self, timestamp: u32, arrival_ms: u64) {
        let arrival_units = (arrival_ms as u128 * self.clock_rate as u128 / 1000) as u32;
        let transit = arrival_units.wrapping_sub(timestamp);

        if let Some(previous) = self.transit {
            let d = (transit.wrapping_sub(previous) as i32).unsigned_abs() as f64;
            self.jitter += (d - self.jitter) / 16.0;
        }
        self.transit = Some(transit);
    }

    /// Records a Sender Report from the remote source.
    pub fn on_sr(&mut self, ntp: NtpTime, rtp_timestamp: u32, now: u64) {
        self.last_sr_ntp = ntp.compact();
        self.last_sr_rtp_timestamp = rtp_timestamp;
        self.last_sr_local_time = Some(now);
    }

    /// Cumulative loss, never negative, clamped to 23 bits.
    pub fn lost(&self) -> u32 {
        (self.expected - self.received).clamp(0, MAX_CUMULATIVE_LOST as i64) as u32
    }

    /// Loss since the previous report, 8-bit fixed point.
    pub fn fraction_lost(&self) -> u8 {
        let expected_interval = self.expected - self.expected_prior;
        let received_interval = self.received - self.received_prior;
        let lost_interval = expected_interval - received_interval;

        if expected_interval <= 0 || lost_interval <= 0 {
            0
        } else {
            ((lost_interval << 8) / expected_interval).min(255) as u8
        }
    }

    /// Builds a report block about `ssrc` and starts a new report interval.
    pub fn build_report_block(&mut self, ssrc: u32, now: u64) -> ReportBlock {
        let delay_since_last_sr = match self.last_sr_local_time {
            Some(at) => ms_to_compact(now.saturating_sub(at)),
            None => 0,
        };

        let block = ReportBlock {
            ssrc,
            fraction_lost: self.fraction_lost(),
            cumulative_packets_lost: self.lost() as i32,
            extended_highest_seq: self.extended_highest_seq(),
            jitter: self.jitter as u32,
            last_sr: self.last_sr_ntp,
            delay_since_last_sr,
        };

        self.expected_prior = self.expected;
        self.received_prior = self.received;
        block
    }

    /// True once at least one RTP packet was seen.
    pub fn has_received(&self) -> bool {
        self.started
    }

    /// Compact NTP and RTP timestamp of the latest Sender Report.
    pub fn last_sr(&self) -> (u32, u32) {
        (self.last_sr_ntp, self.last_sr_rtp_timestamp)
    }

    pub fn extended_highest_seq(&self) -> u32 {
        (self.cycle_count << 16).wrapping_add(self.last_seq as u32)
    }

    pub fn expected(&self) -> i64 {
        self.expected
    }

    pub fn received(&self) -> i64 {
        self.received
    }

    pub fn cycle_count(&self) -> u32 {
        self.cycle_count
    }

    pub fn jitter(&self) -> f64 {
        self.jitter
    }

    pub fn clock_rate(&self) -> u32 {
        self.clock_rate
    }

    pub fn set_clock_rate(&mut self, clock_rate: u32) {
        self.clock_rate = clock_rate;
    }
}
