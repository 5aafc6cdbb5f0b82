//! RTCP Sender Report implementation

use super::ntp::NtpTime;
use super::{RtcpPacketType, length_words, write_rtcp_header};
use crate::codec::rtp::parse_u32_be;
use crate::error::{NetworkError, Result};

/// Largest magnitude of the 24-bit cumulative-lost field.
pub const MAX_CUMULATIVE_LOST: i32 = 0x7F_FFFF;

/// Report block (used in SR and RR)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportBlock {
    /// SSRC of source being reported on
    pub ssrc: u32,
    /// Fraction of packets lost since the previous report (fixed point, /256)
    pub fraction_lost: u8,
    /// Signed 24-bit cumulative count
    pub cumulative_packets_lost: i32,
    pub extended_highest_seq: u32,
    /// Interarrival jitter in timestamp units
    pub jitter: u32,
    /// Compact NTP of the last SR received from this source
    pub last_sr: u32,
    /// Delay since that SR, in 1/65536 s
    pub delay_since_last_sr: u32,
}

impl ReportBlock {
    pub const SIZE: usize = 24;

    pub(super) fn write_to(&self, bytes: &mut Vec<u8>) {
        bytes.extend_from_slice(&self.ssrc.to_be_bytes());
        bytes.push(self.fraction_lost);

        // Cumulative packets lost (24 bits)
        let lost = self
            .cumulative_packets_lost
            .clamp(-MAX_CUMULATIVE_LOST - 1, MAX_CUMULATIVE_LOST);
        bytes.extend_from_slice(&lost.to_be_bytes()[1..4]);

        bytes.extend_from_slice(&self.extended_highest_seq.to_be_bytes());
        bytes.extend_from_slice(&self.jitter.to_be_bytes());
        bytes.extend_from_slice(&self.last_sr.to_be_bytes());
        bytes.extend_from_slice(&self.delay_since_last_sr.to_be_bytes());
    }

    pub(super) fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(NetworkError::Rtcp("Report block too short".to_string()));
        }

        // Sign-extend the 24-bit field
        let raw = i32::from_be_bytes([data[5], data[6], data[7], 0]);
        let cumulative_packets_lost = raw >> 8;

        Ok(Self {
            ssrc: parse_u32_be(data, 0),
            fraction_lost: data[4],
            cumulative_packets_lost,
            extended_highest_seq: parse_u32_be(data, 8),
            jitter: parse_u32_be(data, 12),
            last_sr: parse_u32_be(data, 16),
            delay_since_last_sr: parse_u32_be(data, 20),
        })
    }
}

/// Parses `count` report blocks starting at `start_offset`.
pub(super) fn parse_report_blocks(
    data: &[u8],
    count: u8,
    start_offset: usize,
) -> Result<Vec<ReportBlock>> {
    let mut report_blocks = Vec::with_capacity(count as usize);
    let mut offset = start_offset;

    for _ in 0..count {
        if offset + ReportBlock::SIZE > data.len() {
            return Err(NetworkError::Rtcp(format!(
                "Expected {} report blocks, packet truncated",
                count
            )));
        }
        report_blocks.push(ReportBlock::from_bytes(
            &data[offset..offset + ReportBlock::SIZE],
        )?);
        offset += ReportBlock::SIZE;
    }

    Ok(report_blocks)
}

/// RTCP Sender Report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderReport {
    pub ssrc: u32,
    /// Wall-clock time at which the SR was generated
    pub ntp: NtpTime,
    /// RTP timestamp corresponding to `ntp`
    pub rtp_timestamp: u32,
    pub sender_packet_count: u32,
    pub sender_octet_count: u32,
    /// Optional receiver report blocks
    pub report_blocks: Vec<ReportBlock>,
}

impl SenderReport {
    const FIXED_SIZE: usize = 28;

    pub fn new(
        ssrc: u32,
        ntp: NtpTime,
        rtp_timestamp: u32,
        sender_packet_count: u32,
        sender_octet_count: u32,
    ) -> Self {
        Self {
            ssrc,
            ntp,
            rtp_timestamp,
            sender_packet_count,
            sender_octet_count,
            report_blocks: Vec::new(),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let total = Self::FIXED_SIZE + self.report_blocks.len() * ReportBlock::SIZE;
        let mut bytes = Vec::with_capacity(total);

        write_rtcp_header(
            &mut bytes,
            RtcpPacketType::SR,
            self.report_blocks.len() as u8,
            length_words(total),
        );
        bytes.extend_from_slice(&self.ssrc.to_be_bytes());
        write_sender_info(&mut bytes, self);

        for block in &self.report_blocks {
            block.write_to(&mut bytes);
        }

        bytes
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::FIXED_SIZE {
            return Err(NetworkError::Rtcp("SR packet too short".to_string()));
        }

        let rc = data[0] & 0x1F;
        let report_blocks = parse_report_blocks(data, rc, Self::FIXED_SIZE)?;

        Ok(Self {
            ssrc: parse_u32_be(data, 4),
            ntp: NtpTime::new(parse_u32_be(data, 8), parse_u32_be(data, 12)),
            rtp_timestamp: parse_u32_be(data, 16),
            sender_packet_count: parse_u32_be(data, 20),
            sender_octet_count: parse_u32_be(data, 24),
            report_blocks,
        })
    }
}

fn write_sender_info(bytes: &mut Vec<u8>, sr: &SenderReport) {
    bytes.extend_from_slice(&sr.ntp.seconds.to_be_bytes());
    bytes.extend_from_slice(&sr.ntp.fraction.to_be_bytes());
    bytes.extend_from_slice(&sr.rtp_timestamp.to_be_bytes());
    bytes.extend_from_slice(&sr.sender_packet_count.to_be_bytes());
    bytes.extend_from_slice(&sr.sender_octet_count.to_be_bytes());
}
