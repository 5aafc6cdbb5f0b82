//! RTCP Receiver Report implementation

use super::sender_report::{ReportBlock, parse_report_blocks};
use super::{RtcpPacketType, length_words, write_rtcp_header};
use crate::codec::rtp::parse_u32_be;
use crate::error::{NetworkError, Result};

/// RTCP Receiver Report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverReport {
    /// SSRC of receiver
    pub ssrc: u32,
    /// Receiver report blocks (one per source)
    pub report_blocks: Vec<ReportBlock>,
}

impl ReceiverReport {
    const FIXED_SIZE: usize = 8;

    pub fn new(ssrc: u32, report_blocks: Vec<ReportBlock>) -> Self {
        Self {
            ssrc,
            report_blocks,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let total = Self::FIXED_SIZE + self.report_blocks.len() * ReportBlock::SIZE;
        let mut bytes = Vec::with_capacity(total);

        write_rtcp_header(
            &mut bytes,
            RtcpPacketType::RR,
            self.report_blocks.len() as u8,
            length_words(total),
        );
        bytes.extend_from_slice(&self.ssrc.to_be_bytes());

        for block in &self.report_blocks {
            block.write_to(&mut bytes);
        }

        bytes
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::FIXED_SIZE {
            return Err(NetworkError::Rtcp("RR packet too short".to_string()));
        }

        let rc = data[0] & 0x1F;
        let ssrc = parse_u32_be(data, 4);
        let report_blocks = parse_report_blocks(data, rc, Self::FIXED_SIZE)?;

        Ok(Self {
            ssrc,
            report_blocks,
        })
    }
}
