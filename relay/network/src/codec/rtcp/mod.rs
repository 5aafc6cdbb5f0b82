//! RTCP (RTP Control Protocol) Implementation
//!
//! Wire codecs for every control packet the relay emits or consumes, and a
//! compound-packet parser that walks a datagram sub-packet by sub-packet.
//!
//! # RTCP Common Header (RFC 3550 Section 6.4)
//!
//! ```text
//! 0                   1                   2                   3
//! 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |V=2|P|  RC/FMT |      PT       |     length (words - 1)        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

pub mod bye;
pub mod feedback;
pub mod ntp;
pub mod receiver_report;
pub mod sdes;
pub mod sender_report;

pub use bye::ByePacket;
pub use feedback::{FirEntry, FullIntraRequest, GenericNack, PictureLossIndication, Remb};
pub use ntp::NtpTime;
pub use receiver_report::ReceiverReport;
pub use sdes::{SdesChunk, SourceDescription};
pub use sender_report::{ReportBlock, SenderReport};

use crate::codec::rtp::{parse_u16_be, parse_u32_be};
use crate::error::{NetworkError, Result};

/// Writes the 4-byte common header.
///
/// `length_words` is the packet length in 32-bit words minus one.
pub(crate) fn write_rtcp_header(
    bytes: &mut Vec<u8>,
    packet_type: RtcpPacketType,
    count: u8,
    length_words: u16,
) {
    let version = 2u8;
    let padding = 0u8;
    bytes.push((version << 6) | (padding << 5) | (count & 0x1F));
    bytes.push(packet_type as u8);
    bytes.extend_from_slice(&length_words.to_be_bytes());
}

/// Length field for a packet of `total_len` bytes (a multiple of four).
pub(crate) fn length_words(total_len: usize) -> u16 {
    (total_len / 4).saturating_sub(1) as u16
}

/// RTCP packet types
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtcpPacketType {
    /// Full Intra Request, pre-RFC 5104 form (192)
    LegacyFir = 192,
    /// Sender Report (200)
    SR = 200,
    /// Receiver Report (201)
    RR = 201,
    /// Source Description (202)
    SDES = 202,
    /// Goodbye (203)
    BYE = 203,
    /// Application-defined (204)
    APP = 204,
    /// Transport-layer feedback (205)
    RTPFB = 205,
    /// Payload-specific feedback (206)
    PSFB = 206,
}

impl RtcpPacketType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            192 => Some(RtcpPacketType::LegacyFir),
            200 => Some(RtcpPacketType::SR),
            201 => Some(RtcpPacketType::RR),
            202 => Some(RtcpPacketType::SDES),
            203 => Some(RtcpPacketType::BYE),
            204 => Some(RtcpPacketType::APP),
            205 => Some(RtcpPacketType::RTPFB),
            206 => Some(RtcpPacketType::PSFB),
            _ => None,
        }
    }
}

/// Whether a datagram sharing the RTP port carries RTCP (RFC 5761 demux).
pub fn is_rtcp(data: &[u8]) -> bool {
    data.len() >= 8 && (192..=223).contains(&data[1])
}

/// Decoded RTCP common header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtcpHeader {
    pub padding: bool,
    /// Report count, source count or feedback format
    pub count: u8,
    pub packet_type: u8,
    pub length: u16,
}

impl RtcpHeader {
    pub const SIZE: usize = 4;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(NetworkError::Rtcp("Header too short".to_string()));
        }
        let version = data[0] >> 6;
        if version != 2 {
            return Err(NetworkError::Rtcp(format!(
                "Unsupported RTCP version {}",
                version
            )));
        }

        Ok(RtcpHeader {
            padding: (data[0] >> 5) & 0x01 == 1,
            count: data[0] & 0x1F,
            packet_type: data[1],
            length: parse_u16_be(data, 2),
        })
    }

    /// Size of the sub-packet in bytes, header included.
    pub fn packet_len(&self) -> usize {
        (self.length as usize + 1) * 4
    }
}

/// One parsed sub-packet of a compound RTCP datagram.
#[derive(Debug, Clone)]
pub enum RtcpPacket {
    SenderReport(SenderReport),
    ReceiverReport(ReceiverReport),
    SourceDescription(SourceDescription),
    Bye(ByePacket),
    Nack(GenericNack),
    Pli(PictureLossIndication),
    Fir(FullIntraRequest),
    /// RFC 2032 FIR, which only names the media source.
    LegacyFir { media_ssrc: u32 },
    Remb(Remb),
}

/// Parses every known sub-packet of a compound datagram.
///
/// Unknown packet types and feedback formats are skipped. A sub-packet whose
/// declared length overruns the datagram, or whose body is malformed, fails
/// the whole datagram.
pub fn parse_compound(data: &[u8]) -> Result<Vec<RtcpPacket>> {
    let mut packets = Vec::new();
    let mut offset = 0;

    while offset < data.len() {
        let header = RtcpHeader::from_bytes(&data[offset..])?;
        let end = offset + header.packet_len();
        if end > data.len() {
            return Err(NetworkError::Rtcp(format!(
                "Sub-packet of {} bytes overruns datagram of {} bytes",
                header.packet_len(),
                data.len() - offset
            )));
        }

        if let Some(packet) = parse_single(&header, &data[offset..end])? {
            packets.push(packet);
        }
        offset = end;
    }

    Ok(packets)
}

fn parse_single(header: &RtcpHeader, data: &[u8]) -> Result<Option<RtcpPacket>> {
    let Some(packet_type) = RtcpPacketType::from_u8(header.packet_type) else {
        return Ok(None);
    };

    let packet = match packet_type {
        RtcpPacketType::SR => RtcpPacket::SenderReport(SenderReport::from_bytes(data)?),
        RtcpPacketType::RR => RtcpPacket::ReceiverReport(ReceiverReport::from_bytes(data)?),
        RtcpPacketType::SDES => {
            RtcpPacket::SourceDescription(SourceDescription::from_bytes(data)?)
        }
        RtcpPacketType::BYE => RtcpPacket::Bye(ByePacket::from_bytes(data)?),
        RtcpPacketType::APP => return Ok(None),
        RtcpPacketType::LegacyFir => {
            if data.len() < 8 {
                return Err(NetworkError::Rtcp("Legacy FIR too short".to_string()));
            }
            RtcpPacket::LegacyFir {
                media_ssrc: parse_u32_be(data, 4),
            }
        }
        RtcpPacketType::RTPFB => match header.count {
            feedback::FMT_NACK => RtcpPacket::Nack(GenericNack::from_bytes(data)?),
            _ => return Ok(None),
        },
        RtcpPacketType::PSFB => match header.count {
            feedback::FMT_PLI => RtcpPacket::Pli(PictureLossIndication::from_bytes(data)?),
            feedback::FMT_FIR => RtcpPacket::Fir(FullIntraRequest::from_bytes(data)?),
            feedback::FMT_AFB => match Remb::from_bytes(data) {
                Ok(remb) => RtcpPacket::Remb(remb),
                // Application feedback other than REMB
                Err(_) => return Ok(None),
            },
            _ => return Ok(None),
        },
    };

    Ok(Some(packet))
}
