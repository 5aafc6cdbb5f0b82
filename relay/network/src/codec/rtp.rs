//! RTP packet structure and serialization
//!
//! This module implements RFC 3550 (RTP: A Transport Protocol for Real-Time Applications).
//! [`RtpHeader`] and [`RtpPacket`] build packets field by field; [`RtpPacketView`]
//! wraps a received datagram and rewrites header fields in place while relaying.
//!
//! # RTP Header Format (RFC 3550 Section 5.1)
//!
//! ```text
//! 0                   1                   2                   3
//! 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |V=2|P|X|  CC   |M|     PT      |       Sequence Number         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                           Timestamp                           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |           SSRC (Synchronization Source)                       |
//! +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
//! |            CSRC list (0-15 items, 32 bits each)               |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |   Extension profile (X=1)     |    Extension length (words)   |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use network::codec::rtp::{RtpHeader, RtpPacket, RtpPacketView};
//!
//! let mut header = RtpHeader::new(96, 12345);
//! header.sequence_number = 100;
//! header.timestamp = 90000;
//!
//! let bytes = RtpPacket::new(header, vec![1, 2, 3]).to_bytes();
//! let mut view = RtpPacketView::parse(bytes)?;
//! view.set_ssrc(0xCAFE);
//! ```

use crate::error::{NetworkError, Result};

/// Helper functions to eliminate repetitive byte parsing
pub(crate) fn parse_u16_be(data: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([data[offset], data[offset + 1]])
}

pub(crate) fn parse_u32_be(data: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

/// RTP version carried by every valid packet.
pub const RTP_VERSION: u8 = 2;

/// RTP packet header according to RFC 3550.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpHeader {
    /// RTP version (always 2)
    pub version: u8,
    /// Padding flag
    pub padding: bool,
    /// Extension flag
    pub extension: bool,
    /// CSRC count (0-15)
    pub csrc_count: u8,
    /// Marker bit (interpretation depends on payload type)
    pub marker: bool,
    /// Payload type (0-127)
    pub payload_type: u8,
    /// Sequence number (increments by 1 for each packet)
    pub sequence_number: u16,
    /// Timestamp in the stream's clock rate
    pub timestamp: u32,
    /// Synchronization source identifier
    pub ssrc: u32,
}

impl RtpHeader {
    /// Fixed size of RTP header in bytes.
    pub const HEADER_SIZE: usize = 12;

    /// Creates a new RTP header with default values.
    ///
    /// # Arguments
    /// * `payload_type` - RTP payload type (e.g., 96 for dynamic video)
    /// * `ssrc` - Synchronization source identifier
    pub fn new(payload_type: u8, ssrc: u32) -> Self {
        RtpHeader {
            version: RTP_VERSION,
            padding: false,
            extension: false,
            csrc_count: 0,
            marker: false,
            payload_type,
            sequence_number: 0,
            timestamp: 0,
            ssrc,
        }
    }

    /// Serializes the fixed 12-byte part of the header.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(Self::HEADER_SIZE);

        // Byte 0: V(2) + P(1) + X(1) + CC(4)
        let byte0 = (self.version << 6)
            | ((self.padding as u8) << 5)
            | ((self.extension as u8) << 4)
            | (self.csrc_count & 0x0F);
        bytes.push(byte0);

        // Byte 1: M(1) + PT(7)
        let byte1 = ((self.marker as u8) << 7) | (self.payload_type & 0x7F);
        bytes.push(byte1);

        bytes.extend_from_slice(&self.sequence_number.to_be_bytes());
        bytes.extend_from_slice(&self.timestamp.to_be_bytes());
        bytes.extend_from_slice(&self.ssrc.to_be_bytes());

        bytes
    }

    /// Decodes the fixed header without validating the version.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::HEADER_SIZE {
            return Err(NetworkError::Rtp("Header too short".to_string()));
        }

        Ok(RtpHeader {
            version: (data[0] >> 6) & 0x03,
            padding: ((data[0] >> 5) & 0x01) == 1,
            extension: ((data[0] >> 4) & 0x01) == 1,
            csrc_count: data[0] & 0x0F,
            marker: ((data[1] >> 7) & 0x01) == 1,
            payload_type: data[1] & 0x7F,
            sequence_number: parse_u16_be(data, 2),
            timestamp: parse_u32_be(data, 4),
            ssrc: parse_u32_be(data, 8),
        })
    }
}

/// Complete RTP packet built from a header and a payload.
#[derive(Debug, Clone)]
pub struct RtpPacket {
    pub header: RtpHeader,
    pub payload: Vec<u8>,
}

impl RtpPacket {
    pub fn new(header: RtpHeader, payload: Vec<u8>) -> Self {
        RtpPacket { header, payload }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.header.to_bytes();
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    /// Serializes and re-parses the packet as a relay view.
    pub fn into_view(self) -> Result<RtpPacketView> {
        RtpPacketView::parse(self.to_bytes())
    }
}

/// A received RTP datagram with its decoded header.
///
/// The buffer is owned and never reallocated. The setters keep the decoded
/// header and the wire bytes in sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpPacketView {
    buffer: Vec<u8>,
    header: RtpHeader,
    payload_offset: usize,
    payload_end: usize,
}

impl RtpPacketView {
    /// Parses and validates a datagram.
    ///
    /// # Errors
    ///
    /// Fails when the version is not 2, or the buffer is shorter than the
    /// fixed header plus the declared CSRC list, extension and padding.
    pub fn parse(buffer: Vec<u8>) -> Result<Self> {
        let header = RtpHeader::from_bytes(&buffer)?;

        if header.version != RTP_VERSION {
            return Err(NetworkError::InvalidPacket(format!(
                "Unsupported RTP version {}",
                header.version
            )));
        }

        let mut offset = RtpHeader::HEADER_SIZE + 4 * header.csrc_count as usize;
        if buffer.len() < offset {
            return Err(NetworkError::InvalidPacket(format!(
                "RTP packet of {} bytes too short for {} CSRCs",
                buffer.len(),
                header.csrc_count
            )));
        }

        if header.extension {
            if buffer.len() < offset + 4 {
                return Err(NetworkError::InvalidPacket(
                    "RTP extension header truncated".to_string(),
                ));
            }
            let words = parse_u16_be(&buffer, offset + 2) as usize;
            offset += 4 + words * 4;
            if buffer.len() < offset {
                return Err(NetworkError::InvalidPacket(
                    "RTP extension body truncated".to_string(),
                ));
            }
        }

        let mut payload_end = buffer.len();
        if header.padding {
            let padding = buffer.last().copied().unwrap_or(0) as usize;
            if padding == 0 || offset + padding > buffer.len() {
                return Err(NetworkError::InvalidPacket(format!(
                    "Invalid RTP padding length {}",
                    padding
                )));
            }
            payload_end -= padding;
        }

        Ok(RtpPacketView {
            buffer,
            header,
            payload_offset: offset,
            payload_end,
        })
    }

    /// Copies `data` and parses it.
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        Self::parse(data.to_vec())
    }

    pub fn header(&self) -> &RtpHeader {
        &self.header
    }

    pub fn version(&self) -> u8 {
        self.header.version
    }

    pub fn marker(&self) -> bool {
        self.header.marker
    }

    pub fn payload_type(&self) -> u8 {
        self.header.payload_type
    }

    pub fn sequence_number(&self) -> u16 {
        self.header.sequence_number
    }

    pub fn timestamp(&self) -> u32 {
        self.header.timestamp
    }

    pub fn ssrc(&self) -> u32 {
        self.header.ssrc
    }

    /// Payload bytes, excluding CSRCs, extension and padding.
    pub fn payload(&self) -> &[u8] {
        &self.buffer[self.payload_offset..self.payload_end]
    }

    /// The complete datagram as it would go on the wire.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn set_ssrc(&mut self, ssrc: u32) {
        self.header.ssrc = ssrc;
        self.buffer[8..12].copy_from_slice(&ssrc.to_be_bytes());
    }

    pub fn set_timestamp(&mut self, timestamp: u32) {
        self.header.timestamp = timestamp;
        self.buffer[4..8].copy_from_slice(&timestamp.to_be_bytes());
    }

    pub fn set_sequence_number(&mut self, sequence_number: u16) {
        self.header.sequence_number = sequence_number;
        self.buffer[2..4].copy_from_slice(&sequence_number.to_be_bytes());
    }

    /// Rewrites the payload type, preserving the marker bit.
    pub fn set_payload_type(&mut self, payload_type: u8) {
        let payload_type = payload_type & 0x7F;
        self.header.payload_type = payload_type;
        self.buffer[1] = (self.buffer[1] & 0x80) | payload_type;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet_bytes(seq: u16, ts: u32, ssrc: u32, payload: &[u8]) -> Vec<u8> {
        let mut header = RtpHeader::new(96, ssrc);
        header.sequence_number = seq;
        header.timestamp = ts;
        RtpPacket::new(header, payload.to_vec()).to_bytes()
    }

    #[test]
    fn test_rtp_header_serialization() {
        let header = RtpHeader {
            version: 2,
            padding: false,
            extension: false,
            csrc_count: 0,
            marker: true,
            payload_type: 96,
            sequence_number: 1234,
            timestamp: 5678,
            ssrc: 9999,
        };

        let bytes = header.to_bytes();
        let decoded = RtpHeader::from_bytes(&bytes).unwrap();

        assert_eq!(header, decoded);
    }

    #[test]
    fn test_rtp_header_size() {
        let header = RtpHeader::new(96, 1000);
        assert_eq!(header.to_bytes().len(), 12);
    }

    #[test]
    fn test_rtp_header_from_bytes_short() {
        let short_data = vec![0x80, 0x60, 0x12, 0x34];
        assert!(RtpHeader::from_bytes(&short_data).is_err());
    }

    #[test]
    fn test_rtp_header_marker_bit() {
        let mut header = RtpHeader::new(96, 1000);
        header.marker = true;
        let bytes = header.to_bytes();

        // Marker is top bit of second byte
        assert_eq!((bytes[1] >> 7) & 0x01, 1);
    }

    #[test]
    fn test_view_decodes_fields() {
        let view = RtpPacketView::parse(packet_bytes(42, 90000, 0xDEADBEEF, &[1, 2, 3])).unwrap();

        assert_eq!(view.version(), 2);
        assert_eq!(view.payload_type(), 96);
        assert_eq!(view.sequence_number(), 42);
        assert_eq!(view.timestamp(), 90000);
        assert_eq!(view.ssrc(), 0xDEADBEEF);
        assert_eq!(view.payload(), &[1, 2, 3]);
    }

    #[test]
    fn test_view_rejects_wrong_version() {
        let mut bytes = packet_bytes(1, 1, 1, &[]);
        bytes[0] = (1 << 6) | (bytes[0] & 0x3F);

        let result = RtpPacketView::parse(bytes);
        assert!(matches!(result, Err(NetworkError::InvalidPacket(_))));
    }

    #[test]
    fn test_view_rejects_short_buffer() {
        assert!(RtpPacketView::from_slice(&[0x80, 0x60, 0x00]).is_err());
    }

    #[test]
    fn test_view_rejects_missing_csrcs() {
        let mut header = RtpHeader::new(96, 1);
        header.csrc_count = 2;
        // Only one CSRC follows the fixed header
        let mut bytes = header.to_bytes();
        bytes.extend_from_slice(&[0, 0, 0, 1]);

        assert!(RtpPacketView::parse(bytes).is_err());
    }

    #[test]
    fn test_view_skips_csrcs_and_extension() {
        let mut header = RtpHeader::new(96, 1);
        header.csrc_count = 1;
        header.extension = true;
        let mut bytes = header.to_bytes();
        bytes.extend_from_slice(&[0, 0, 0, 7]); // CSRC
        bytes.extend_from_slice(&[0xBE, 0xDE, 0x00, 0x01]); // one extension word
        bytes.extend_from_slice(&[0x10, 0xAA, 0x00, 0x00]);
        bytes.extend_from_slice(&[9, 9]);

        let view = RtpPacketView::parse(bytes).unwrap();
        assert_eq!(view.payload(), &[9, 9]);
    }

    #[test]
    fn test_view_rejects_truncated_extension() {
        let mut header = RtpHeader::new(96, 1);
        header.extension = true;
        let mut bytes = header.to_bytes();
        bytes.extend_from_slice(&[0xBE, 0xDE, 0x00, 0x04]);

        assert!(RtpPacketView::parse(bytes).is_err());
    }

    #[test]
    fn test_view_strips_padding() {
        let mut header = RtpHeader::new(96, 1);
        header.padding = true;
        let mut bytes = header.to_bytes();
        bytes.extend_from_slice(&[5, 6, 0, 0, 3]);

        let view = RtpPacketView::parse(bytes).unwrap();
        assert_eq!(view.payload(), &[5, 6]);
    }

    #[test]
    fn test_setters_rewrite_bytes_in_place() {
        let mut view = RtpPacketView::parse(packet_bytes(7, 100, 5, &[0xAB])).unwrap();

        view.set_ssrc(0x01020304);
        view.set_timestamp(0xA0B0C0D0);
        view.set_sequence_number(0xFFFE);

        let reparsed = RtpPacketView::from_slice(view.as_bytes()).unwrap();
        assert_eq!(reparsed.ssrc(), 0x01020304);
        assert_eq!(reparsed.timestamp(), 0xA0B0C0D0);
        assert_eq!(reparsed.sequence_number(), 0xFFFE);
        assert_eq!(reparsed.payload(), &[0xAB]);
    }

    #[test]
    fn test_set_payload_type_keeps_marker() {
        let mut header = RtpHeader::new(96, 1);
        header.marker = true;
        let mut view = RtpPacket::new(header, vec![]).into_view().unwrap();

        view.set_payload_type(111);

        assert_eq!(view.payload_type(), 111);
        assert!(view.marker());
        assert_eq!(view.as_bytes()[1], 0x80 | 111);
    }
}
