//! RTCP BYE packet implementation

use super::RtcpPacketType;
use crate::codec::rtp::parse_u32_be;
use crate::error::{NetworkError, Result};

/// RTCP BYE packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByePacket {
    /// SSRC(s) leaving
    pub ssrcs: Vec<u32>,
    /// Optional reason for leaving
    pub reason: Option<String>,
}

impl ByePacket {
    pub fn new(ssrc: u32, reason: Option<String>) -> Self {
        Self {
            ssrcs: vec![ssrc],
            reason,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let reason_len = self.reason_bytes().len();
        let mut bytes = Vec::with_capacity(4 + self.ssrcs.len() * 4 + 1 + reason_len);

        write_header(&mut bytes, self.ssrcs.len(), reason_len);
        write_ssrcs(&mut bytes, &self.ssrcs);
        write_reason(&mut bytes, self.reason_bytes());

        bytes
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < 4 {
            return Err(NetworkError::Rtcp("BYE packet too short".to_string()));
        }

        let sc = data[0] & 0x1F;
        let (ssrcs, offset) = parse_ssrcs(data, sc)?;
        let reason = parse_reason(data, offset);

        Ok(Self { ssrcs, reason })
    }

    /// Reason text truncated to the 255 bytes the length octet can describe.
    fn reason_bytes(&self) -> &[u8] {
        let text = self.reason.as_deref().unwrap_or("").as_bytes();
        &text[..text.len().min(255)]
    }
}

fn write_header(bytes: &mut Vec<u8>, ssrc_count: usize, reason_len: usize) {
    let version = 2u8;
    let padding = 0u8;
    let sc = (ssrc_count as u8) & 0x1F;
    bytes.push((version << 6) | (padding << 5) | sc);
    bytes.push(RtcpPacketType::BYE as u8);

    let words = ssrc_count
        + if reason_len > 0 {
            (1 + reason_len).div_ceil(4)
        } else {
            0
        };
    let length = words as u16;
    bytes.extend_from_slice(&length.to_be_bytes());
}

fn write_ssrcs(bytes: &mut Vec<u8>, ssrcs: &[u32]) {
    for ssrc in ssrcs {
        bytes.extend_from_slice(&ssrc.to_be_bytes());
    }
}

fn write_reason(bytes: &mut Vec<u8>, reason: &[u8]) {
    if reason.is_empty() {
        return;
    }
    bytes.push(reason.len() as u8);
    bytes.extend_from_slice(reason);

    while !bytes.len().is_multiple_of(4) {
        bytes.push(0);
    }
}

fn parse_ssrcs(data: &[u8], sc: u8) -> Result<(Vec<u32>, usize)> {
    let mut ssrcs = Vec::with_capacity(sc as usize);
    let mut offset = 4;

    for _ in 0..sc {
        if offset + 4 > data.len() {
            return Err(NetworkError::Rtcp("BYE packet truncated".to_string()));
        }
        ssrcs.push(parse_u32_be(data, offset));
        offset += 4;
    }

    Ok((ssrcs, offset))
}

fn parse_reason(data: &[u8], offset: usize) -> Option<String> {
    if offset >= data.len() {
        return None;
    }

    let len = data[offset] as usize;
    let text_start = offset + 1;

    if len > 0 && text_start + len <= data.len() {
        Some(String::from_utf8_lossy(&data[text_start..text_start + len]).to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bye_packet() {
        let bye = ByePacket::new(12345, Some("Leaving call".to_string()));
        let bytes = bye.to_bytes();

        assert_eq!(bytes[1], RtcpPacketType::BYE as u8);
        assert!(bytes.len().is_multiple_of(4));

        let parsed = ByePacket::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, bye);
    }

    #[test]
    fn test_bye_without_reason() {
        let bytes = ByePacket::new(7, None).to_bytes();
        assert_eq!(bytes.len(), 8);
        assert_eq!(u16::from_be_bytes([bytes[2], bytes[3]]), 1);

        let parsed = ByePacket::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.ssrcs, vec![7]);
        assert!(parsed.reason.is_none());
    }

    #[test]
    fn test_bye_truncated_ssrc_list() {
        let data = [0x82, 203, 0x00, 0x02, 0, 0, 0, 1];
        assert!(ByePacket::from_bytes(&data).is_err());
    }
}
