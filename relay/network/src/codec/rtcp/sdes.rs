//! RTCP Source Description (SDES) packets.
//!
//! Only the CNAME item is produced; other item types are skipped on parse.

use super::{RtcpPacketType, length_words, write_rtcp_header};
use crate::codec::rtp::parse_u32_be;
use crate::error::{NetworkError, Result};

const ITEM_END: u8 = 0;
const ITEM_CNAME: u8 = 1;

/// One SSRC chunk of an SDES packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdesChunk {
    pub ssrc: u32,
    pub cname: Option<String>,
}

/// RTCP SDES packet
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceDescription {
    pub chunks: Vec<SdesChunk>,
}

impl SourceDescription {
    /// Single-chunk SDES carrying a CNAME.
    pub fn with_cname(ssrc: u32, cname: &str) -> Self {
        Self {
            chunks: vec![SdesChunk {
                ssrc,
                cname: Some(cname.to_string()),
            }],
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut body = Vec::new();
        for chunk in &self.chunks {
            body.extend_from_slice(&chunk.ssrc.to_be_bytes());
            if let Some(cname) = &chunk.cname {
                let text = &cname.as_bytes()[..cname.len().min(255)];
                body.push(ITEM_CNAME);
                body.push(text.len() as u8);
                body.extend_from_slice(text);
            }
            // At least one END octet, then pad the chunk to a word boundary
            body.push(ITEM_END);
            while !body.len().is_multiple_of(4) {
                body.push(ITEM_END);
            }
        }

        let mut bytes = Vec::with_capacity(4 + body.len());
        write_rtcp_header(
            &mut bytes,
            RtcpPacketType::SDES,
            self.chunks.len() as u8,
            length_words(4 + body.len()),
        );
        bytes.extend_from_slice(&body);
        bytes
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < 4 {
            return Err(NetworkError::Rtcp("SDES packet too short".to_string()));
        }

        let count = data[0] & 0x1F;
        let mut chunks = Vec::with_capacity(count as usize);
        let mut offset = 4;

        for _ in 0..count {
            if offset + 4 > data.len() {
                return Err(NetworkError::Rtcp("SDES chunk truncated".to_string()));
            }
            let ssrc = parse_u32_be(data, offset);
            offset += 4;

            let mut cname = None;
            loop {
                let Some(&item_type) = data.get(offset) else {
                    return Err(NetworkError::Rtcp("SDES items unterminated".to_string()));
                };
                if item_type == ITEM_END {
                    offset += 1;
                    break;
                }
                let Some(&len) = data.get(offset + 1) else {
                    return Err(NetworkError::Rtcp("SDES item truncated".to_string()));
                };
                let start = offset + 2;
                let end = start + len as usize;
                if end > data.len() {
                    return Err(NetworkError::Rtcp("SDES item truncated".to_string()));
                }
                if item_type == ITEM_CNAME {
                    cname = Some(String::from_utf8_lossy(&data[start..end]).to_string());
                }
                offset = end;
            }
            offset = offset.next_multiple_of(4);

            chunks.push(SdesChunk { ssrc, cname });
        }

        Ok(Self { chunks })
    }
}
