//! RTCP feedback messages (RFC 4585, RFC 5104, REMB draft).
//!
//! ```text
//! 0                   1                   2                   3
//! 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |V=2|P|   FMT   |       PT      |          length               |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                  SSRC of packet sender                        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                  SSRC of media source                         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! :            Feedback Control Information (FCI)                 :
//! ```

use super::{RtcpPacketType, length_words, write_rtcp_header};
use crate::codec::rtp::{parse_u16_be, parse_u32_be};
use crate::codec::sequence::forward_distance;
use crate::error::{NetworkError, Result};

/// RTPFB format: Generic NACK
pub const FMT_NACK: u8 = 1;
/// PSFB format: Picture Loss Indication
pub const FMT_PLI: u8 = 1;
/// PSFB format: Full Intra Request
pub const FMT_FIR: u8 = 4;
/// PSFB format: Application layer feedback (REMB)
pub const FMT_AFB: u8 = 15;

const FEEDBACK_HEADER_SIZE: usize = 12;
const REMB_IDENTIFIER: &[u8; 4] = b"REMB";
const REMB_MAX_MANTISSA: u64 = 0x3FFFF;

fn write_feedback_header(
    bytes: &mut Vec<u8>,
    packet_type: RtcpPacketType,
    fmt: u8,
    total_len: usize,
    sender_ssrc: u32,
    media_ssrc: u32,
) {
    write_rtcp_header(bytes, packet_type, fmt, length_words(total_len));
    bytes.extend_from_slice(&sender_ssrc.to_be_bytes());
    bytes.extend_from_slice(&media_ssrc.to_be_bytes());
}

fn parse_feedback_header(data: &[u8], name: &str) -> Result<(u32, u32)> {
    if data.len() < FEEDBACK_HEADER_SIZE {
        return Err(NetworkError::Rtcp(format!("{} packet too short", name)));
    }
    Ok((parse_u32_be(data, 4), parse_u32_be(data, 8)))
}

/// Generic NACK: lost sequence numbers of one media source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericNack {
    pub sender_ssrc: u32,
    pub media_ssrc: u32,
    /// Lost sequence numbers in circular ascending order
    pub lost: Vec<u16>,
}

impl GenericNack {
    pub fn new(sender_ssrc: u32, media_ssrc: u32, lost: Vec<u16>) -> Self {
        Self {
            sender_ssrc,
            media_ssrc,
            lost,
        }
    }

    /// Packs `lost` into PID/BLP words.
    ///
    /// A new word starts whenever a sequence is more than 16 past the current
    /// PID; otherwise bit `n - pid - 1` of the bitmask is set.
    pub fn fci(&self) -> Vec<(u16, u16)> {
        let mut words = Vec::new();
        let mut iter = self.lost.iter().copied();
        let Some(first) = iter.next() else {
            return words;
        };

        let mut pid = first;
        let mut blp = 0u16;
        for seq in iter {
            let distance = forward_distance(pid, seq);
            if distance == 0 {
                continue;
            }
            if distance > 16 {
                words.push((pid, blp));
                pid = seq;
                blp = 0;
            } else {
                blp |= 1 << (distance - 1);
            }
        }
        words.push((pid, blp));
        words
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let fci = self.fci();
        let total = FEEDBACK_HEADER_SIZE + fci.len() * 4;
        let mut bytes = Vec::with_capacity(total);

        write_feedback_header(
            &mut bytes,
            RtcpPacketType::RTPFB,
            FMT_NACK,
            total,
            self.sender_ssrc,
            self.media_ssrc,
        );
        for (pid, blp) in fci {
            bytes.extend_from_slice(&pid.to_be_bytes());
            bytes.extend_from_slice(&blp.to_be_bytes());
        }
        bytes
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let (sender_ssrc, media_ssrc) = parse_feedback_header(data, "NACK")?;

        let mut lost = Vec::new();
        let mut offset = FEEDBACK_HEADER_SIZE;
        while offset + 4 <= data.len() {
            let pid = parse_u16_be(data, offset);
            let blp = parse_u16_be(data, offset + 2);
            lost.push(pid);
            for bit in 0..16u16 {
                if blp & (1 << bit) != 0 {
                    lost.push(pid.wrapping_add(bit + 1));
                }
            }
            offset += 4;
        }

        Ok(Self {
            sender_ssrc,
            media_ssrc,
            lost,
        })
    }
}

/// Picture Loss Indication
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PictureLossIndication {
    pub sender_ssrc: u32,
    pub media_ssrc: u32,
}

impl PictureLossIndication {
    pub fn new(sender_ssrc: u32, media_ssrc: u32) -> Self {
        Self {
            sender_ssrc,
            media_ssrc,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(FEEDBACK_HEADER_SIZE);
        write_feedback_header(
            &mut bytes,
            RtcpPacketType::PSFB,
            FMT_PLI,
            FEEDBACK_HEADER_SIZE,
            self.sender_ssrc,
            self.media_ssrc,
        );
        bytes
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let (sender_ssrc, media_ssrc) = parse_feedback_header(data, "PLI")?;
        Ok(Self {
            sender_ssrc,
            media_ssrc,
        })
    }
}

/// One FCI entry of a Full Intra Request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirEntry {
    pub ssrc: u32,
    /// Command sequence number, incremented per new request (mod 256)
    pub sequence_number: u8,
}

/// Full Intra Request (RFC 5104 section 4.3.1)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullIntraRequest {
    pub sender_ssrc: u32,
    pub entries: Vec<FirEntry>,
}

impl FullIntraRequest {
    pub fn new(sender_ssrc: u32, media_ssrc: u32, sequence_number: u8) -> Self {
        Self {
            sender_ssrc,
            entries: vec![FirEntry {
                ssrc: media_ssrc,
                sequence_number,
            }],
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let total = FEEDBACK_HEADER_SIZE + self.entries.len() * 8;
        let mut bytes = Vec::with_capacity(total);

        // Media source SSRC is unused for FIR and set to zero
        write_feedback_header(
            &mut bytes,
            RtcpPacketType::PSFB,
            FMT_FIR,
            total,
            self.sender_ssrc,
            0,
        );
        for entry in &self.entries {
            bytes.extend_from_slice(&entry.ssrc.to_be_bytes());
            bytes.push(entry.sequence_number);
            bytes.extend_from_slice(&[0, 0, 0]);
        }
        bytes
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let (sender_ssrc, _) = parse_feedback_header(data, "FIR")?;

        let mut entries = Vec::new();
        let mut offset = FEEDBACK_HEADER_SIZE;
        while offset + 8 <= data.len() {
            entries.push(FirEntry {
                ssrc: parse_u32_be(data, offset),
                sequence_number: data[offset + 4],
            });
            offset += 8;
        }

        Ok(Self {
            sender_ssrc,
            entries,
        })
    }
}

/// The REMB SSRC count is a single octet
pub const REMB_MAX_SSRCS: usize = u8::MAX as usize;

/// Receiver Estimated Maximum Bitrate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remb {
    pub sender_ssrc: u32,
    /// Estimated bitrate in bits per second
    pub bitrate: u64,
    pub ssrcs: Vec<u32>,
}

impl Remb {
    /// SSRCs past the first 255 are dropped.
    pub fn new(sender_ssrc: u32, bitrate: u64, mut ssrcs: Vec<u32>) -> Self {
        ssrcs.truncate(REMB_MAX_SSRCS);
        Self {
            sender_ssrc,
            bitrate,
            ssrcs,
        }
    }

    /// Splits `bitrate` into the 6-bit exponent and 18-bit mantissa.
    pub fn encode_bitrate(bitrate: u64) -> (u8, u32) {
        let mut exponent = 0u32;
        while exponent < 63 && bitrate > (REMB_MAX_MANTISSA << exponent) {
            exponent += 1;
        }
        let mantissa = (bitrate >> exponent).min(REMB_MAX_MANTISSA);
        (exponent as u8, mantissa as u32)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let ssrcs = &self.ssrcs[..self.ssrcs.len().min(REMB_MAX_SSRCS)];
        let total = FEEDBACK_HEADER_SIZE + 8 + ssrcs.len() * 4;
        let mut bytes = Vec::with_capacity(total);

        write_feedback_header(
            &mut bytes,
            RtcpPacketType::PSFB,
            FMT_AFB,
            total,
            self.sender_ssrc,
            0,
        );
        bytes.extend_from_slice(REMB_IDENTIFIER);

        let (exponent, mantissa) = Self::encode_bitrate(self.bitrate);
        bytes.push(ssrcs.len() as u8);
        bytes.push((exponent << 2) | ((mantissa >> 16) & 0x03) as u8);
        bytes.push((mantissa >> 8) as u8);
        bytes.push(mantissa as u8);

        for ssrc in ssrcs {
            bytes.extend_from_slice(&ssrc.to_be_bytes());
        }
        bytes
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let (sender_ssrc, _) = parse_feedback_header(data, "REMB")?;
        if data.len() < FEEDBACK_HEADER_SIZE + 8 {
            return Err(NetworkError::Rtcp("REMB packet too short".to_string()));
        }
        if &data[12..16] != REMB_IDENTIFIER {
            return Err(NetworkError::Rtcp("Not a REMB message".to_string()));
        }

        let num_ssrc = data[16] as usize;
        let exponent = (data[17] >> 2) as u32;
        let mantissa =
            (((data[17] & 0x03) as u64) << 16) | ((data[18] as u64) << 8) | data[19] as u64;
        let bitrate = mantissa.checked_shl(exponent).unwrap_or(u64::MAX);

        let mut ssrcs = Vec::with_capacity(num_ssrc);
        let mut offset = FEEDBACK_HEADER_SIZE + 8;
        for _ in 0..num_ssrc {
            if offset + 4 > data.len() {
                return Err(NetworkError::Rtcp("REMB SSRC list truncated".to_string()));
            }
            ssrcs.push(parse_u32_be(data, offset));
            offset += 4;
        }

        Ok(Self {
            sender_ssrc,
            bitrate,
            ssrcs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nack_fci_single_word() {
        let nack = GenericNack::new(1, 2, vec![100, 101, 103, 116]);
        assert_eq!(nack.fci(), vec![(100, 0b1000_0000_0000_0101)]);
    }

    #[test]
    fn test_nack_fci_splits_beyond_sixteen() {
        let nack = GenericNack::new(1, 2, vec![100, 116, 117]);
        assert_eq!(nack.fci(), vec![(100, 1 << 15), (117, 0)]);
    }

    #[test]
    fn test_nack_fci_across_wrap() {
        let nack = GenericNack::new(1, 2, vec![65534, 65535, 0, 1]);
        assert_eq!(nack.fci(), vec![(65534, 0b111)]);
    }

    #[test]
    fn test_nack_fci_ignores_repeats() {
        let nack = GenericNack::new(1, 2, vec![5, 5, 6]);
        assert_eq!(nack.fci(), vec![(5, 0b1)]);
    }

    #[test]
    fn test_nack_roundtrip_expands_blp() {
        let lost = vec![10, 12, 26, 27, 60];
        let bytes = GenericNack::new(7, 9, lost.clone()).to_bytes();

        assert_eq!(bytes[0] & 0x1F, FMT_NACK);
        assert_eq!(bytes[1], RtcpPacketType::RTPFB as u8);

        let parsed = GenericNack::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.media_ssrc, 9);
        assert_eq!(parsed.lost, lost);
    }

    #[test]
    fn test_pli_layout() {
        let bytes = PictureLossIndication::new(0x11, 0x22).to_bytes();
        assert_eq!(bytes.len(), 12);
        assert_eq!(bytes[0], 0x81);
        assert_eq!(bytes[1], 206);
        assert_eq!(u16::from_be_bytes([bytes[2], bytes[3]]), 2);
    }

    #[test]
    fn test_fir_layout_and_parse() {
        let bytes = FullIntraRequest::new(0x11, 0x22, 255).to_bytes();
        assert_eq!(bytes.len(), 20);
        assert_eq!(bytes[0] & 0x1F, FMT_FIR);
        // Media source field is zero
        assert_eq!(&bytes[8..12], &[0, 0, 0, 0]);

        let parsed = FullIntraRequest::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.entries[0].ssrc, 0x22);
        assert_eq!(parsed.entries[0].sequence_number, 255);
    }

    #[test]
    fn test_remb_encode_small_bitrate() {
        assert_eq!(Remb::encode_bitrate(200_000), (0, 200_000));
    }

    #[test]
    fn test_remb_encode_large_bitrate() {
        let (exponent, mantissa) = Remb::encode_bitrate(2_000_000);
        assert_eq!(exponent, 3);
        assert_eq!(mantissa, 250_000);
    }

    #[test]
    fn test_remb_packet_layout() {
        let bytes = Remb::new(1, 1_000_000, vec![0xAABBCCDD]).to_bytes();

        assert_eq!(bytes.len(), 24);
        assert_eq!(u16::from_be_bytes([bytes[2], bytes[3]]), 5);
        assert_eq!(&bytes[12..16], b"REMB");
        assert_eq!(bytes[16], 1);

        let parsed = Remb::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.ssrcs, vec![0xAABBCCDD]);
        // 1_000_000 needs exponent 2; the low bits are truncated
        assert_eq!(parsed.bitrate, (1_000_000 >> 2) << 2);
    }

    #[test]
    fn test_remb_ssrc_list_is_capped() {
        let ssrcs: Vec<u32> = (0..300).collect();
        let remb = Remb::new(1, 64_000, ssrcs.clone());
        assert_eq!(remb.ssrcs.len(), REMB_MAX_SSRCS);

        // A list grown after construction is capped on the wire too
        let oversized = Remb {
            sender_ssrc: 1,
            bitrate: 64_000,
            ssrcs,
        };
        let bytes = oversized.to_bytes();
        assert_eq!(bytes[16], 255);
        assert_eq!(bytes.len(), FEEDBACK_HEADER_SIZE + 8 + 255 * 4);

        let parsed = Remb::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.ssrcs.len(), 255);
        assert_eq!(parsed.ssrcs[254], 254);
    }

    #[test]
    fn test_remb_rejects_other_afb() {
        let mut bytes = Remb::new(1, 1000, vec![]).to_bytes();
        bytes[12..16].copy_from_slice(b"XXXX");
        assert!(Remb::from_bytes(&bytes).is_err());
    }
}
