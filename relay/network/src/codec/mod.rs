//! Codec module - RTP/RTCP wire formats and sequence arithmetic

pub mod rtcp;
pub mod rtp;
pub mod sequence;

pub use rtcp::{
    ByePacket, FullIntraRequest, GenericNack, NtpTime, PictureLossIndication, ReceiverReport,
    Remb, ReportBlock, RtcpPacket, RtcpPacketType, SenderReport, SourceDescription,
};
pub use rtp::{RtpHeader, RtpPacket, RtpPacketView};
pub use sequence::{ExtendedSequence, SequenceUnwrapper};
