//! Network Module - RTP/RTCP reliability engine
//!
//! Wire codecs for RTP and RTCP, the sequence-ordered jitter buffer, NACK
//! loss detection with retransmission, receive/RTT/loss statistics, SSRC
//! continuity rewriting and the UDP transport.

// Organized submodules
pub mod codec;
pub mod continuity;
pub mod jitter_buffer;
pub mod nack;
pub mod stats;
pub mod transport;

// Utility modules
pub mod error;
pub mod media;
pub mod traits;

pub use codec::{
    ByePacket, ExtendedSequence, FullIntraRequest, GenericNack, NtpTime, PictureLossIndication,
    ReceiverReport, Remb, ReportBlock, RtcpPacket, RtcpPacketType, RtpHeader, RtpPacket,
    RtpPacketView, SenderReport, SequenceUnwrapper, SourceDescription,
};
pub use continuity::{ContinuityConfig, RewriteResult, SsrcContinuityRewriter};
pub use error::{NetworkError, Result};
pub use jitter_buffer::{DepthMode, JitterBufferConfig, PushRejection, SequencedPacketBuffer};
pub use media::MediaKind;
pub use nack::{
    NackConfig, NackDecision, NackTracker, RetransmitCache, RetransmitConfig, Retransmission,
};
pub use stats::{
    LossAndBitrateTracker, NetworkSnapshot, NetworkStatusLevel, RtcpStatisticsContext,
    RttEstimator, RttSample,
};
pub use traits::PacketSink;
pub use transport::UdpTransport;
