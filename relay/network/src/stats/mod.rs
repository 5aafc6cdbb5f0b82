//! Statistics derived from RTP and RTCP traffic.

pub mod network_status;
pub mod rtcp_context;
pub mod rtt;

pub use network_status::{
    LossAndBitrateTracker, NetworkSnapshot, NetworkStatusLevel, network_status_level,
};
pub use rtcp_context::RtcpStatisticsContext;
pub use rtt::{RttEstimator, RttSample, SendReportHistory};
