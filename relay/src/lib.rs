//! Relay Library
//!
//! RTP/RTCP reliability and continuity engine for a selective forwarding
//! unit. The wire codecs and per-source state machines live in the
//! `network` crate; this crate wires them into a [`MediaStream`] with a
//! priority send queue, periodic RTCP and key-frame handling.

pub mod clock;
pub mod config;
pub mod error;
pub mod key_frame;
pub mod send_queue;
pub mod sink;
pub mod stream;

// Re-export commonly used types for integration tests
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::RelayConfig;
pub use error::{RelayError, Result};
pub use send_queue::{Route, RouteSinks, SendPriority, SendQueue};
pub use sink::{NoopTelemetry, TelemetrySink};
pub use stream::{MediaStream, NetworkReport, ReceiveStats, RtcpOutcome, TickReport};
