//! Transport module - UDP datagram transport

pub mod udp;

pub use udp::UdpTransport;
