//! Collaborator traits at the transport boundary.

use crate::error::Result;

/// Best-effort datagram output.
///
/// Implementations must not block for long: the engine calls `write` from
/// its sender loop and treats any error as a dropped packet.
pub trait PacketSink: Send + Sync {
    /// Writes one datagram, returning the number of bytes accepted.
    fn write(&self, bytes: &[u8]) -> Result<usize>;
}

impl<T: PacketSink + ?Sized> PacketSink for std::sync::Arc<T> {
    fn write(&self, bytes: &[u8]) -> Result<usize> {
        (**self).write(bytes)
    }
}
