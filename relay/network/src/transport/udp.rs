//! UDP transport for sending and receiving RTP/RTCP datagrams

use crate::error::{NetworkError, Result};
use crate::traits::PacketSink;
use logging::Logger;
use parking_lot::RwLock;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicU64, Ordering};

/// Largest datagram accepted by `receive`
const MAX_DATAGRAM: usize = 65536;

/// Non-blocking UDP transport shared between the receive and send paths
pub struct UdpTransport {
    socket: UdpSocket,
    remote_addr: RwLock<Option<SocketAddr>>,
    logger: Logger,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    send_errors: AtomicU64,
}

impl UdpTransport {
    /// Create new UDP transport
    ///
    /// # Arguments
    /// * `bind_addr` - Local Address for bind
    /// * `logger` - Logger
    pub fn new(bind_addr: SocketAddr, logger: Logger) -> Result<Self> {
        logger.info(&format!("Creating UDP socket at {}", bind_addr));

        let socket = UdpSocket::bind(bind_addr)
            .map_err(|e| NetworkError::Network(format!("Error creating socket: {}", e)))?;

        socket
            .set_nonblocking(true)
            .map_err(|e| NetworkError::Network(format!("Error setting non-blocking: {}", e)))?;

        logger.info("UDP socket correctly configured");

        Ok(UdpTransport {
            socket,
            remote_addr: RwLock::new(None),
            logger,
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            send_errors: AtomicU64::new(0),
        })
    }

    /// Establishes the remote address
    pub fn set_remote(&self, addr: SocketAddr) {
        self.logger
            .info(&format!("Establishes remote address: {}", addr));
        *self.remote_addr.write() = Some(addr);
    }

    /// Get the configured remote address
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        *self.remote_addr.read()
    }

    /// Address the socket is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Send data to remote peer
    pub fn send(&self, data: &[u8]) -> Result<usize> {
        let remote_addr = self.get_remote_addr()?;
        match self.send_to_socket(data, remote_addr) {
            Ok(sent) => {
                self.update_send_stats(sent);
                Ok(sent)
            }
            Err(e) => {
                self.send_errors.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    fn get_remote_addr(&self) -> Result<SocketAddr> {
        self.remote_addr()
            .ok_or_else(|| NetworkError::Network("Remote address not set".to_string()))
    }

    fn send_to_socket(&self, data: &[u8], addr: SocketAddr) -> Result<usize> {
        self.socket
            .send_to(data, addr)
            .map_err(|e| NetworkError::Network(format!("Error sending: {}", e)))
    }

    fn update_send_stats(&self, sent: usize) {
        let total = self.bytes_sent.fetch_add(sent as u64, Ordering::Relaxed) + sent as u64;
        if total % 100_000 < sent as u64 {
            self.logger.debug(&format!("Total bytes sent: {}", total));
        }
    }

    /// Receive data from socket (non-blocking)
    ///
    /// # Returns
    /// * `Ok(Some((data, addr)))` - Data and sender address received
    /// * `Ok(None)` - No data available
    /// * `Err` - Network error
    pub fn receive(&self) -> Result<Option<(Vec<u8>, SocketAddr)>> {
        let mut buf = vec![0u8; MAX_DATAGRAM];

        match self.socket.recv_from(&mut buf) {
            Ok((size, addr)) => {
                buf.truncate(size);
                self.update_receive_stats(size);
                Ok(Some((buf, addr)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(NetworkError::Network(format!("Error receiving: {}", e))),
        }
    }

    fn update_receive_stats(&self, size: usize) {
        let total = self.bytes_received.fetch_add(size as u64, Ordering::Relaxed) + size as u64;
        if total % 100_000 < size as u64 {
            self.logger
                .debug(&format!("Total bytes received: {}", total));
        }
    }

    /// Returns transport statistics (bytes_sent, bytes_received)
    pub fn stats(&self) -> (u64, u64) {
        (
            self.bytes_sent.load(Ordering::Relaxed),
            self.bytes_received.load(Ordering::Relaxed),
        )
    }

    /// Number of failed sends
    pub fn send_errors(&self) -> u64 {
        self.send_errors.load(Ordering::Relaxed)
    }
}

impl PacketSink for UdpTransport {
    fn write(&self, bytes: &[u8]) -> Result<usize> {
        self.send(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logging::LogLevel;
    use tempfile::{TempDir, tempdir};

    fn create_test_logger() -> (TempDir, Logger) {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("test.log");
        let logger = Logger::new(log_path, LogLevel::Debug).unwrap();
        (dir, logger)
    }

    fn bound_transport() -> (TempDir, UdpTransport) {
        let (dir, logger) = create_test_logger();
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        (dir, UdpTransport::new(addr, logger).unwrap())
    }

    fn receive_with_retry(transport: &UdpTransport) -> Option<(Vec<u8>, SocketAddr)> {
        for _ in 0..100 {
            if let Some(datagram) = transport.receive().unwrap() {
                return Some(datagram);
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        None
    }

    #[test]
    fn test_udp_transport_creation() {
        let (_dir, logger) = create_test_logger();
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let transport = UdpTransport::new(addr, logger);
        assert!(transport.is_ok());
    }

    #[test]
    fn test_udp_transport_set_remote() {
        let (_dir, transport) = bound_transport();

        let remote: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        transport.set_remote(remote);

        assert_eq!(transport.remote_addr(), Some(remote));
    }

    #[test]
    fn test_udp_transport_send_without_remote() {
        let (_dir, transport) = bound_transport();

        let result = transport.send(&[1, 2, 3, 4, 5]);

        assert!(result.is_err());
        assert_eq!(transport.stats().0, 0);
    }

    #[test]
    fn test_udp_transport_stats_initial() {
        let (_dir, transport) = bound_transport();

        let (sent, received) = transport.stats();
        assert_eq!(sent, 0);
        assert_eq!(received, 0);
        assert_eq!(transport.send_errors(), 0);
    }

    #[test]
    fn test_udp_transport_receive_nonblocking() {
        let (_dir, transport) = bound_transport();

        // Should return None immediately (non-blocking)
        let result = transport.receive().unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_udp_transport_send_receive() {
        let (_dir1, transport1) = bound_transport();
        let (_dir2, transport2) = bound_transport();

        let actual_addr1 = transport1.local_addr().unwrap();
        let actual_addr2 = transport2.local_addr().unwrap();

        transport1.set_remote(actual_addr2);
        transport2.set_remote(actual_addr1);

        let test_data = vec![10, 20, 30, 40, 50];
        let sent = transport1.send(&test_data).unwrap();
        assert_eq!(sent, test_data.len());

        let (data, from_addr) = receive_with_retry(&transport2).unwrap();
        assert_eq!(data, test_data);
        assert_eq!(from_addr, actual_addr1);
        assert_eq!(transport2.stats().1, test_data.len() as u64);
    }

    #[test]
    fn test_udp_transport_as_packet_sink() {
        let (_dir1, transport1) = bound_transport();
        let (_dir2, transport2) = bound_transport();
        transport1.set_remote(transport2.local_addr().unwrap());

        let sink: std::sync::Arc<dyn PacketSink> = std::sync::Arc::new(transport1);
        for i in 0..5 {
            sink.write(&[i; 10]).unwrap();
        }

        for _ in 0..5 {
            assert!(receive_with_retry(&transport2).is_some());
        }
        assert_eq!(transport2.stats().1, 50);
    }

    #[test]
    fn test_udp_transport_empty_data() {
        let (_dir1, transport1) = bound_transport();
        let (_dir2, transport2) = bound_transport();
        transport1.set_remote(transport2.local_addr().unwrap());

        let result = transport1.send(&[]);
        assert!(result.is_ok());
    }
}
