//! Blocking UDP socket wrapper with kernel buffer sizing and bounded receive
//! waits.
use socket2::{Domain, Protocol, Socket, Type};
use std::io::{Error as IoError, ErrorKind};
use std::net::{SocketAddr, UdpSocket as StdUdpSocket};
use std::time::Duration;

/// Maximum size of a single UDP datagram.
pub const MAX_UDP_PACKET_SIZE: usize = 65536;

/// Errors that can occur during socket operations.
#[derive(Debug)]
pub enum SocketError {
    Io(IoError),
    /// A bounded receive wait elapsed without data (or was interrupted).
    Timeout,
    Bind { addr: SocketAddr, source: IoError },
}

impl std::fmt::Display for SocketError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SocketError::Io(e) => write!(f, "IO error: {}", e),
            SocketError::Timeout => write!(f, "Receive timed out"),
            SocketError::Bind { addr, source } => write!(f, "Failed to bind {}: {}", addr, source),
        }
    }
}

impl std::error::Error for SocketError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SocketError::Io(e) => Some(e),
            SocketError::Bind { source, .. } => Some(source),
            SocketError::Timeout => None,
        }
    }
}

impl From<IoError> for SocketError {
    fn from(err: IoError) -> Self {
        match err.kind() {
            ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted => {
                SocketError::Timeout
            }
            _ => SocketError::Io(err),
        }
    }
}

/// Kernel-level socket options applied before binding.
#[derive(Debug, Clone, Copy, Default)]
pub struct SocketOptions {
    pub recv_buffer_size: Option<usize>,
    pub send_buffer_size: Option<usize>,
    pub read_timeout: Option<Duration>,
}

/// UDP socket owning a reusable receive buffer.
pub struct UdpSocket {
    socket: StdUdpSocket,
    recv_buffer: Vec<u8>,
}

impl UdpSocket {
    /// Creates a socket with `options` applied and binds it to `addr`.
    ///
    /// `read_len` bounds how many bytes of each datagram are read; longer
    /// datagrams are truncated by the kernel.
    pub fn bind(
        addr: SocketAddr,
        options: SocketOptions,
        read_len: usize,
    ) -> Result<Self, SocketError> {
        let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;

        if let Some(size) = options.recv_buffer_size {
            socket.set_recv_buffer_size(size)?;
            log::debug!(
                "Requested SO_RCVBUF {} bytes, kernel granted {}",
                size,
                socket.recv_buffer_size()?
            );
        }
        if let Some(size) = options.send_buffer_size {
            socket.set_send_buffer_size(size)?;
            log::debug!(
                "Requested SO_SNDBUF {} bytes, kernel granted {}",
                size,
                socket.send_buffer_size()?
            );
        }
        socket.set_read_timeout(options.read_timeout)?;

        socket
            .bind(&addr.into())
            .map_err(|source| SocketError::Bind { addr, source })?;

        Ok(Self {
            socket: socket.into(),
            recv_buffer: vec![0u8; read_len.clamp(1, MAX_UDP_PACKET_SIZE)],
        })
    }

    /// Returns the local address this socket is bound to
    pub fn local_addr(&self) -> Result<SocketAddr, SocketError> {
        Ok(self.socket.local_addr()?)
    }

    /// Sends data to a specific address
    pub fn send_to(&mut self, data: &[u8], addr: SocketAddr) -> Result<usize, SocketError> {
        self.socket.send_to(data, addr).map_err(SocketError::Io)
    }

    /// Waits up to the read timeout for one datagram; returns the data slice
    /// and sender address, or [`SocketError::Timeout`].
    pub fn recv_from(&mut self) -> Result<(&[u8], SocketAddr), SocketError> {
        let (len, addr) = self.socket.recv_from(&mut self.recv_buffer)?;
        Ok((&self.recv_buffer[..len], addr))
    }

    /// Bounds the next receive wait. `None` blocks indefinitely.
    pub fn set_read_timeout(&self, dur: Option<Duration>) -> Result<(), SocketError> {
        self.socket.set_read_timeout(dur)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn loopback() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
    }

    #[test]
    fn test_bind_ephemeral() {
        let socket = UdpSocket::bind(loopback(), SocketOptions::default(), 1500).unwrap();
        assert_ne!(socket.local_addr().unwrap().port(), 0);
    }

    #[test]
    fn test_recv_timeout_maps_to_timeout() {
        let options = SocketOptions {
            read_timeout: Some(Duration::from_millis(20)),
            ..SocketOptions::default()
        };
        let mut socket = UdpSocket::bind(loopback(), options, 1500).unwrap();
        assert!(matches!(socket.recv_from(), Err(SocketError::Timeout)));
    }

    #[test]
    fn test_send_recv_roundtrip() {
        let options = SocketOptions {
            recv_buffer_size: Some(1 << 20),
            send_buffer_size: Some(1 << 20),
            read_timeout: Some(Duration::from_secs(1)),
        };
        let mut rx = UdpSocket::bind(loopback(), options, 1500).unwrap();
        let mut tx = UdpSocket::bind(loopback(), options, 1500).unwrap();
        let rx_addr = rx.local_addr().unwrap();

        tx.send_to(b"1:XXXX", rx_addr).unwrap();
        let (data, from) = rx.recv_from().unwrap();
        assert_eq!(data, b"1:XXXX");
        assert_eq!(from, tx.local_addr().unwrap());
    }

    #[test]
    fn test_set_read_timeout_shortens_wait() {
        let options = SocketOptions {
            read_timeout: Some(Duration::from_secs(5)),
            ..SocketOptions::default()
        };
        let mut socket = UdpSocket::bind(loopback(), options, 16).unwrap();
        socket
            .set_read_timeout(Some(Duration::from_millis(20)))
            .unwrap();

        let started = std::time::Instant::now();
        assert!(matches!(socket.recv_from(), Err(SocketError::Timeout)));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_short_read_truncates() {
        let options = SocketOptions {
            read_timeout: Some(Duration::from_secs(1)),
            ..SocketOptions::default()
        };
        let mut rx = UdpSocket::bind(loopback(), options, 8).unwrap();
        let mut tx = UdpSocket::bind(loopback(), options, 8).unwrap();
        let rx_addr = rx.local_addr().unwrap();

        tx.send_to(&[b'X'; 64], rx_addr).unwrap();
        let (data, _) = rx.recv_from().unwrap();
        assert_eq!(data.len(), 8);
    }

    #[test]
    fn test_bind_conflict_reports_address() {
        let first = UdpSocket::bind(loopback(), SocketOptions::default(), 16).unwrap();
        let taken = first.local_addr().unwrap();
        match UdpSocket::bind(taken, SocketOptions::default(), 16) {
            Err(SocketError::Bind { addr, .. }) => assert_eq!(addr, taken),
            other => panic!("expected bind error, got {:?}", other.map(|_| ())),
        }
    }
}
