// config.rs - Receiver and sender configuration with validation
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::packet::{self, MAX_DATAGRAM_SIZE};
use crate::report::OutputFormat;
use crate::socket::{SocketOptions, MAX_UDP_PACKET_SIZE};

pub const DEFAULT_PORT: u16 = 9999;
pub const DEFAULT_PACKET_SIZE: usize = 1400;
pub const DEFAULT_RATE: u32 = 1000;
pub const DEFAULT_DURATION: Duration = Duration::from_secs(60);
pub const DEFAULT_READ_BUFFER: usize = 4096;
/// Kernel socket buffer requested on both ends (8 MiB).
pub const DEFAULT_SOCKET_BUFFER: usize = 8 * 1024 * 1024;
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(1);
/// Lower bound for per-packet random sizes.
pub const MIN_RANDOM_PACKET_SIZE: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    InvalidPort,
    PacketSizeTooSmall { size: usize, required: usize },
    PacketSizeTooLarge(usize),
    ZeroRate,
    ZeroDuration,
    ReadBufferOutOfRange(usize),
    ZeroReadTimeout,
    ZeroReportInterval,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "Destination port must be non-zero"),
            ConfigError::PacketSizeTooSmall { size, required } => write!(
                f,
                "Packet size {} cannot hold the sequence prefix; this run needs at least {} bytes",
                size, required
            ),
            ConfigError::PacketSizeTooLarge(size) => write!(
                f,
                "Packet size {} exceeds the {}-byte UDP payload limit",
                size, MAX_DATAGRAM_SIZE
            ),
            ConfigError::ZeroRate => write!(f, "Packet rate must be at least 1 pps"),
            ConfigError::ZeroDuration => write!(f, "Duration must be greater than zero"),
            ConfigError::ReadBufferOutOfRange(size) => write!(
                f,
                "Receive buffer {} outside 1..={}",
                size, MAX_UDP_PACKET_SIZE
            ),
            ConfigError::ZeroReadTimeout => write!(f, "Read timeout must be greater than zero"),
            ConfigError::ZeroReportInterval => {
                write!(f, "Report interval must be greater than zero")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Settings for `udp-receiver`.
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    pub bind_ip: IpAddr,
    pub port: u16,
    /// Bytes read per datagram; longer datagrams are truncated.
    pub read_buffer_size: usize,
    /// Requested `SO_RCVBUF`.
    pub socket_buffer_size: usize,
    /// Upper bound on a single receive wait, which keeps reports flowing when idle.
    pub read_timeout: Duration,
    pub report_interval: Duration,
    pub output: OutputFormat,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            read_buffer_size: DEFAULT_READ_BUFFER,
            socket_buffer_size: DEFAULT_SOCKET_BUFFER,
            read_timeout: DEFAULT_READ_TIMEOUT,
            report_interval: DEFAULT_REPORT_INTERVAL,
            output: OutputFormat::Table,
        }
    }
}

impl ReceiverConfig {
    pub fn with_bind_ip(mut self, ip: IpAddr) -> Self {
        self.bind_ip = ip;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    pub fn with_socket_buffer_size(mut self, size: usize) -> Self {
        self.socket_buffer_size = size;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    pub fn with_output(mut self, output: OutputFormat) -> Self {
        self.output = output;
        self
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    pub fn socket_options(&self) -> SocketOptions {
        SocketOptions {
            recv_buffer_size: Some(self.socket_buffer_size),
            send_buffer_size: None,
            read_timeout: Some(self.read_timeout),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.read_buffer_size == 0 || self.read_buffer_size > MAX_UDP_PACKET_SIZE {
            return Err(ConfigError::ReadBufferOutOfRange(self.read_buffer_size));
        }
        if self.read_timeout.is_zero() {
            return Err(ConfigError::ZeroReadTimeout);
        }
        if self.report_interval.is_zero() {
            return Err(ConfigError::ZeroReportInterval);
        }
        Ok(())
    }
}

/// Settings for `udp-sender`.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    pub target: IpAddr,
    pub port: u16,
    pub packet_size: usize,
    /// Target packets per second.
    pub rate: u32,
    pub duration: Duration,
    /// Draw each packet's size uniformly from `[64, packet_size]`.
    pub random_size: bool,
    /// Requested `SO_SNDBUF`.
    pub socket_buffer_size: usize,
    pub report_interval: Duration,
    pub output: OutputFormat,
}

impl SenderConfig {
    pub fn new(target: IpAddr) -> Self {
        Self {
            target,
            port: DEFAULT_PORT,
            packet_size: DEFAULT_PACKET_SIZE,
            rate: DEFAULT_RATE,
            duration: DEFAULT_DURATION,
            random_size: false,
            socket_buffer_size: DEFAULT_SOCKET_BUFFER,
            report_interval: DEFAULT_REPORT_INTERVAL,
            output: OutputFormat::Table,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_packet_size(mut self, size: usize) -> Self {
        self.packet_size = size;
        self
    }

    pub fn with_rate(mut self, rate: u32) -> Self {
        self.rate = rate;
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_random_size(mut self, random: bool) -> Self {
        self.random_size = random;
        self
    }

    pub fn with_socket_buffer_size(mut self, size: usize) -> Self {
        self.socket_buffer_size = size;
        self
    }

    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    pub fn with_output(mut self, output: OutputFormat) -> Self {
        self.output = output;
        self
    }

    pub fn target_addr(&self) -> SocketAddr {
        SocketAddr::new(self.target, self.port)
    }

    /// Local wildcard address in the target's address family.
    pub fn local_addr(&self) -> SocketAddr {
        let ip = match self.target {
            IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            IpAddr::V6(_) => IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED),
        };
        SocketAddr::new(ip, 0)
    }

    pub fn socket_options(&self) -> SocketOptions {
        SocketOptions {
            recv_buffer_size: None,
            send_buffer_size: Some(self.socket_buffer_size),
            read_timeout: None,
        }
    }

    /// Time between packets at the configured rate.
    pub fn send_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.rate.max(1)))
    }

    /// Upper bound on the sequence numbers this run can send. Pacing never
    /// runs ahead of the schedule, so at most `rate * duration` packets go out.
    pub fn max_sequence(&self) -> u64 {
        // Float-to-int casts saturate.
        (f64::from(self.rate) * self.duration.as_secs_f64()).ceil() as u64
    }

    /// Smallest packet that holds the prefix of every sequence this run sends.
    pub fn min_packet_size(&self) -> usize {
        packet::prefix_len(self.max_sequence())
    }

    /// Inclusive range packet sizes are drawn from.
    pub fn size_range(&self) -> (usize, usize) {
        if self.random_size {
            let min = MIN_RANDOM_PACKET_SIZE.max(self.min_packet_size());
            (min.min(self.packet_size), self.packet_size)
        } else {
            (self.packet_size, self.packet_size)
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if self.packet_size > MAX_DATAGRAM_SIZE {
            return Err(ConfigError::PacketSizeTooLarge(self.packet_size));
        }
        let required = self.min_packet_size();
        if self.packet_size < required {
            return Err(ConfigError::PacketSizeTooSmall {
                size: self.packet_size,
                required,
            });
        }
        if self.rate == 0 {
            return Err(ConfigError::ZeroRate);
        }
        if self.duration.is_zero() {
            return Err(ConfigError::ZeroDuration);
        }
        if self.report_interval.is_zero() {
            return Err(ConfigError::ZeroReportInterval);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receiver_defaults() {
        let config = ReceiverConfig::default();
        assert_eq!(config.port, 9999);
        assert_eq!(config.read_buffer_size, 4096);
        assert_eq!(config.socket_buffer_size, 8 * 1024 * 1024);
        assert_eq!(config.read_timeout, Duration::from_secs(1));
        assert_eq!(config.bind_addr().to_string(), "0.0.0.0:9999");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_receiver_validation() {
        let config = ReceiverConfig::default().with_read_buffer_size(0);
        assert_eq!(config.validate(), Err(ConfigError::ReadBufferOutOfRange(0)));

        let config = ReceiverConfig::default().with_read_timeout(Duration::ZERO);
        assert_eq!(config.validate(), Err(ConfigError::ZeroReadTimeout));

        let config = ReceiverConfig::default().with_report_interval(Duration::ZERO);
        assert_eq!(config.validate(), Err(ConfigError::ZeroReportInterval));
    }

    #[test]
    fn test_sender_defaults() {
        let config = SenderConfig::new(IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.port, 9999);
        assert_eq!(config.packet_size, 1400);
        assert_eq!(config.rate, 1000);
        assert_eq!(config.duration, Duration::from_secs(60));
        assert!(!config.random_size);
        assert_eq!(config.send_interval(), Duration::from_millis(1));
        assert_eq!(config.target_addr().to_string(), "127.0.0.1:9999");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sender_validation() {
        let base = SenderConfig::new(IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(
            base.clone().with_port(0).validate(),
            Err(ConfigError::InvalidPort)
        );
        assert_eq!(
            base.clone().with_packet_size(5).validate(),
            Err(ConfigError::PacketSizeTooSmall {
                size: 5,
                required: 6
            })
        );
        assert_eq!(
            base.clone().with_packet_size(65_508).validate(),
            Err(ConfigError::PacketSizeTooLarge(65_508))
        );
        assert_eq!(base.clone().with_rate(0).validate(), Err(ConfigError::ZeroRate));
        assert_eq!(
            base.with_duration(Duration::ZERO).validate(),
            Err(ConfigError::ZeroDuration)
        );
    }

    #[test]
    fn test_small_packets_accepted_for_short_runs() {
        let base = SenderConfig::new(IpAddr::V4(Ipv4Addr::LOCALHOST));
        // 1000 pps for 60 s tops out at sequence 60000: "60000:" is 6 bytes.
        assert_eq!(base.max_sequence(), 60_000);
        assert_eq!(base.min_packet_size(), 6);
        assert!(base.clone().with_packet_size(16).validate().is_ok());
        assert!(base.clone().with_packet_size(6).validate().is_ok());

        let long_run = base
            .with_rate(1_000_000)
            .with_duration(Duration::from_secs(3600));
        assert_eq!(long_run.min_packet_size(), 11);
        assert_eq!(
            long_run.with_packet_size(10).validate(),
            Err(ConfigError::PacketSizeTooSmall {
                size: 10,
                required: 11
            })
        );
    }

    #[test]
    fn test_size_range() {
        let config = SenderConfig::new(IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.size_range(), (1400, 1400));
        assert_eq!(config.clone().with_random_size(true).size_range(), (64, 1400));
        assert_eq!(
            config.with_packet_size(32).with_random_size(true).size_range(),
            (32, 32)
        );
    }

    #[test]
    fn test_local_addr_matches_family() {
        let v6 = SenderConfig::new("::1".parse().unwrap());
        assert!(v6.local_addr().is_ipv6());
        let v4 = SenderConfig::new(IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert!(v4.local_addr().is_ipv4());
    }
}
