//! # udpmeter
//!
//! UDP load-testing in two halves: `udp-sender` emits a rate-paced stream of
//! sequence-numbered datagrams, and `udp-receiver` measures what arrives.
//!
//! The receiver's statistics engine works from an unordered, lossy, possibly
//! duplicated stream and maintains loss, duplicate and reorder counts plus
//! rolling throughput, reporting once per second whether or not traffic is
//! flowing. Everything runs on a single thread using a synchronous polling
//! loop with bounded receive waits.
//!
//! ## Wire format
//!
//! ```text
//! "<decimal sequence>:" + filler, padded to the configured packet size
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use udpmeter::prelude::*;
//!
//! let shutdown = Shutdown::install().unwrap();
//! let config = ReceiverConfig::default()
//!     .with_port(9999)
//!     .with_output(OutputFormat::Table);
//! let receiver = Receiver::bind(config, std::io::stdout()).unwrap();
//! let summary = receiver.run(&shutdown).unwrap();
//! println!("lost {} of {}", summary.missing, summary.expected);
//! ```

pub mod config;
pub mod packet;
pub mod rate;
pub mod receiver;
pub mod report;
pub mod sender;
pub mod shutdown;
pub mod simulator;
pub mod socket;
pub mod stats;
pub mod tracker;
pub mod util;


pub use config::{ConfigError, ReceiverConfig, SenderConfig};
pub use packet::{decode, encode, PacketError};
pub use rate::{RateSample, RateWindow, RATE_WINDOW_CAPACITY};
pub use receiver::{Receiver, ReceiverSession};
pub use report::{OutputFormat, ReportClock, ReportState, Reporter};
pub use sender::{Pacer, Sender};
pub use shutdown::Shutdown;
pub use simulator::{NetworkSimulator, SimulationConfig, SimulationLedger};
pub use socket::{SocketError, SocketOptions, UdpSocket};
pub use stats::{
    IntervalReport, RateHistoryEntry, SenderInterval, SenderStats, SenderSummary, SessionStats,
    SessionSummary,
};
pub use tracker::{LossSnapshot, Observation, SequenceTracker};

/// Unified error type encompassing all udpmeter error variants.
#[derive(Debug)]
pub enum MeterError {
    Socket(SocketError),
    Config(ConfigError),
    Packet(PacketError),
    Io(std::io::Error),
}

impl std::fmt::Display for MeterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MeterError::Socket(e) => write!(f, "Socket error: {}", e),
            MeterError::Config(e) => write!(f, "Configuration error: {}", e),
            MeterError::Packet(e) => write!(f, "Packet error: {}", e),
            MeterError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for MeterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MeterError::Socket(e) => Some(e),
            MeterError::Config(e) => Some(e),
            MeterError::Packet(e) => Some(e),
            MeterError::Io(e) => Some(e),
        }
    }
}

impl From<SocketError> for MeterError {
    fn from(err: SocketError) -> Self {
        MeterError::Socket(err)
    }
}

impl From<ConfigError> for MeterError {
    fn from(err: ConfigError) -> Self {
        MeterError::Config(err)
    }
}

impl From<PacketError> for MeterError {
    fn from(err: PacketError) -> Self {
        MeterError::Packet(err)
    }
}

impl From<std::io::Error> for MeterError {
    fn from(err: std::io::Error) -> Self {
        MeterError::Io(err)
    }
}

/// Prelude: import everything commonly needed.
pub mod prelude {
    pub use crate::{
        LossSnapshot, MeterError, OutputFormat, RateWindow, Receiver, ReceiverConfig,
        ReceiverSession, Reporter, Sender, SenderConfig, SenderSummary, SequenceTracker,
        SessionSummary, Shutdown,
    };
}
