//! `udp-sender`: emits a rate-paced stream of sequence-numbered datagrams.
use clap::Parser;
use std::net::IpAddr;
use std::process::ExitCode;
use std::time::Duration;

use udpmeter::config::{DEFAULT_DURATION, DEFAULT_PACKET_SIZE, DEFAULT_PORT, DEFAULT_RATE};
use udpmeter::prelude::*;

/// UDP load generator.
#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// Receiver IP address.
    target: IpAddr,

    /// Destination port.
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Packet size in bytes, including the sequence prefix. Must hold the
    /// largest sequence number the run reaches (rate times duration).
    #[arg(short, long, default_value_t = DEFAULT_PACKET_SIZE)]
    size: usize,

    /// Target packets per second.
    #[arg(short, long, default_value_t = DEFAULT_RATE)]
    rate: u32,

    /// Test duration in seconds.
    #[arg(short, long, default_value_t = DEFAULT_DURATION.as_secs())]
    duration: u64,

    /// Draw each packet's size uniformly from 64 bytes up to --size.
    #[arg(long)]
    random: bool,

    /// Report format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

fn run(args: Args) -> Result<SenderSummary, MeterError> {
    let shutdown = Shutdown::install()?;
    let config = SenderConfig::new(args.target)
        .with_port(args.port)
        .with_packet_size(args.size)
        .with_rate(args.rate)
        .with_duration(Duration::from_secs(args.duration))
        .with_random_size(args.random)
        .with_output(args.format);

    let sender = Sender::bind(config, std::io::stdout())?;
    sender.run(&shutdown)
}

fn main() -> ExitCode {
    env_logger::init();

    match run(Args::parse()) {
        Ok(summary) => {
            log::debug!(
                "Sent {} packets ({} errors)",
                summary.packets_sent,
                summary.send_errors
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{}", e);
            eprintln!("udp-sender: {}", e);
            ExitCode::FAILURE
        }
    }
}
