//! `udp-receiver`: measures loss, duplication, reordering and throughput of
//! an incoming `udp-sender` stream until interrupted.
use clap::Parser;
use std::net::IpAddr;
use std::process::ExitCode;

use udpmeter::config::{DEFAULT_PORT, DEFAULT_READ_BUFFER};
use udpmeter::prelude::*;

/// UDP traffic receiver and statistics engine.
#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Bytes read per datagram; longer datagrams are truncated.
    #[arg(short, long, default_value_t = DEFAULT_READ_BUFFER)]
    buffer: usize,

    /// Local address to bind.
    #[arg(long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Report format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

fn run(args: Args) -> Result<SessionSummary, MeterError> {
    let shutdown = Shutdown::install()?;
    let config = ReceiverConfig::default()
        .with_bind_ip(args.bind)
        .with_port(args.port)
        .with_read_buffer_size(args.buffer)
        .with_output(args.format);

    let receiver = Receiver::bind(config, std::io::stdout())?;
    receiver.run(&shutdown)
}

fn main() -> ExitCode {
    env_logger::init();

    match run(Args::parse()) {
        Ok(summary) => {
            log::debug!(
                "Received {} packets, {} missing",
                summary.packets_received,
                summary.missing
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{}", e);
            eprintln!("udp-receiver: {}", e);
            ExitCode::FAILURE
        }
    }
}
