//! Feeds a simulated lossy, duplicating, reordering link into a receiver
//! session and prints the resulting statistics.
//!
//! Run with: `cargo run --example impaired_link`

use std::time::{Duration, Instant};
use udpmeter::{
    packet, NetworkSimulator, OutputFormat, ReceiverConfig, ReceiverSession, Reporter,
    SimulationConfig,
};

const PACKETS: u64 = 5_000;
const RATE: u64 = 1_000;

fn main() {
    env_logger::init();

    let sim_config = SimulationConfig::default()
        .with_loss(0.02)
        .with_duplicate(0.005)
        .with_reorder(0.01)
        .with_seed(2024);
    let mut sim = NetworkSimulator::new(sim_config);

    let start = Instant::now();
    let mut session = ReceiverSession::new(
        &ReceiverConfig::default(),
        Reporter::stdout(OutputFormat::Table),
        start,
    );

    // Synthetic clock: one datagram every millisecond.
    let step = Duration::from_secs(1) / RATE as u32;
    let mut now = start;
    for seq in 0..PACKETS {
        let datagram = packet::encode(seq, 512).expect("512 bytes holds any prefix");
        for delivered in sim.transmit(datagram) {
            let _ = session.on_datagram(&delivered);
        }
        now += step;
        session.poll_report(now);
    }
    if let Some(held) = sim.flush() {
        let _ = session.on_datagram(&held);
    }

    let (summary, _) = session.finish(now);
    let ledger = sim.ledger();
    println!();
    println!("Simulator ground truth:");
    println!("  Offered:    {}", ledger.offered);
    println!("  Dropped:    {}", ledger.dropped);
    println!("  Duplicated: {}", ledger.duplicated);
    println!("  Reordered:  {}", ledger.reordered);
    println!(
        "Receiver saw {} missing, {} duplicates, {} out of order",
        summary.missing, summary.duplicates, summary.out_of_order
    );
}
