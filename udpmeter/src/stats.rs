// stats.rs - Session accumulators and the report records built from them
use serde::Serialize;
use std::time::{Duration, Instant};

use crate::packet::{self, PacketError};
use crate::rate::{RateSample, RateWindow};
use crate::tracker::{LossSnapshot, SequenceTracker};
use crate::util;

/// One periodic receiver report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntervalReport {
    /// Seconds since the session started.
    pub elapsed_secs: f64,
    pub packets: u64,
    pub bytes: u64,
    pub packets_per_sec: f64,
    pub bits_per_sec: f64,
    pub loss_percent: f64,
}

impl IntervalReport {
    pub fn mbps(&self) -> f64 {
        util::bits_to_mbps(self.bits_per_sec)
    }
}

/// One entry of the rate history printed in the final summary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RateHistoryEntry {
    pub offset_secs: f64,
    pub packets_per_sec: f64,
    pub bits_per_sec: f64,
}

impl From<&RateSample> for RateHistoryEntry {
    fn from(sample: &RateSample) -> Self {
        Self {
            offset_secs: sample.offset.as_secs_f64(),
            packets_per_sec: sample.packets_per_sec,
            bits_per_sec: sample.bits_per_sec,
        }
    }
}

/// Final statistics for a receiver run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub duration_secs: f64,
    pub packets_received: u64,
    pub bytes_received: u64,
    pub malformed_packets: u64,
    pub average_packets_per_sec: f64,
    pub average_bits_per_sec: f64,
    pub rolling_packets_per_sec: f64,
    pub rolling_bits_per_sec: f64,
    pub min_seq: Option<u64>,
    pub max_seq: Option<u64>,
    pub expected: u64,
    pub received: u64,
    pub missing: u64,
    pub duplicates: u64,
    pub out_of_order: u64,
    pub loss_percent: f64,
    pub rate_history: Vec<RateHistoryEntry>,
}

/// Accumulator for one receiver run. Owned by the receive loop; reports read
/// it between datagrams, so every report reflects all packets before it.
#[derive(Debug)]
pub struct SessionStats {
    packets_received: u64,
    bytes_received: u64,
    malformed_packets: u64,
    tracker: SequenceTracker,
    rates: RateWindow,
    start_time: Instant,
    last_report_time: Instant,
    last_packets: u64,
    last_bytes: u64,
}

impl SessionStats {
    pub fn new(start_time: Instant) -> Self {
        Self {
            packets_received: 0,
            bytes_received: 0,
            malformed_packets: 0,
            tracker: SequenceTracker::new(),
            rates: RateWindow::new(),
            start_time,
            last_report_time: start_time,
            last_packets: 0,
            last_bytes: 0,
        }
    }

    /// Counts a datagram and feeds its sequence number to the tracker.
    ///
    /// Datagrams that fail to decode still count toward the raw totals.
    pub fn record_datagram(&mut self, data: &[u8]) -> Result<u64, PacketError> {
        self.packets_received += 1;
        self.bytes_received += data.len() as u64;

        match packet::decode(data) {
            Ok(sequence) => {
                let obs = self.tracker.observe(sequence);
                if obs.duplicate {
                    log::trace!("Duplicate sequence {}", sequence);
                }
                Ok(sequence)
            }
            Err(e) => {
                self.malformed_packets += 1;
                Err(e)
            }
        }
    }

    /// Closes the current interval at `now`, ticking the rate window.
    pub fn interval(&mut self, now: Instant) -> IntervalReport {
        let delta = now.saturating_duration_since(self.last_report_time);
        let packets = self.packets_received - self.last_packets;
        let bytes = self.bytes_received - self.last_bytes;
        let (packets_per_sec, bits_per_sec) =
            self.rates.tick(packets, bytes, delta.as_secs_f64());

        self.last_report_time = now;
        self.last_packets = self.packets_received;
        self.last_bytes = self.bytes_received;

        IntervalReport {
            elapsed_secs: self.elapsed(now).as_secs_f64(),
            packets,
            bytes,
            packets_per_sec,
            bits_per_sec,
            loss_percent: self.tracker.loss_percent(),
        }
    }

    /// Builds the final summary, closing the last partial interval first.
    pub fn summary(&mut self, now: Instant) -> SessionSummary {
        self.interval(now);

        let duration = self.elapsed(now);
        let snap = self.tracker.snapshot();
        let (rolling_pps, rolling_bps) = self.rates.average();

        SessionSummary {
            duration_secs: duration.as_secs_f64(),
            packets_received: self.packets_received,
            bytes_received: self.bytes_received,
            malformed_packets: self.malformed_packets,
            average_packets_per_sec: util::per_second(self.packets_received as f64, duration),
            average_bits_per_sec: util::per_second(
                util::bytes_to_bits(self.bytes_received),
                duration,
            ),
            rolling_packets_per_sec: rolling_pps,
            rolling_bits_per_sec: rolling_bps,
            min_seq: snap.min_seq,
            max_seq: snap.max_seq,
            expected: snap.expected,
            received: snap.received,
            missing: snap.missing,
            duplicates: snap.duplicates,
            out_of_order: snap.out_of_order,
            loss_percent: snap.loss_percent,
            rate_history: self.rates.samples().iter().map(RateHistoryEntry::from).collect(),
        }
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.start_time)
    }

    pub fn packets_received(&self) -> u64 {
        self.packets_received
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    pub fn malformed_packets(&self) -> u64 {
        self.malformed_packets
    }

    pub fn snapshot(&self) -> LossSnapshot {
        self.tracker.snapshot()
    }

    pub fn tracker(&self) -> &SequenceTracker {
        &self.tracker
    }

    pub fn rates(&self) -> &RateWindow {
        &self.rates
    }

    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    pub fn last_report_time(&self) -> Instant {
        self.last_report_time
    }
}

/// One periodic sender report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SenderInterval {
    pub elapsed_secs: f64,
    pub packets_per_sec: f64,
    pub bits_per_sec: f64,
    pub total_packets: u64,
}

/// Final statistics for a sender run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SenderSummary {
    pub duration_secs: f64,
    pub packets_sent: u64,
    pub bytes_sent: u64,
    pub send_errors: u64,
    pub average_packets_per_sec: f64,
    pub average_bits_per_sec: f64,
    pub interrupted: bool,
}

/// Counters for one sender run.
#[derive(Debug)]
pub struct SenderStats {
    packets_sent: u64,
    bytes_sent: u64,
    send_errors: u64,
    start_time: Instant,
    last_report_time: Instant,
    last_packets: u64,
    last_bytes: u64,
}

impl SenderStats {
    pub fn new(start_time: Instant) -> Self {
        Self {
            packets_sent: 0,
            bytes_sent: 0,
            send_errors: 0,
            start_time,
            last_report_time: start_time,
            last_packets: 0,
            last_bytes: 0,
        }
    }

    pub fn record_sent(&mut self, bytes: usize) {
        self.packets_sent += 1;
        self.bytes_sent += bytes as u64;
    }

    pub fn record_error(&mut self) {
        self.send_errors += 1;
    }

    pub fn interval(&mut self, now: Instant) -> SenderInterval {
        let delta = now.saturating_duration_since(self.last_report_time);
        let packets = (self.packets_sent - self.last_packets) as f64;
        let bits = util::bytes_to_bits(self.bytes_sent - self.last_bytes);

        self.last_report_time = now;
        self.last_packets = self.packets_sent;
        self.last_bytes = self.bytes_sent;

        SenderInterval {
            elapsed_secs: now.saturating_duration_since(self.start_time).as_secs_f64(),
            packets_per_sec: util::per_second(packets, delta),
            bits_per_sec: util::per_second(bits, delta),
            total_packets: self.packets_sent,
        }
    }

    pub fn summary(&self, now: Instant, interrupted: bool) -> SenderSummary {
        let duration = now.saturating_duration_since(self.start_time);
        SenderSummary {
            duration_secs: duration.as_secs_f64(),
            packets_sent: self.packets_sent,
            bytes_sent: self.bytes_sent,
            send_errors: self.send_errors,
            average_packets_per_sec: util::per_second(self.packets_sent as f64, duration),
            average_bits_per_sec: util::per_second(util::bytes_to_bits(self.bytes_sent), duration),
            interrupted,
        }
    }

    pub fn packets_sent(&self) -> u64 {
        self.packets_sent
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    pub fn send_errors(&self) -> u64 {
        self.send_errors
    }

    pub fn last_report_time(&self) -> Instant {
        self.last_report_time
    }
}
