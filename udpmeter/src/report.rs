//! Reporting cadence and output formatting.
//!
//! [`ReportClock`] decides when a periodic report is due and guarantees the
//! final summary is emitted at most once. [`Reporter`] renders reports either
//! as a fixed-width table or as JSON lines.
use serde::Serialize;
use std::io::{self, Write};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::config::{ReceiverConfig, SenderConfig};
use crate::stats::{IntervalReport, SenderInterval, SenderSummary, SessionSummary};
use crate::util::bits_to_mbps;

/// Output style for reports written to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table and summary block.
    #[default]
    Table,
    /// One JSON object per line.
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportState {
    Running,
    Terminated,
}

/// Fixed-period report schedule, measured from the previous report rather
/// than aligned to the wall clock.
#[derive(Debug)]
pub struct ReportClock {
    interval: Duration,
    last_report: Instant,
    state: ReportState,
}

impl ReportClock {
    pub fn new(interval: Duration, start: Instant) -> Self {
        Self {
            interval,
            last_report: start,
            state: ReportState::Running,
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.state == ReportState::Running
            && now.saturating_duration_since(self.last_report) >= self.interval
    }

    pub fn mark(&mut self, now: Instant) {
        self.last_report = now;
    }

    /// Time left before the next report is due, zero once it is.
    pub fn until_due(&self, now: Instant) -> Duration {
        (self.last_report + self.interval).saturating_duration_since(now)
    }

    /// Moves to [`ReportState::Terminated`]. Returns `true` only for the
    /// transition itself.
    pub fn terminate(&mut self) -> bool {
        let was_running = self.state == ReportState::Running;
        self.state = ReportState::Terminated;
        was_running
    }

    pub fn state(&self) -> ReportState {
        self.state
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn last_report(&self) -> Instant {
        self.last_report
    }
}

#[derive(Serialize)]
struct Tagged<'a, T: Serialize> {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    time: Option<String>,
    #[serde(flatten)]
    body: &'a T,
}

/// Renders reports to a writer, normally stdout.
pub struct Reporter<W: Write> {
    out: W,
    format: OutputFormat,
}

impl Reporter<io::Stdout> {
    pub fn stdout(format: OutputFormat) -> Self {
        Self::new(io::stdout(), format)
    }
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W, format: OutputFormat) -> Self {
        Self { out, format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn json<T: Serialize>(&mut self, kind: &'static str, time: Option<String>, body: &T) -> io::Result<()> {
        let tagged = Tagged { kind, time, body };
        serde_json::to_writer(&mut self.out, &tagged)?;
        writeln!(self.out)?;
        self.out.flush()
    }

    pub fn receiver_banner(&mut self, addr: SocketAddr, config: &ReceiverConfig) -> io::Result<()> {
        if self.format == OutputFormat::Json {
            return Ok(());
        }
        writeln!(self.out, "UDP receiver listening on {}", addr)?;
        writeln!(
            self.out,
            "Reading up to {} bytes per datagram",
            config.read_buffer_size
        )?;
        writeln!(self.out, "Press Ctrl+C to stop and see final statistics")?;
        writeln!(self.out)?;
        writeln!(
            self.out,
            "Time       | Packets/s   | Mbps        | Cumulative Loss %"
        )?;
        writeln!(
            self.out,
            "-----------+-------------+-------------+------------------"
        )?;
        self.out.flush()
    }

    /// Emits one periodic line stamped with the local wall-clock time.
    pub fn interval(&mut self, report: &IntervalReport) -> io::Result<()> {
        let time = chrono::Local::now().format("%H:%M:%S").to_string();
        self.interval_at(&time, report)
    }

    pub fn interval_at(&mut self, time: &str, report: &IntervalReport) -> io::Result<()> {
        match self.format {
            OutputFormat::Table => {
                writeln!(
                    self.out,
                    "{:<10} | {:11.2} | {:11.2} | {:17.2}",
                    time,
                    report.packets_per_sec,
                    report.mbps(),
                    report.loss_percent
                )?;
                self.out.flush()
            }
            OutputFormat::Json => self.json("interval", Some(time.to_string()), report),
        }
    }

    pub fn summary(&mut self, summary: &SessionSummary) -> io::Result<()> {
        if self.format == OutputFormat::Json {
            return self.json("summary", None, summary);
        }

        let range = match (summary.min_seq, summary.max_seq) {
            (Some(min), Some(max)) => format!("{} to {}", min, max),
            _ => "n/a".to_string(),
        };

        writeln!(self.out)?;
        writeln!(self.out, "--- Final Statistics ---")?;
        writeln!(self.out, "Test duration: {:.2} seconds", summary.duration_secs)?;
        writeln!(self.out, "Total packets received: {}", summary.packets_received)?;
        writeln!(self.out, "Total bytes received: {}", summary.bytes_received)?;
        writeln!(
            self.out,
            "Average packet rate: {:.2} pps",
            summary.average_packets_per_sec
        )?;
        writeln!(
            self.out,
            "Average bit rate: {:.2} Mbps",
            bits_to_mbps(summary.average_bits_per_sec)
        )?;
        writeln!(
            self.out,
            "Rolling average (last {} intervals): {:.2} pps, {:.2} Mbps",
            summary.rate_history.len(),
            summary.rolling_packets_per_sec,
            bits_to_mbps(summary.rolling_bits_per_sec)
        )?;
        writeln!(self.out, "Sequence range: {}", range)?;
        writeln!(self.out, "Expected packets: {}", summary.expected)?;
        writeln!(self.out, "Missing packets: {}", summary.missing)?;
        writeln!(self.out, "Duplicate packets: {}", summary.duplicates)?;
        writeln!(self.out, "Out-of-order packets: {}", summary.out_of_order)?;
        writeln!(self.out, "Malformed packets: {}", summary.malformed_packets)?;
        writeln!(self.out, "Packet loss: {:.2}%", summary.loss_percent)?;

        writeln!(self.out)?;
        writeln!(
            self.out,
            "Rate history (last {} intervals):",
            summary.rate_history.len()
        )?;
        for entry in &summary.rate_history {
            writeln!(
                self.out,
                "  {:.1}s: {:.2} pps, {:.2} Mbps",
                entry.offset_secs,
                entry.packets_per_sec,
                bits_to_mbps(entry.bits_per_sec)
            )?;
        }
        self.out.flush()
    }

    pub fn sender_banner(&mut self, config: &SenderConfig) -> io::Result<()> {
        if self.format == OutputFormat::Json {
            return Ok(());
        }
        writeln!(self.out, "Sending traffic to {}", config.target_addr())?;
        let (min, max) = config.size_range();
        if min == max {
            writeln!(
                self.out,
                "Target: {} packets/sec, Packet size: {} bytes",
                config.rate, max
            )?;
        } else {
            writeln!(
                self.out,
                "Target: {} packets/sec, Packet size: {}-{} bytes (random)",
                config.rate, min, max
            )?;
        }
        writeln!(
            self.out,
            "Duration: {} seconds",
            config.duration.as_secs_f64()
        )?;
        writeln!(self.out, "Press Ctrl+C to stop the test early")?;
        self.out.flush()
    }

    pub fn sender_interval(&mut self, report: &SenderInterval) -> io::Result<()> {
        match self.format {
            OutputFormat::Table => {
                writeln!(
                    self.out,
                    "Rate: {:.2} pps, {:.2} Mbps, Total: {} packets",
                    report.packets_per_sec,
                    bits_to_mbps(report.bits_per_sec),
                    report.total_packets
                )?;
                self.out.flush()
            }
            OutputFormat::Json => self.json("interval", None, report),
        }
    }

    pub fn sender_summary(&mut self, summary: &SenderSummary) -> io::Result<()> {
        if self.format == OutputFormat::Json {
            return self.json("summary", None, summary);
        }
        if summary.interrupted {
            writeln!(self.out)?;
            writeln!(self.out, "Stopped by user")?;
        }
        writeln!(self.out)?;
        writeln!(self.out, "Test summary:")?;
        writeln!(self.out, "Duration: {:.2} seconds", summary.duration_secs)?;
        writeln!(self.out, "Packets sent: {}", summary.packets_sent)?;
        writeln!(self.out, "Bytes sent: {}", summary.bytes_sent)?;
        if summary.send_errors > 0 {
            writeln!(self.out, "Send errors: {}", summary.send_errors)?;
        }
        writeln!(
            self.out,
            "Average packet rate: {:.2} pps",
            summary.average_packets_per_sec
        )?;
        writeln!(
            self.out,
            "Average bit rate: {:.2} Mbps",
            bits_to_mbps(summary.average_bits_per_sec)
        )?;
        self.out.flush()
    }
}
