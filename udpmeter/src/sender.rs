//! Rate-paced sequenced packet emitter for `udp-sender`.
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::Write;
use std::time::{Duration, Instant};

use crate::config::SenderConfig;
use crate::packet;
use crate::report::{ReportClock, Reporter};
use crate::shutdown::Shutdown;
use crate::socket::UdpSocket;
use crate::stats::{SenderStats, SenderSummary};
use crate::MeterError;

/// How far the pacing schedule may fall behind before it is re-anchored.
const MAX_SCHEDULE_LAG: Duration = Duration::from_secs(1);

/// Deadline schedule for evenly spaced sends.
#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    next: Instant,
}

impl Pacer {
    pub fn new(interval: Duration, start: Instant) -> Self {
        Self {
            interval,
            next: start,
        }
    }

    /// Advances the schedule by one send and returns how long to wait
    /// before the next one, if at all.
    pub fn advance(&mut self, now: Instant) -> Option<Duration> {
        self.next += self.interval;
        if self.next > now {
            return Some(self.next - now);
        }
        if now - self.next > MAX_SCHEDULE_LAG {
            log::debug!("Sender fell behind schedule, re-anchoring");
            self.next = now;
        }
        None
    }
}

/// Owns the sending socket and the run's counters.
pub struct Sender<W: Write> {
    socket: UdpSocket,
    config: SenderConfig,
    reporter: Reporter<W>,
    rng: StdRng,
}

impl<W: Write> Sender<W> {
    /// Binds the sending socket. Reports go to `out` in `config.output` format.
    pub fn bind(config: SenderConfig, out: W) -> Result<Self, MeterError> {
        config.validate()?;
        let socket = UdpSocket::bind(config.local_addr(), config.socket_options(), 1)?;
        log::info!(
            "Sending from {} to {}",
            socket.local_addr()?,
            config.target_addr()
        );
        Ok(Self {
            socket,
            reporter: Reporter::new(out, config.output),
            config,
            rng: StdRng::from_entropy(),
        })
    }

    /// Replaces the packet-size RNG, making random sizes reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    fn next_size(&mut self) -> usize {
        let (min, max) = self.config.size_range();
        if min == max {
            max
        } else {
            self.rng.gen_range(min..=max)
        }
    }

    /// Sends until the configured duration elapses or `shutdown` is
    /// requested, then emits the summary.
    pub fn run(self, shutdown: &Shutdown) -> Result<SenderSummary, MeterError> {
        self.run_with_output(shutdown).map(|(summary, _)| summary)
    }

    pub fn run_with_output(mut self, shutdown: &Shutdown) -> Result<(SenderSummary, W), MeterError> {
        if let Err(e) = self.reporter.sender_banner(&self.config) {
            log::warn!("Failed to write banner: {}", e);
        }

        let target = self.config.target_addr();
        let start = Instant::now();
        let end = start + self.config.duration;
        let mut stats = SenderStats::new(start);
        let mut clock = ReportClock::new(self.config.report_interval, start);
        let mut pacer = Pacer::new(self.config.send_interval(), start);
        let mut buf = Vec::with_capacity(self.config.packet_size);
        let mut sequence: u64 = 0;

        while !shutdown.is_requested() && Instant::now() < end {
            let size = self.next_size();
            if let Err(e) = packet::encode_into(&mut buf, sequence, size) {
                log::warn!("Stopping at sequence {}: {}", sequence, e);
                break;
            }

            match self.socket.send_to(&buf, target) {
                Ok(_) => stats.record_sent(buf.len()),
                Err(e) => {
                    stats.record_error();
                    log::warn!("Send of sequence {} failed: {}", sequence, e);
                }
            }
            sequence += 1;

            let now = Instant::now();
            if clock.is_due(now) {
                let report = stats.interval(now);
                clock.mark(now);
                if let Err(e) = self.reporter.sender_interval(&report) {
                    log::warn!("Failed to write interval report: {}", e);
                }
            }

            if let Some(wait) = pacer.advance(now) {
                std::thread::sleep(wait.min(end.saturating_duration_since(now)));
            }
        }

        clock.terminate();
        let summary = stats.summary(Instant::now(), shutdown.is_requested());
        if let Err(e) = self.reporter.sender_summary(&summary) {
            log::warn!("Failed to write summary: {}", e);
        }
        Ok((summary, self.reporter.into_inner()))
    }
}
