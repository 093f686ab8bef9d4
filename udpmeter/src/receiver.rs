//! Receive loop and periodic reporting for `udp-receiver`.
//!
//! [`ReceiverSession`] holds all session state and is driven with explicit
//! instants, independent of any socket. [`Receiver`] owns the socket and
//! alternates bounded-wait receives with report checks on a single thread.
use std::io::Write;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::config::ReceiverConfig;
use crate::packet::PacketError;
use crate::report::{ReportClock, Reporter};
use crate::shutdown::Shutdown;
use crate::socket::{SocketError, UdpSocket};
use crate::stats::{IntervalReport, SessionStats, SessionSummary};
use crate::MeterError;

/// Shortest receive wait, so an overdue report never turns into a busy poll.
const MIN_RECV_WAIT: Duration = Duration::from_millis(1);
/// Pause after a receive error other than a timeout.
const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// Receive wait for the next pass: the configured timeout, cut short so the
/// next report is not delayed, rounded up to whole milliseconds.
fn recv_wait(read_timeout: Duration, until_report: Duration) -> Duration {
    let wait = read_timeout.min(until_report);
    let millis = wait.as_micros().div_ceil(1000);
    Duration::from_millis(u64::try_from(millis).unwrap_or(u64::MAX)).max(MIN_RECV_WAIT)
}

/// Counts consecutive receive failures so a persistent error is logged at
/// exponentially spaced attempts rather than on every pass.
#[derive(Debug, Default)]
struct ErrorBackoff {
    consecutive: u64,
}

impl ErrorBackoff {
    /// Records a failure. Returns `true` when this one should be logged.
    fn on_error(&mut self) -> bool {
        self.consecutive += 1;
        self.consecutive.is_power_of_two()
    }

    /// Clears the streak, returning its length.
    fn reset(&mut self) -> u64 {
        std::mem::take(&mut self.consecutive)
    }
}

/// Statistics and reporting state for one receiver run.
pub struct ReceiverSession<W: Write> {
    stats: SessionStats,
    clock: ReportClock,
    reporter: Reporter<W>,
}

impl<W: Write> ReceiverSession<W> {
    pub fn new(config: &ReceiverConfig, reporter: Reporter<W>, start: Instant) -> Self {
        Self {
            stats: SessionStats::new(start),
            clock: ReportClock::new(config.report_interval, start),
            reporter,
        }
    }

    /// Accounts one datagram. Undecodable datagrams still count toward the
    /// raw totals.
    pub fn on_datagram(&mut self, data: &[u8]) -> Result<u64, PacketError> {
        let result = self.stats.record_datagram(data);
        if let Err(e) = &result {
            log::trace!("Skipping sequence analysis for {}-byte datagram: {}", data.len(), e);
        }
        result
    }

    /// Emits an interval report if one is due at `now`.
    pub fn poll_report(&mut self, now: Instant) -> Option<IntervalReport> {
        if !self.clock.is_due(now) {
            return None;
        }
        let report = self.stats.interval(now);
        self.clock.mark(now);
        if let Err(e) = self.reporter.interval(&report) {
            log::warn!("Failed to write interval report: {}", e);
        }
        Some(report)
    }

    /// Time left before the next periodic report is due.
    pub fn until_next_report(&self, now: Instant) -> Duration {
        self.clock.until_due(now)
    }

    /// Ends the session and emits the final summary.
    pub fn finish(mut self, now: Instant) -> (SessionSummary, Reporter<W>) {
        self.clock.terminate();
        let summary = self.stats.summary(now);
        if let Err(e) = self.reporter.summary(&summary) {
            log::warn!("Failed to write final summary: {}", e);
        }
        (summary, self.reporter)
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn reporter_mut(&mut self) -> &mut Reporter<W> {
        &mut self.reporter
    }
}

/// Socket-driven receiver. Consumed by [`Receiver::run`], which releases the
/// socket on return.
pub struct Receiver<W: Write> {
    socket: UdpSocket,
    config: ReceiverConfig,
    session: ReceiverSession<W>,
}

impl<W: Write> Receiver<W> {
    /// Binds the listening socket. Reports go to `out` in `config.output`
    /// format. Failure here is fatal to the run.
    pub fn bind(config: ReceiverConfig, out: W) -> Result<Self, MeterError> {
        config.validate()?;
        let socket = UdpSocket::bind(
            config.bind_addr(),
            config.socket_options(),
            config.read_buffer_size,
        )?;
        log::info!("Listening on {}", socket.local_addr()?);

        let reporter = Reporter::new(out, config.output);
        let session = ReceiverSession::new(&config, reporter, Instant::now());
        Ok(Self {
            socket,
            config,
            session,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, SocketError> {
        self.socket.local_addr()
    }

    /// Receives until `shutdown` is requested, then emits the final summary.
    pub fn run(self, shutdown: &Shutdown) -> Result<SessionSummary, MeterError> {
        self.run_with_output(shutdown).map(|(summary, _)| summary)
    }

    /// Like [`Receiver::run`], also handing back the reporter's writer.
    pub fn run_with_output(mut self, shutdown: &Shutdown) -> Result<(SessionSummary, W), MeterError> {
        let local_addr = self.socket.local_addr()?;
        if let Err(e) = self
            .session
            .reporter_mut()
            .receiver_banner(local_addr, &self.config)
        {
            log::warn!("Failed to write banner: {}", e);
        }

        let mut applied_wait = self.config.read_timeout;
        let mut backoff = ErrorBackoff::default();

        while !shutdown.is_requested() {
            let wait = recv_wait(
                self.config.read_timeout,
                self.session.until_next_report(Instant::now()),
            );
            if wait != applied_wait {
                self.socket.set_read_timeout(Some(wait))?;
                applied_wait = wait;
            }

            match self.socket.recv_from() {
                Ok((data, _addr)) => {
                    // Result already logged; malformed datagrams only count toward totals.
                    let _ = self.session.on_datagram(data);
                    let streak = backoff.reset();
                    if streak > 0 {
                        log::info!("Receive recovered after {} failures", streak);
                    }
                }
                Err(SocketError::Timeout) => {}
                Err(e) => {
                    if backoff.on_error() {
                        log::warn!("Receive failed ({} in a row): {}", backoff.consecutive, e);
                    }
                    std::thread::sleep(RECV_ERROR_BACKOFF);
                }
            }
            self.session.poll_report(Instant::now());
        }

        log::info!("Shutdown requested, writing final summary");
        let (summary, reporter) = self.session.finish(Instant::now());
        Ok((summary, reporter.into_inner()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet;
    use crate::report::OutputFormat;

    fn session(start: Instant) -> ReceiverSession<Vec<u8>> {
        ReceiverSession::new(
            &ReceiverConfig::default(),
            Reporter::new(Vec::new(), OutputFormat::Table),
            start,
        )
    }

    #[test]
    fn test_malformed_datagram_counted() {
        let mut session = session(Instant::now());
        assert_eq!(
            session.on_datagram(b"garbage"),
            Err(PacketError::MissingDelimiter)
        );
        assert_eq!(session.stats().packets_received(), 1);
        assert_eq!(session.stats().bytes_received(), 7);
        assert_eq!(session.stats().snapshot().received, 0);
    }

    #[test]
    fn test_poll_report_cadence() {
        let start = Instant::now();
        let mut session = session(start);
        session.on_datagram(&packet::encode(0, 32).unwrap()).unwrap();

        assert!(session.poll_report(start + Duration::from_millis(500)).is_none());
        let report = session.poll_report(start + Duration::from_secs(1)).unwrap();
        assert_eq!(report.packets, 1);
        assert!(session.poll_report(start + Duration::from_millis(1500)).is_none());

        // A silent interval still produces a report.
        let report = session.poll_report(start + Duration::from_secs(2)).unwrap();
        assert_eq!(report.packets, 0);
        assert_eq!(report.packets_per_sec, 0.0);
    }

    #[test]
    fn test_recv_wait_capped_by_next_report() {
        let timeout = Duration::from_secs(1);
        assert_eq!(recv_wait(timeout, Duration::from_secs(5)), timeout);
        assert_eq!(
            recv_wait(timeout, Duration::from_millis(250)),
            Duration::from_millis(250)
        );
        assert_eq!(
            recv_wait(timeout, Duration::from_micros(1500)),
            Duration::from_millis(2)
        );
        assert_eq!(recv_wait(timeout, Duration::ZERO), MIN_RECV_WAIT);
    }

    #[test]
    fn test_until_next_report_tracks_clock() {
        let start = Instant::now();
        let mut session = session(start);
        assert_eq!(
            session.until_next_report(start + Duration::from_millis(990)),
            Duration::from_millis(10)
        );
        session.poll_report(start + Duration::from_secs(1)).unwrap();
        assert_eq!(
            session.until_next_report(start + Duration::from_secs(1)),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn test_error_backoff_logs_sparsely() {
        let mut backoff = ErrorBackoff::default();
        let logged: Vec<u64> = (1..=20u64).filter(|_| backoff.on_error()).collect();
        assert_eq!(logged, vec![1, 2, 4, 8, 16]);
        assert_eq!(backoff.reset(), 20);
        assert!(backoff.on_error());
    }

    #[test]
    fn test_finish_emits_single_summary() {
        let start = Instant::now();
        let mut session = session(start);
        for seq in [0u64, 1, 2, 1, 4] {
            session.on_datagram(&packet::encode(seq, 64).unwrap()).unwrap();
        }
        let (summary, reporter) = session.finish(start + Duration::from_secs(1));
        assert_eq!(summary.packets_received, 5);
        assert_eq!(summary.missing, 1);

        let text = String::from_utf8(reporter.into_inner()).unwrap();
        assert_eq!(text.matches("--- Final Statistics ---").count(), 1);
        assert!(text.contains("Packet loss: 20.00%"));
    }
}
