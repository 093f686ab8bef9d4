// rate.rs - Rolling window of per-interval throughput samples
use smallvec::SmallVec;
use std::time::Duration;

/// Number of interval samples retained for smoothed reporting.
pub const RATE_WINDOW_CAPACITY: usize = 10;

/// Throughput measured over one reporting interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateSample {
    /// Time since the first tick's interval began, at the end of this interval.
    pub offset: Duration,
    pub packets_per_sec: f64,
    pub bits_per_sec: f64,
}

/// Bounded FIFO of the most recent interval rates. Never used for loss math.
#[derive(Debug, Default)]
pub struct RateWindow {
    samples: SmallVec<[RateSample; RATE_WINDOW_CAPACITY]>,
    elapsed: Duration,
}

impl RateWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes the rate over an interval and appends it to the window,
    /// evicting the oldest sample once the window is full.
    ///
    /// Returns `(packets_per_sec, bits_per_sec)`. A non-positive interval
    /// yields `(0.0, 0.0)` and records nothing.
    pub fn tick(&mut self, delta_packets: u64, delta_bytes: u64, delta_seconds: f64) -> (f64, f64) {
        if !delta_seconds.is_finite() || delta_seconds <= 0.0 {
            return (0.0, 0.0);
        }

        let packets_per_sec = delta_packets as f64 / delta_seconds;
        let bits_per_sec = crate::util::bytes_to_bits(delta_bytes) / delta_seconds;
        self.elapsed += Duration::from_secs_f64(delta_seconds);

        if self.samples.len() == RATE_WINDOW_CAPACITY {
            self.samples.remove(0);
        }
        self.samples.push(RateSample {
            offset: self.elapsed,
            packets_per_sec,
            bits_per_sec,
        });

        (packets_per_sec, bits_per_sec)
    }

    /// Mean `(packets_per_sec, bits_per_sec)` over the held samples.
    pub fn average(&self) -> (f64, f64) {
        if self.samples.is_empty() {
            return (0.0, 0.0);
        }
        let n = self.samples.len() as f64;
        let (pps, bps) = self
            .samples
            .iter()
            .fold((0.0, 0.0), |(p, b), s| (p + s.packets_per_sec, b + s.bits_per_sec));
        (pps / n, bps / n)
    }

    /// Samples from oldest to newest.
    pub fn samples(&self) -> &[RateSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_tick_one_second() {
        let mut window = RateWindow::new();
        let (pps, bps) = window.tick(100, 800_000, 1.0);
        assert_eq!(pps, 100.0);
        assert_eq!(bps, 6_400_000.0);
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn test_tick_half_second_scales_up() {
        let mut window = RateWindow::new();
        let (pps, bps) = window.tick(50, 1000, 0.5);
        assert_eq!(pps, 100.0);
        assert_eq!(bps, 16_000.0);
    }

    #[test]
    fn test_tick_zero_interval() {
        let mut window = RateWindow::new();
        assert_eq!(window.tick(100, 800_000, 0.0), (0.0, 0.0));
        assert_eq!(window.tick(100, 800_000, -1.0), (0.0, 0.0));
        assert_eq!(window.tick(100, 800_000, f64::NAN), (0.0, 0.0));
        assert!(window.is_empty());
    }

    #[test]
    fn test_average_empty() {
        assert_eq!(RateWindow::new().average(), (0.0, 0.0));
    }

    #[test]
    fn test_average_mean() {
        let mut window = RateWindow::new();
        window.tick(100, 1000, 1.0);
        window.tick(300, 3000, 1.0);
        let (pps, bps) = window.average();
        assert_eq!(pps, 200.0);
        assert_eq!(bps, 16_000.0);
    }

    #[test]
    fn test_eleventh_tick_evicts_oldest() {
        let mut window = RateWindow::new();
        window.tick(1_000_000, 0, 1.0);
        for _ in 0..RATE_WINDOW_CAPACITY {
            window.tick(10, 0, 1.0);
        }
        assert_eq!(window.len(), RATE_WINDOW_CAPACITY);
        assert_eq!(window.average().0, 10.0);
        assert_eq!(window.samples()[0].offset, Duration::from_secs(2));
    }

    #[test]
    fn test_sample_offsets_accumulate() {
        let mut window = RateWindow::new();
        window.tick(1, 1, 1.0);
        window.tick(1, 1, 0.0);
        window.tick(1, 1, 1.5);
        let offsets: Vec<Duration> = window.samples().iter().map(|s| s.offset).collect();
        assert_eq!(
            offsets,
            vec![Duration::from_secs(1), Duration::from_millis(2500)]
        );
    }

    proptest! {
        #[test]
        fn prop_window_never_exceeds_capacity(ticks in prop::collection::vec((0u64..10_000, 0u64..10_000_000, 0.0f64..3.0), 0..50)) {
            let mut window = RateWindow::new();
            for (packets, bytes, secs) in ticks {
                window.tick(packets, bytes, secs);
                prop_assert!(window.len() <= RATE_WINDOW_CAPACITY);
            }
        }
    }
}
