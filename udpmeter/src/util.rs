//! Shared unit conversions for throughput reporting.
use std::time::Duration;

pub const BITS_PER_BYTE: f64 = 8.0;
pub const BITS_PER_MEGABIT: f64 = 1_000_000.0;

pub fn bytes_to_bits(bytes: u64) -> f64 {
    bytes as f64 * BITS_PER_BYTE
}

/// Converts bits per second into (decimal) megabits per second.
pub fn bits_to_mbps(bits_per_sec: f64) -> f64 {
    bits_per_sec / BITS_PER_MEGABIT
}

/// Average of `count` over `elapsed`, 0 when no time has passed.
pub fn per_second(count: f64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        count / secs
    } else {
        0.0
    }
}
