//! Tick-based fixed-point time for splice boundaries
//!
//! Timeline boundaries are held as `i64` ticks at 28,224,000 Hz, the LCM of
//! the common audio sample rates. Every boundary is an exact integer, so
//! segment contiguity and duration sums hold without floating-point drift.
//! Seconds only appear at the edges: probed durations come in as `f64`, and
//! the encoder receives decimal strings rendered with integer arithmetic.
//!
//! # Precision
//!
//! - One tick ≈ 35.4 ns; `seconds_to_ticks` rounds to the nearest tick
//! - `ticks_to_seconds` is exact for any value that came from whole samples
//! - `format_seconds` truncates to microseconds (ffmpeg's own time resolution)
//!
//! # Examples
//!
//! ```rust
//! use podsplice_core::timing::*;
//!
//! let two_seconds = seconds_to_ticks(2.0);
//! assert_eq!(two_seconds, 56_448_000);
//! assert_eq!(format_seconds(two_seconds), "2.000000");
//! ```

/// Tick rate: 28,224,000 Hz
///
/// Divides evenly into 8k, 11.025k, 16k, 22.05k, 32k, 44.1k, 48k, 88.2k, 96k,
/// 176.4k and 192k sample rates.
pub const TICK_RATE: i64 = 28_224_000;

/// Microseconds per second, the resolution of rendered timestamps
const MICROS_PER_SECOND: i64 = 1_000_000;

/// Convert seconds to ticks (rounded to nearest tick)
pub fn seconds_to_ticks(seconds: f64) -> i64 {
    (seconds * TICK_RATE as f64).round() as i64
}

/// Convert ticks to seconds
pub fn ticks_to_seconds(ticks: i64) -> f64 {
    ticks as f64 / TICK_RATE as f64
}

/// Render ticks as a decimal seconds string with microsecond precision
///
/// Uses integer arithmetic only, so identical tick values always render to
/// identical strings (the encoder command line is part of the deterministic
/// output contract).
pub fn format_seconds(ticks: i64) -> String {
    let sign = if ticks < 0 { "-" } else { "" };
    let abs = ticks.unsigned_abs() as i128;
    let whole = abs / TICK_RATE as i128;
    let micros = (abs % TICK_RATE as i128) * MICROS_PER_SECOND as i128 / TICK_RATE as i128;
    format!("{}{}.{:06}", sign, whole, micros)
}
