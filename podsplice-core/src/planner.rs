//! Bitrate planning
//!
//! Picks the highest constant bitrate from the standard MP3 ladder that fits
//! the combined duration into the target byte budget, keeping ~5% headroom
//! for container framing and metadata. The encoder output is expected to land
//! slightly under the target; the padder absorbs the remaining slack.

use crate::error::{Error, Result};
use serde::Serialize;

/// Standard MP3 constant-bitrate steps (kbps), ascending
pub const BITRATE_LADDER: [u32; 14] = [32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320];

/// Share of the target size usable for audio payload
pub const SIZE_MARGIN: f64 = 0.95;

/// Usable bits per second for `duration_seconds` of audio in `target_size_bytes`
pub fn usable_bits_per_second(duration_seconds: f64, target_size_bytes: u64) -> f64 {
    (target_size_bytes as f64 * SIZE_MARGIN * 8.0) / duration_seconds
}

/// Select the largest ladder bitrate (kbps) that fits the size budget
///
/// # Errors
/// `InvalidInput` when the duration is not positive and finite, or when even
/// the lowest ladder rate (32 kbps) would overflow the target.
pub fn plan_bitrate(total_duration_seconds: f64, target_size_bytes: u64) -> Result<u32> {
    if !total_duration_seconds.is_finite() || total_duration_seconds <= 0.0 {
        return Err(Error::InvalidInput(format!(
            "duration must be positive, got {}s",
            total_duration_seconds
        )));
    }

    let available = usable_bits_per_second(total_duration_seconds, target_size_bytes).floor();

    BITRATE_LADDER
        .iter()
        .rev()
        .copied()
        .find(|&kbps| (kbps as f64) * 1000.0 <= available)
        .ok_or_else(|| {
            Error::InvalidInput(format!(
                "target of {} bytes is too small for {:.3}s of audio ({:.0} bps available, {} kbps minimum)",
                target_size_bytes, total_duration_seconds, available, BITRATE_LADDER[0]
            ))
        })
}

/// Encoder rate-control settings for one splice
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EncodingPlan {
    /// Target bitrate (kbps), a ladder value
    pub bitrate_kbps: u32,
    /// Maximum rate (kbps); equal to the bitrate
    pub max_rate_kbps: u32,
    /// Rate-control buffer size (kbit); twice the bitrate
    pub buffer_size_kbits: u32,
    /// Duration the bitrate was planned against (seconds)
    pub output_duration_seconds: f64,
}

impl EncodingPlan {
    /// Plan encoding for `output_duration_seconds` within `target_size_bytes`
    pub fn for_target(output_duration_seconds: f64, target_size_bytes: u64) -> Result<Self> {
        let bitrate_kbps = plan_bitrate(output_duration_seconds, target_size_bytes)?;
        Ok(Self {
            bitrate_kbps,
            max_rate_kbps: bitrate_kbps,
            buffer_size_kbits: bitrate_kbps * 2,
            output_duration_seconds,
        })
    }

    /// Estimated payload size in bytes at the planned bitrate
    pub fn estimated_bytes(&self) -> f64 {
        self.bitrate_kbps as f64 * 1000.0 * self.output_duration_seconds / 8.0
    }

    /// Whether the plan leaves the headroom margin against `target_size_bytes`
    pub fn leaves_headroom(&self, target_size_bytes: u64) -> bool {
        self.bitrate_kbps as f64 * 1000.0 * self.output_duration_seconds / SIZE_MARGIN
            <= target_size_bytes as f64 * 8.0
    }
}
