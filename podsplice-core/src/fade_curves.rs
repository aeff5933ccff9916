//! Crossfade curve selection
//!
//! The splice engine never mixes samples itself; a curve is a declarative
//! choice carried in the splice plan and rendered into the encoder's
//! crossfade filter. Curves pair up so that the outgoing source's fade-out
//! and the incoming source's fade-in sound balanced.

use serde::{Deserialize, Serialize};

/// Fade curve types for crossfading
///
/// - Linear: constant rate of change (ffmpeg `tri`)
/// - Exponential: slow start, fast finish (natural-sounding fade-in)
/// - Logarithmic: fast start, slow finish (natural-sounding fade-out)
/// - SCurve: smooth acceleration and deceleration (ffmpeg `hsin`)
/// - EqualPower: constant perceived loudness during the crossfade (ffmpeg `qsin`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FadeCurve {
    #[default]
    Linear,
    Exponential,
    Logarithmic,
    #[serde(alias = "cosine", alias = "s-curve", alias = "scurve")]
    SCurve,
    EqualPower,
}

impl FadeCurve {
    /// Curve to use on the other side of a crossfade
    ///
    /// Exponential fade-in pairs with logarithmic fade-out; the symmetric
    /// curves pair with themselves.
    pub fn recommended_pair(&self) -> FadeCurve {
        match self {
            FadeCurve::Exponential => FadeCurve::Logarithmic,
            FadeCurve::Logarithmic => FadeCurve::Exponential,
            FadeCurve::SCurve => FadeCurve::SCurve,
            FadeCurve::EqualPower => FadeCurve::EqualPower,
            FadeCurve::Linear => FadeCurve::Linear,
        }
    }

    /// Curve name understood by ffmpeg's `acrossfade` filter
    pub fn ffmpeg_name(&self) -> &'static str {
        match self {
            FadeCurve::Linear => "tri",
            FadeCurve::Exponential => "exp",
            FadeCurve::Logarithmic => "log",
            FadeCurve::SCurve => "hsin",
            FadeCurve::EqualPower => "qsin",
        }
    }

    /// Name used in configuration files
    pub fn config_name(&self) -> &'static str {
        match self {
            FadeCurve::Linear => "linear",
            FadeCurve::Exponential => "exponential",
            FadeCurve::Logarithmic => "logarithmic",
            FadeCurve::SCurve => "s_curve",
            FadeCurve::EqualPower => "equal_power",
        }
    }

    pub const ALL: [FadeCurve; 5] = [
        FadeCurve::Linear,
        FadeCurve::Exponential,
        FadeCurve::Logarithmic,
        FadeCurve::SCurve,
        FadeCurve::EqualPower,
    ];
}

impl std::fmt::Display for FadeCurve {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.config_name())
    }
}
