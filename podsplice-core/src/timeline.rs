//! Splice timeline construction
//!
//! Describes where the ad goes and how the two sources blend: the ad is
//! inserted at the exact midpoint of the original, with a crossfade on each
//! side. The result is a declarative plan of seven regions; no sample data is
//! touched here.
//!
//! ```text
//!  original: [ lead-in ][fade-out]|[fade-in][       lead-out       ]
//!                           \ /   mid   \ /
//!  ad:              [fade-in][ ad body ][fade-out]
//! ```
//!
//! All boundaries are fixed-point ticks (see [`crate::timing`]). Regions are
//! laid end to end in plan order, so boundaries are contiguous and the plan
//! spans exactly `original + ad`. During mixing the crossfade partners overlap
//! in time, which makes the rendered output `2 × fade` shorter than the plan;
//! bitrate planning uses the plan span and so errs on the small side.

use crate::asset::AudioFormat;
use crate::error::{Error, Result};
use crate::timing::{format_seconds, seconds_to_ticks, ticks_to_seconds, TICK_RATE};
use serde::Serialize;

/// Crossfade window length (seconds)
pub const DEFAULT_FADE_SECONDS: f64 = 2.0;

/// Longest duration accepted for any input
///
/// Half the tick range, so `original + ad` still fits in an `i64`.
pub const MAX_DURATION_SECONDS: f64 = (i64::MAX / TICK_RATE / 2) as f64;

/// Which input a region reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Original,
    Ad,
}

/// Role of a region in the composition, in plan order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentRole {
    /// Original from the start up to the first crossfade, untouched
    LeadIn,
    /// Last fade window of the original's first half
    FadeOutOfOriginal,
    /// First fade window of the ad
    FadeInOfAd,
    /// The ad between its two fade windows, untouched
    AdBody,
    /// Last fade window of the ad
    FadeOutOfAd,
    /// First fade window of the original's second half
    FadeInOfOriginalTail,
    /// Original from the second crossfade to the end, untouched
    LeadOut,
}

impl SegmentRole {
    /// All roles in plan order
    pub const ALL: [SegmentRole; 7] = [
        SegmentRole::LeadIn,
        SegmentRole::FadeOutOfOriginal,
        SegmentRole::FadeInOfAd,
        SegmentRole::AdBody,
        SegmentRole::FadeOutOfAd,
        SegmentRole::FadeInOfOriginalTail,
        SegmentRole::LeadOut,
    ];

    pub fn source(&self) -> Source {
        match self {
            SegmentRole::FadeInOfAd | SegmentRole::AdBody | SegmentRole::FadeOutOfAd => Source::Ad,
            _ => Source::Original,
        }
    }

    /// Whether the region is one side of a crossfade (and padded to the fade length)
    pub fn is_crossfade_partner(&self) -> bool {
        !matches!(self, SegmentRole::LeadIn | SegmentRole::AdBody | SegmentRole::LeadOut)
    }

    /// Short label, used for filter-graph pad names and logs
    pub fn label(&self) -> &'static str {
        match self {
            SegmentRole::LeadIn => "lead_in",
            SegmentRole::FadeOutOfOriginal => "orig_fade_out",
            SegmentRole::FadeInOfAd => "ad_fade_in",
            SegmentRole::AdBody => "ad_body",
            SegmentRole::FadeOutOfAd => "ad_fade_out",
            SegmentRole::FadeInOfOriginalTail => "orig_fade_in",
            SegmentRole::LeadOut => "lead_out",
        }
    }
}

/// One region of the splice plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub role: SegmentRole,
    /// Trim start within the source (ticks)
    pub source_start: i64,
    /// Trim end within the source (ticks)
    pub source_end: i64,
    /// Start within the plan (ticks)
    pub start: i64,
    /// End within the plan (ticks)
    pub end: i64,
}

impl Segment {
    pub fn duration_ticks(&self) -> i64 {
        self.end - self.start
    }

    pub fn duration_seconds(&self) -> f64 {
        ticks_to_seconds(self.duration_ticks())
    }

    pub fn source_start_seconds(&self) -> f64 {
        ticks_to_seconds(self.source_start)
    }

    pub fn source_end_seconds(&self) -> f64 {
        ticks_to_seconds(self.source_end)
    }
}

/// Seven-region crossfaded insertion plan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpliceTimeline {
    original_ticks: i64,
    ad_ticks: i64,
    fade_ticks: i64,
    splice_point_ticks: i64,
    segments: [Segment; 7],
}

impl SpliceTimeline {
    /// Build the timeline for inserting an ad at the original's midpoint
    ///
    /// # Errors
    /// `InvalidInput` when a duration is not positive and finite, exceeds
    /// [`MAX_DURATION_SECONDS`], or when either source is shorter than two
    /// fade windows.
    pub fn build(original_seconds: f64, ad_seconds: f64, fade_seconds: f64) -> Result<Self> {
        for (name, value) in [("original", original_seconds), ("ad", ad_seconds), ("fade", fade_seconds)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::InvalidInput(format!(
                    "{} duration must be positive, got {}s",
                    name, value
                )));
            }
            if value > MAX_DURATION_SECONDS {
                return Err(Error::InvalidInput(format!(
                    "{} duration of {}s exceeds the {}s limit",
                    name, value, MAX_DURATION_SECONDS
                )));
            }
        }

        let original = seconds_to_ticks(original_seconds);
        let ad = seconds_to_ticks(ad_seconds);
        let fade = seconds_to_ticks(fade_seconds);

        if ad < 2 * fade {
            return Err(Error::InvalidInput(format!(
                "ad of {:.3}s is shorter than two {:.3}s fade windows",
                ad_seconds, fade_seconds
            )));
        }
        if original < 2 * fade {
            return Err(Error::InvalidInput(format!(
                "original of {:.3}s is shorter than two {:.3}s fade windows",
                original_seconds, fade_seconds
            )));
        }

        let mid = original / 2;
        let source_ranges = [
            (SegmentRole::LeadIn, 0, mid - fade),
            (SegmentRole::FadeOutOfOriginal, mid - fade, mid),
            (SegmentRole::FadeInOfAd, 0, fade),
            (SegmentRole::AdBody, fade, ad - fade),
            (SegmentRole::FadeOutOfAd, ad - fade, ad),
            (SegmentRole::FadeInOfOriginalTail, mid, mid + fade),
            (SegmentRole::LeadOut, mid + fade, original),
        ];

        let mut cursor = 0;
        let segments = source_ranges.map(|(role, source_start, source_end)| {
            let start = cursor;
            cursor += source_end - source_start;
            Segment {
                role,
                source_start,
                source_end,
                start,
                end: cursor,
            }
        });

        Ok(Self {
            original_ticks: original,
            ad_ticks: ad,
            fade_ticks: fade,
            splice_point_ticks: mid,
            segments,
        })
    }

    /// Build with the default 2-second crossfade
    pub fn with_default_fade(original_seconds: f64, ad_seconds: f64) -> Result<Self> {
        Self::build(original_seconds, ad_seconds, DEFAULT_FADE_SECONDS)
    }

    pub fn segments(&self) -> &[Segment; 7] {
        &self.segments
    }

    pub fn segment(&self, role: SegmentRole) -> &Segment {
        // ALL and segments share plan order
        let index = SegmentRole::ALL.iter().position(|r| *r == role).unwrap_or(0);
        &self.segments[index]
    }

    pub fn fade_ticks(&self) -> i64 {
        self.fade_ticks
    }

    pub fn fade_seconds(&self) -> f64 {
        ticks_to_seconds(self.fade_ticks)
    }

    pub fn original_ticks(&self) -> i64 {
        self.original_ticks
    }

    pub fn ad_ticks(&self) -> i64 {
        self.ad_ticks
    }

    /// Insertion point within the original (ticks)
    pub fn splice_point_ticks(&self) -> i64 {
        self.splice_point_ticks
    }

    pub fn splice_point_seconds(&self) -> f64 {
        ticks_to_seconds(self.splice_point_ticks)
    }

    /// Span of all regions laid end to end (ticks); equals original + ad
    pub fn total_ticks(&self) -> i64 {
        self.segments[6].end
    }

    pub fn total_seconds(&self) -> f64 {
        ticks_to_seconds(self.total_ticks())
    }

    /// Rendered length once each crossfade pair is overlapped
    pub fn output_seconds(&self) -> f64 {
        ticks_to_seconds(self.total_ticks() - 2 * self.fade_ticks)
    }

    /// One-line summary of region boundaries for logs
    pub fn describe(&self) -> String {
        self.segments
            .iter()
            .map(|s| {
                format!(
                    "{}[{}..{}]",
                    s.role.label(),
                    format_seconds(s.source_start),
                    format_seconds(s.source_end)
                )
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Target layout the ad must be converted to, if it differs from the original
///
/// The conversion applies to the ad's three derived copies before any
/// trimming or fading.
pub fn required_conversion(original: &AudioFormat, ad: &AudioFormat) -> Option<AudioFormat> {
    if original == ad {
        None
    } else {
        Some(original.clone())
    }
}
