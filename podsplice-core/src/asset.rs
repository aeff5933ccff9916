//! Typed, validated audio asset descriptors
//!
//! An [`AudioAsset`] is built once, when media is discovered, from ffprobe's
//! JSON output. Construction rejects anything that is not a well-formed audio
//! file, so the planner and timeline builder never see missing or
//! non-numeric metadata.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Sample format assumed when the probe does not report one
pub const DEFAULT_SAMPLE_FORMAT: &str = "s16";

/// ffprobe `-show_format -show_streams` output (the fields we use)
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeOutput {
    #[serde(default)]
    pub streams: Vec<ProbeStream>,
    pub format: Option<ProbeFormat>,
}

/// One entry of ffprobe's `streams` array
///
/// ffprobe reports most numbers as strings; they are parsed during validation.
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeStream {
    pub codec_type: Option<String>,
    pub codec_name: Option<String>,
    pub sample_fmt: Option<String>,
    pub sample_rate: Option<String>,
    pub channels: Option<u32>,
    pub duration: Option<String>,
}

/// ffprobe's `format` object
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeFormat {
    pub format_name: Option<String>,
    pub duration: Option<String>,
    pub size: Option<String>,
    /// Container metadata; key case varies by muxer
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

impl ProbeFormat {
    /// Non-blank value of tag `name`, matched case-insensitively
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.trim())
            .filter(|value| !value.is_empty())
    }
}

impl ProbeOutput {
    /// Parse ffprobe JSON
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Probe(format!("Malformed ffprobe output: {}", e)))
    }
}

/// Sample layout of an audio stream
///
/// Two assets with different layouts cannot be crossfaded directly; the ad
/// is converted to the original's layout first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub sample_format: String,
}

/// Immutable descriptor of one source audio file
#[derive(Debug, Clone, Serialize)]
pub struct AudioAsset {
    /// Stable identity (file name), used as the cache key
    pub key: String,
    /// Location on disk
    pub path: PathBuf,
    /// Duration in seconds
    pub duration_seconds: f64,
    /// Stream sample layout
    pub format: AudioFormat,
    /// Container size in bytes
    pub size_bytes: u64,
    /// Codec name reported by the probe (e.g. "mp3")
    pub codec: String,
    /// `title` tag, if any
    pub title: Option<String>,
    /// `comment` tag, if any
    pub comment: Option<String>,
}

impl AudioAsset {
    /// Validate a probe result into an asset
    ///
    /// The first stream must be audio. Duration comes from the stream, or the
    /// container when the stream does not report one.
    pub fn from_probe(path: &Path, probe: &ProbeOutput) -> Result<Self> {
        let key = asset_key(path)?;
        let invalid = |what: String| Error::Probe(format!("{}: {}", path.display(), what));

        let stream = probe
            .streams
            .first()
            .ok_or_else(|| invalid("no streams".to_string()))?;

        match stream.codec_type.as_deref() {
            Some("audio") => {}
            other => {
                return Err(invalid(format!(
                    "first stream is {} rather than audio",
                    other.unwrap_or("untyped")
                )))
            }
        }

        let format = probe
            .format
            .as_ref()
            .ok_or_else(|| invalid("missing container format".to_string()))?;

        let duration_text = stream
            .duration
            .as_deref()
            .or(format.duration.as_deref())
            .ok_or_else(|| invalid("missing duration".to_string()))?;
        let duration_seconds: f64 = duration_text
            .trim()
            .parse()
            .map_err(|_| invalid(format!("non-numeric duration {:?}", duration_text)))?;
        if !duration_seconds.is_finite() || duration_seconds <= 0.0 {
            return Err(invalid(format!("duration must be positive, got {}", duration_seconds)));
        }

        let sample_rate: u32 = stream
            .sample_rate
            .as_deref()
            .ok_or_else(|| invalid("missing sample rate".to_string()))?
            .trim()
            .parse()
            .map_err(|_| invalid("non-numeric sample rate".to_string()))?;
        if sample_rate == 0 {
            return Err(invalid("sample rate is zero".to_string()));
        }

        let channels = match stream.channels {
            Some(c) if c > 0 && c <= u16::MAX as u32 => c as u16,
            Some(c) => return Err(invalid(format!("invalid channel count {}", c))),
            None => return Err(invalid("missing channel count".to_string())),
        };

        let size_text = format
            .size
            .as_deref()
            .ok_or_else(|| invalid("missing container size".to_string()))?;
        let size_bytes: u64 = size_text
            .trim()
            .parse()
            .map_err(|_| invalid(format!("non-numeric size {:?}", size_text)))?;

        Ok(Self {
            key,
            path: path.to_path_buf(),
            duration_seconds,
            format: AudioFormat {
                sample_rate,
                channels,
                sample_format: stream
                    .sample_fmt
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SAMPLE_FORMAT.to_string()),
            },
            size_bytes,
            codec: stream.codec_name.clone().unwrap_or_default(),
            title: format.tag("title").map(str::to_string),
            comment: format.tag("comment").map(str::to_string),
        })
    }
}

/// Identity key for an asset: its file name
fn asset_key(path: &Path) -> Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| Error::Probe(format!("{}: path has no file name", path.display())))
}
