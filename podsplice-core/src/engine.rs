//! Encoding engine contract and the ffmpeg implementation
//!
//! The splice engine never decodes or mixes audio. It hands a [`SplicePlan`]
//! to an [`EncodingEngine`], which performs the trims, pads, crossfades and
//! concatenation in plan order and writes one encoded file. The engine is
//! trusted to land near the planned bitrate, not on the exact byte target;
//! the padder closes the gap afterwards.

use crate::asset::{AudioAsset, AudioFormat};
use crate::error::{Error, Result};
use crate::fade_curves::FadeCurve;
use crate::planner::EncodingPlan;
use crate::timeline::{Segment, SegmentRole, Source, SpliceTimeline};
use crate::timing::format_seconds;
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, error};

/// Everything the engine needs to render one splice
#[derive(Debug, Clone, Serialize)]
pub struct SplicePlan {
    pub timeline: SpliceTimeline,
    pub encoding: EncodingPlan,
    /// Layout the ad must be converted to before filtering, when it differs
    pub ad_conversion: Option<AudioFormat>,
    /// Fade-in curve; the fade-out side uses its recommended pair
    pub curve: FadeCurve,
}

/// One encoding request: the plan plus the two inputs it refers to
#[derive(Debug, Clone, Copy)]
pub struct EncodeJob<'a> {
    pub original: &'a AudioAsset,
    pub ad: &'a AudioAsset,
    pub plan: &'a SplicePlan,
}

/// Capability to render a splice plan into an encoded audio file
///
/// Implementations must be deterministic for identical jobs and must report
/// failure rather than leave a partial file behind as success.
#[async_trait]
pub trait EncodingEngine: Send + Sync {
    /// Short engine name for logs
    fn name(&self) -> &'static str;

    /// Render `job` into `output`, overwriting it
    async fn encode(&self, job: &EncodeJob<'_>, output: &Path) -> Result<()>;
}

/// Encoder backed by the `ffmpeg` executable (libmp3lame)
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    program: PathBuf,
}

impl FfmpegEngine {
    /// Resolve `program` (a name on PATH or a path) and verify it exists
    pub fn locate(program: impl AsRef<Path>) -> Result<Self> {
        let program = program.as_ref();
        let resolved = which::which(program).map_err(|e| {
            Error::Config(format!("ffmpeg executable {} not found: {}", program.display(), e))
        })?;
        debug!(ffmpeg = %resolved.display(), "Located encoder");
        Ok(Self { program: resolved })
    }

    /// Use `program` as-is, without checking that it exists
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into() }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Full ffmpeg argument list for `job`
    pub fn command_args(&self, job: &EncodeJob<'_>, output: &Path) -> Vec<String> {
        let encoding = &job.plan.encoding;
        vec![
            "-hide_banner".to_string(),
            "-nostdin".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-y".to_string(),
            "-i".to_string(),
            job.original.path.to_string_lossy().into_owned(),
            "-i".to_string(),
            job.ad.path.to_string_lossy().into_owned(),
            "-filter_complex".to_string(),
            filter_graph(job.plan),
            "-map".to_string(),
            "[out]".to_string(),
            "-c:a".to_string(),
            "libmp3lame".to_string(),
            "-b:a".to_string(),
            format!("{}k", encoding.bitrate_kbps),
            "-maxrate".to_string(),
            format!("{}k", encoding.max_rate_kbps),
            "-bufsize".to_string(),
            format!("{}k", encoding.buffer_size_kbits),
            "-write_xing".to_string(),
            "1".to_string(),
            "-id3v2_version".to_string(),
            "4".to_string(),
            "-f".to_string(),
            "mp3".to_string(),
            output.to_string_lossy().into_owned(),
        ]
    }
}

#[async_trait]
impl EncodingEngine for FfmpegEngine {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn encode(&self, job: &EncodeJob<'_>, output: &Path) -> Result<()> {
        let args = self.command_args(job, output);
        debug!(
            original = %job.original.key,
            ad = %job.ad.key,
            bitrate_kbps = job.plan.encoding.bitrate_kbps,
            "Running ffmpeg"
        );

        // kill_on_drop: a caller-side timeout drops this future and must not
        // leave the encoder running
        let result = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::EncodingFailure(format!("failed to start {}: {}", self.program.display(), e)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
            let tail: Vec<&str> = tail.into_iter().rev().collect();
            error!(status = %result.status, stderr = %tail.join(" | "), "ffmpeg failed");
            return Err(Error::EncodingFailure(format!(
                "ffmpeg exited with {}: {}",
                result.status,
                tail.join(" | ")
            )));
        }

        Ok(())
    }
}

/// Render the plan as an ffmpeg `-filter_complex` graph
///
/// Each input is split once per region that reads it. The ad's split happens
/// after the optional format conversion, so all three ad regions share the
/// original's layout before trimming.
pub fn filter_graph(plan: &SplicePlan) -> String {
    let timeline = &plan.timeline;
    let fade = format_seconds(timeline.fade_ticks());
    let mut chains = Vec::new();

    let labels_for = |source: Source| -> String {
        timeline
            .segments()
            .iter()
            .filter(|s| s.role.source() == source)
            .map(|s| format!("[src_{}]", s.role.label()))
            .collect()
    };

    chains.push(format!("[0:a]asplit=4{}", labels_for(Source::Original)));

    let conversion = match &plan.ad_conversion {
        Some(format) => format!(
            "aresample={rate},aformat=sample_rates={rate}:sample_fmts={fmt}:channel_layouts={ch}c,",
            rate = format.sample_rate,
            fmt = format.sample_format,
            ch = format.channels
        ),
        None => String::new(),
    };
    chains.push(format!("[1:a]{}asplit=3{}", conversion, labels_for(Source::Ad)));

    for segment in timeline.segments() {
        chains.push(trim_chain(segment, &fade));
    }

    let fade_in = plan.curve.ffmpeg_name();
    let fade_out = plan.curve.recommended_pair().ffmpeg_name();
    chains.push(format!(
        "[{}][{}]acrossfade=d={}:c1={}:c2={}[xfade_in]",
        SegmentRole::FadeOutOfOriginal.label(),
        SegmentRole::FadeInOfAd.label(),
        fade,
        fade_out,
        fade_in
    ));
    chains.push(format!(
        "[{}][{}]acrossfade=d={}:c1={}:c2={}[xfade_out]",
        SegmentRole::FadeOutOfAd.label(),
        SegmentRole::FadeInOfOriginalTail.label(),
        fade,
        fade_out,
        fade_in
    ));

    chains.push(format!(
        "[{}][xfade_in][{}][xfade_out][{}]concat=n=5:v=0:a=1[out]",
        SegmentRole::LeadIn.label(),
        SegmentRole::AdBody.label(),
        SegmentRole::LeadOut.label()
    ));

    chains.join(";")
}

fn trim_chain(segment: &Segment, fade: &str) -> String {
    let pad = if segment.role.is_crossfade_partner() {
        format!(",apad=whole_dur={}", fade)
    } else {
        String::new()
    };
    format!(
        "[src_{label}]atrim=start={start}:end={end},asetpts=PTS-STARTPTS{pad}[{label}]",
        label = segment.role.label(),
        start = format_seconds(segment.source_start),
        end = format_seconds(segment.source_end),
        pad = pad
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{AudioAsset, AudioFormat};
    use std::path::PathBuf;

    fn asset(key: &str, duration: f64, channels: u16) -> AudioAsset {
        AudioAsset {
            key: key.to_string(),
            path: PathBuf::from(format!("/media/{}", key)),
            duration_seconds: duration,
            format: AudioFormat {
                sample_rate: 44_100,
                channels,
                sample_format: "fltp".to_string(),
            },
            size_bytes: 1_000_000,
            codec: "mp3".to_string(),
            title: None,
            comment: None,
        }
    }

    fn plan_for(original: &AudioAsset, ad: &AudioAsset, curve: FadeCurve) -> SplicePlan {
        let timeline = SpliceTimeline::with_default_fade(original.duration_seconds, ad.duration_seconds).unwrap();
        SplicePlan {
            encoding: EncodingPlan::for_target(timeline.total_seconds(), 10_000_000).unwrap(),
            timeline,
            ad_conversion: crate::timeline::required_conversion(&original.format, &ad.format),
            curve,
        }
    }

    #[test]
    fn test_filter_graph_reference_scenario() {
        let original = asset("music.mp3", 600.0, 2);
        let ad = asset("ad.mp3", 30.0, 2);
        let graph = filter_graph(&plan_for(&original, &ad, FadeCurve::Linear));

        assert!(graph.starts_with("[0:a]asplit=4[src_lead_in][src_orig_fade_out][src_orig_fade_in][src_lead_out];"));
        assert!(graph.contains("[1:a]asplit=3[src_ad_fade_in][src_ad_body][src_ad_fade_out];"));
        assert!(graph.contains(
            "[src_lead_in]atrim=start=0.000000:end=298.000000,asetpts=PTS-STARTPTS[lead_in]"
        ));
        assert!(graph.contains(
            "[src_orig_fade_out]atrim=start=298.000000:end=300.000000,asetpts=PTS-STARTPTS,apad=whole_dur=2.000000[orig_fade_out]"
        ));
        assert!(graph.contains(
            "[src_ad_body]atrim=start=2.000000:end=28.000000,asetpts=PTS-STARTPTS[ad_body]"
        ));
        assert!(graph.contains(
            "[src_lead_out]atrim=start=302.000000:end=600.000000,asetpts=PTS-STARTPTS[lead_out]"
        ));
        assert!(graph.contains("[orig_fade_out][ad_fade_in]acrossfade=d=2.000000:c1=tri:c2=tri[xfade_in]"));
        assert!(graph.contains("[ad_fade_out][orig_fade_in]acrossfade=d=2.000000:c1=tri:c2=tri[xfade_out]"));
        assert!(graph.ends_with("[lead_in][xfade_in][ad_body][xfade_out][lead_out]concat=n=5:v=0:a=1[out]"));
        assert!(!graph.contains("aresample"));
    }

    #[test]
    fn test_filter_graph_converts_mismatched_ad() {
        let original = asset("music.mp3", 600.0, 2);
        let ad = asset("ad.mp3", 30.0, 1);
        let graph = filter_graph(&plan_for(&original, &ad, FadeCurve::Linear));

        assert!(graph.contains(
            "[1:a]aresample=44100,aformat=sample_rates=44100:sample_fmts=fltp:channel_layouts=2c,asplit=3"
        ));
    }

    #[test]
    fn test_filter_graph_curve_pairing() {
        let original = asset("music.mp3", 120.0, 2);
        let ad = asset("ad.mp3", 15.0, 2);
        let graph = filter_graph(&plan_for(&original, &ad, FadeCurve::Exponential));
        assert!(graph.contains("c1=log:c2=exp"));
    }

    #[test]
    fn test_filter_graph_is_deterministic() {
        let original = asset("music.mp3", 187.346938, 2);
        let ad = asset("ad.mp3", 29.976, 2);
        let plan = plan_for(&original, &ad, FadeCurve::Linear);
        assert_eq!(filter_graph(&plan), filter_graph(&plan.clone()));
    }

    #[test]
    fn test_command_args_rate_control() {
        let original = asset("music.mp3", 600.0, 2);
        let ad = asset("ad.mp3", 30.0, 2);
        let plan = plan_for(&original, &ad, FadeCurve::Linear);
        let job = EncodeJob {
            original: &original,
            ad: &ad,
            plan: &plan,
        };
        let engine = FfmpegEngine::with_program("ffmpeg");
        let args = engine.command_args(&job, Path::new("/tmp/out.mp3"));

        let value_after = |flag: &str| {
            let index = args.iter().position(|a| a == flag).unwrap();
            args[index + 1].clone()
        };
        let bitrate = plan.encoding.bitrate_kbps;
        assert_eq!(value_after("-b:a"), format!("{}k", bitrate));
        assert_eq!(value_after("-maxrate"), format!("{}k", bitrate));
        assert_eq!(value_after("-bufsize"), format!("{}k", bitrate * 2));
        assert_eq!(value_after("-write_xing"), "1");
        assert_eq!(value_after("-map"), "[out]");
        assert_eq!(args.last().unwrap(), "/tmp/out.mp3");
        assert!(args.contains(&"-y".to_string()));
    }
}
