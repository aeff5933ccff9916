//! The size-preserving splice pipeline
//!
//! `splice_and_pad` ties the pieces together for one (original, ad, target)
//! request: cache lookup, bitrate and timeline planning, encoding into a
//! private temp file, exact-size padding, and caching of the final bytes.

use crate::asset::AudioAsset;
use crate::cache::{CacheStats, ResultCache};
use crate::config::SpliceConfig;
use crate::engine::{EncodeJob, EncodingEngine, SplicePlan};
use crate::error::{Error, Result};
use crate::fade_curves::FadeCurve;
use crate::padder::{pad_to_exact_size, PaddingReport};
use crate::planner::EncodingPlan;
use crate::timeline::{required_conversion, SpliceTimeline, DEFAULT_FADE_SECONDS};
use bytes::Bytes;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempPath;
use tracing::{debug, error, info, info_span, Instrument};
use uuid::Uuid;

/// Prefix of temporary encoder output files
const WORK_FILE_PREFIX: &str = "podsplice-";

/// Tunables for the pipeline
#[derive(Debug, Clone)]
pub struct SpliceSettings {
    pub fade_seconds: f64,
    pub fade_curve: FadeCurve,
    pub encode_timeout: Duration,
    pub cache_capacity: usize,
    /// Directory for temp files; the system temp dir when `None`
    pub work_dir: Option<PathBuf>,
}

impl Default for SpliceSettings {
    fn default() -> Self {
        Self {
            fade_seconds: DEFAULT_FADE_SECONDS,
            fade_curve: FadeCurve::default(),
            encode_timeout: Duration::from_secs(300),
            cache_capacity: 32,
            work_dir: None,
        }
    }
}

impl From<&SpliceConfig> for SpliceSettings {
    fn from(config: &SpliceConfig) -> Self {
        Self {
            fade_seconds: config.fade_seconds,
            fade_curve: config.fade_curve,
            encode_timeout: Duration::from_secs(config.encode_timeout_secs),
            cache_capacity: config.cache_capacity,
            work_dir: config.work_dir.clone(),
        }
    }
}

/// Splice engine: plans, encodes, pads and caches
pub struct Splicer {
    engine: Arc<dyn EncodingEngine>,
    settings: SpliceSettings,
    cache: ResultCache,
}

impl Splicer {
    pub fn new(engine: Arc<dyn EncodingEngine>, settings: SpliceSettings) -> Self {
        let cache = ResultCache::new(settings.cache_capacity);
        Self { engine, settings, cache }
    }

    pub fn settings(&self) -> &SpliceSettings {
        &self.settings
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn is_cached(&self, original: &AudioAsset, ad: &AudioAsset) -> bool {
        self.cache.contains(&original.key, &ad.key)
    }

    /// Compute the splice plan without encoding anything
    ///
    /// The bitrate is planned against the full plan span (original + ad),
    /// which is slightly longer than the crossfaded output.
    pub fn plan(&self, original: &AudioAsset, ad: &AudioAsset, target_size_bytes: u64) -> Result<SplicePlan> {
        let timeline = SpliceTimeline::build(
            original.duration_seconds,
            ad.duration_seconds,
            self.settings.fade_seconds,
        )?;
        let encoding = EncodingPlan::for_target(timeline.total_seconds(), target_size_bytes)?;
        let ad_conversion = required_conversion(&original.format, &ad.format);

        Ok(SplicePlan {
            timeline,
            encoding,
            ad_conversion,
            curve: self.settings.fade_curve,
        })
    }

    /// Splice `ad` into `original` and return exactly `target_size_bytes` bytes
    ///
    /// Results are cached per (original, ad) pair. Concurrent requests for
    /// the same pair share one encoder run.
    pub async fn splice_and_pad(
        &self,
        original: &AudioAsset,
        ad: &AudioAsset,
        target_size_bytes: u64,
    ) -> Result<Bytes> {
        let request_id = Uuid::new_v4();
        let span = info_span!(
            "splice",
            %request_id,
            original = %original.key,
            ad = %ad.key,
            target_size_bytes
        );

        async {
            self.cache
                .get_or_compute(&original.key, &ad.key, target_size_bytes, || {
                    self.render(original, ad, target_size_bytes)
                })
                .await
        }
        .instrument(span)
        .await
    }

    /// Uncached pipeline run
    async fn render(&self, original: &AudioAsset, ad: &AudioAsset, target_size_bytes: u64) -> Result<Bytes> {
        let started = Instant::now();
        let plan = self.plan(original, ad, target_size_bytes)?;
        debug!(
            bitrate_kbps = plan.encoding.bitrate_kbps,
            convert_ad = plan.ad_conversion.is_some(),
            curve = %plan.curve,
            timeline = %plan.timeline.describe(),
            "Planned splice"
        );

        let work_file = self.work_file()?;
        let job = EncodeJob {
            original,
            ad,
            plan: &plan,
        };

        match tokio::time::timeout(self.settings.encode_timeout, self.engine.encode(&job, &work_file)).await {
            Ok(result) => result?,
            Err(_) => {
                error!(timeout = ?self.settings.encode_timeout, engine = self.engine.name(), "Encoder timed out");
                return Err(Error::EncodingFailure(format!(
                    "{} did not finish within {}s",
                    self.engine.name(),
                    self.settings.encode_timeout.as_secs()
                )));
            }
        }

        let encoded_size = tokio::fs::metadata(&work_file).await?.len();
        if encoded_size > target_size_bytes {
            error!(encoded_size, target_size_bytes, "Encoder output exceeds target");
            return Err(Error::EncodingFailure(format!(
                "encoded output is {} bytes, over the {} byte target",
                encoded_size, target_size_bytes
            )));
        }
        debug!(encoded_size, slack = target_size_bytes - encoded_size, "Encoded");

        // work_file moves into the blocking task and is deleted when it ends
        let (report, data) = tokio::task::spawn_blocking(move || -> Result<(PaddingReport, Vec<u8>)> {
            let report = pad_to_exact_size(&work_file, target_size_bytes)?;
            let data = std::fs::read(&work_file)?;
            Ok((report, data))
        })
        .await
        .map_err(|e| Error::Internal(format!("padding task failed: {}", e)))??;

        let actual = data.len() as u64;
        if actual != target_size_bytes {
            return Err(Error::PaddingMismatch {
                actual,
                target: target_size_bytes,
            });
        }

        info!(
            bitrate_kbps = plan.encoding.bitrate_kbps,
            encoded_size = report.initial_size,
            padding = ?report.payload_len,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Splice complete"
        );
        Ok(Bytes::from(data))
    }

    fn work_file(&self) -> Result<TempPath> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(WORK_FILE_PREFIX).suffix(".mp3");
        let file = match &self.settings.work_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        Ok(file.into_temp_path())
    }
}
