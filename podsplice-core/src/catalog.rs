//! Media discovery
//!
//! The catalog holds one original track and the set of ads that may be
//! spliced into it, all probed and validated once at startup. It also owns
//! the size heuristic that the feed advertises and every splice must hit.

use crate::asset::{AudioAsset, ProbeOutput};
use crate::error::{Error, Result};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Headroom over the original size the target may grow to
pub const TARGET_GROWTH_FACTOR: f64 = 1.10;

/// Source of probe metadata for a media file
#[async_trait]
pub trait MediaProber: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<ProbeOutput>;
}

/// Prober backed by the `ffprobe` executable
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    program: PathBuf,
}

impl FfprobeProber {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into() }
    }

    /// Resolve `program` on PATH and verify it exists
    pub fn locate(program: impl AsRef<Path>) -> Result<Self> {
        let program = program.as_ref();
        let resolved = which::which(program).map_err(|e| {
            Error::Config(format!("ffprobe executable {} not found: {}", program.display(), e))
        })?;
        Ok(Self { program: resolved })
    }
}

#[async_trait]
impl MediaProber for FfprobeProber {
    async fn probe(&self, path: &Path) -> Result<ProbeOutput> {
        let output = Command::new(&self.program)
            .args(["-v", "error", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::Probe(format!("failed to start {}: {}", self.program.display(), e)))?;

        if !output.status.success() {
            return Err(Error::Probe(format!(
                "{}: ffprobe exited with {}: {}",
                path.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        ProbeOutput::from_json(&String::from_utf8_lossy(&output.stdout))
    }
}

/// The original track plus its candidate ads
#[derive(Debug, Clone)]
pub struct MediaCatalog {
    original: AudioAsset,
    ads: Vec<AudioAsset>,
}

impl MediaCatalog {
    /// Probe the music track and every ad in `ads_dir`
    ///
    /// Ads are the regular, non-hidden files of `ads_dir` in file name order,
    /// excluding the music track itself. Files that do not validate as audio
    /// are skipped. The music track must validate, and at least one ad must
    /// survive.
    pub async fn load(music_track: &Path, ads_dir: &Path, prober: &dyn MediaProber) -> Result<Self> {
        let original = probe_asset(music_track, prober).await?;
        info!(
            track = %original.key,
            duration_seconds = original.duration_seconds,
            size_bytes = original.size_bytes,
            "Loaded music track"
        );

        let music_canonical = tokio::fs::canonicalize(music_track).await.ok();
        let mut ads = Vec::new();
        for path in list_ad_files(ads_dir, music_canonical.as_deref()).await? {
            match probe_asset(&path, prober).await {
                Ok(asset) => {
                    debug!(ad = %asset.key, duration_seconds = asset.duration_seconds, "Loaded ad");
                    ads.push(asset);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping ad"),
            }
        }

        Self::from_assets(original, ads)
    }

    /// Build a catalog from already validated assets
    pub fn from_assets(original: AudioAsset, ads: Vec<AudioAsset>) -> Result<Self> {
        if ads.is_empty() {
            return Err(Error::Config("no usable ads found".to_string()));
        }
        info!(ads = ads.len(), "Media catalog ready");
        Ok(Self { original, ads })
    }

    pub fn original(&self) -> &AudioAsset {
        &self.original
    }

    pub fn ads(&self) -> &[AudioAsset] {
        &self.ads
    }

    pub fn ad_by_key(&self, key: &str) -> Option<&AudioAsset> {
        self.ads.iter().find(|ad| ad.key == key)
    }

    /// Pick an ad uniformly at random
    pub fn random_ad(&self) -> &AudioAsset {
        // from_assets guarantees at least one ad
        self.ads.choose(&mut rand::thread_rng()).unwrap_or(&self.ads[0])
    }

    /// Byte size every served episode is padded to
    ///
    /// `min(original + largest ad, original × 1.10)`
    pub fn target_size_bytes(&self) -> u64 {
        let largest_ad = self.ads.iter().map(|ad| ad.size_bytes).max().unwrap_or(0);
        let grown = (self.original.size_bytes as f64 * TARGET_GROWTH_FACTOR) as u64;
        self.original.size_bytes.saturating_add(largest_ad).min(grown)
    }
}

async fn probe_asset(path: &Path, prober: &dyn MediaProber) -> Result<AudioAsset> {
    let probe = prober.probe(path).await?;
    AudioAsset::from_probe(path, &probe)
}

/// Candidate ad files in `ads_dir`, sorted, never including `music_track`
async fn list_ad_files(ads_dir: &Path, music_track: Option<&Path>) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(ads_dir)
        .await
        .map_err(|e| Error::Config(format!("cannot read ads directory {}: {}", ads_dir.display(), e)))?;

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if hidden || !entry.file_type().await?.is_file() {
            continue;
        }
        let path = entry.path();
        if let Some(music_track) = music_track {
            if tokio::fs::canonicalize(&path).await.ok().as_deref() == Some(music_track) {
                debug!(path = %path.display(), "Music track is not an ad");
                continue;
            }
        }
        files.push(path);
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::tests::mp3_probe_json;
    use std::collections::HashMap;
    use std::fs;

    /// Prober answering from a table keyed by file name
    struct TableProber {
        answers: HashMap<String, String>,
    }

    impl TableProber {
        fn new(entries: &[(&str, String)]) -> Self {
            Self {
                answers: entries.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
            }
        }
    }

    #[async_trait]
    impl MediaProber for TableProber {
        async fn probe(&self, path: &Path) -> Result<ProbeOutput> {
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            match self.answers.get(&name) {
                Some(json) => ProbeOutput::from_json(json),
                None => Err(Error::Probe(format!("{} is not media", name))),
            }
        }
    }

    fn asset(key: &str, size: u64) -> AudioAsset {
        let probe = ProbeOutput::from_json(&mp3_probe_json(30.0, size)).unwrap();
        AudioAsset::from_probe(Path::new(key), &probe).unwrap()
    }

    #[tokio::test]
    async fn test_load_skips_hidden_and_invalid_files() {
        let dir = tempfile::tempdir().unwrap();
        let ads_dir = dir.path().join("ads");
        fs::create_dir(&ads_dir).unwrap();
        let music = dir.path().join("music.mp3");
        fs::write(&music, b"x").unwrap();
        for name in ["b.mp3", "a.mp3", ".hidden.mp3", "notes.txt"] {
            fs::write(ads_dir.join(name), b"x").unwrap();
        }
        fs::create_dir(ads_dir.join("nested")).unwrap();

        let prober = TableProber::new(&[
            ("music.mp3", mp3_probe_json(600.0, 9_000_000)),
            ("a.mp3", mp3_probe_json(30.0, 500_000)),
            ("b.mp3", mp3_probe_json(15.0, 250_000)),
            (".hidden.mp3", mp3_probe_json(15.0, 250_000)),
        ]);

        let catalog = MediaCatalog::load(&music, &ads_dir, &prober).await.unwrap();
        let keys: Vec<&str> = catalog.ads().iter().map(|a| a.key.as_str()).collect();
        assert_eq!(keys, vec!["a.mp3", "b.mp3"]);
        assert_eq!(catalog.original().key, "music.mp3");
        assert!(catalog.ad_by_key("b.mp3").is_some());
        assert!(catalog.ad_by_key("notes.txt").is_none());
    }

    #[tokio::test]
    async fn test_load_without_usable_ads_fails() {
        let dir = tempfile::tempdir().unwrap();
        let music = dir.path().join("music.mp3");
        fs::write(&music, b"x").unwrap();
        let prober = TableProber::new(&[("music.mp3", mp3_probe_json(600.0, 9_000_000))]);

        let err = MediaCatalog::load(&music, dir.path(), &prober).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_music_track_in_ads_dir_is_not_an_ad() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["music.mp3", "ad.mp3"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        let prober = TableProber::new(&[
            ("music.mp3", mp3_probe_json(600.0, 9_000_000)),
            ("ad.mp3", mp3_probe_json(30.0, 500_000)),
        ]);

        // Reached through a non-canonical path
        let music = dir.path().join(".").join("music.mp3");
        let catalog = MediaCatalog::load(&music, dir.path(), &prober).await.unwrap();
        let keys: Vec<&str> = catalog.ads().iter().map(|a| a.key.as_str()).collect();
        assert_eq!(keys, vec!["ad.mp3"]);
    }

    #[tokio::test]
    async fn test_load_missing_ads_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let music = dir.path().join("music.mp3");
        let prober = TableProber::new(&[("music.mp3", mp3_probe_json(600.0, 9_000_000))]);

        let err = MediaCatalog::load(&music, &dir.path().join("missing"), &prober).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_target_size_bounded_by_growth_factor() {
        let original = asset("music.mp3", 9_000_000);
        let catalog = MediaCatalog::from_assets(
            original.clone(),
            vec![asset("small.mp3", 400_000), asset("large.mp3", 2_000_000)],
        )
        .unwrap();
        // 9_000_000 + 2_000_000 exceeds 9_900_000
        assert_eq!(catalog.target_size_bytes(), 9_900_000);

        let catalog = MediaCatalog::from_assets(original, vec![asset("small.mp3", 400_000)]).unwrap();
        assert_eq!(catalog.target_size_bytes(), 9_400_000);
    }

    #[test]
    fn test_random_ad_comes_from_catalog() {
        let catalog = MediaCatalog::from_assets(
            asset("music.mp3", 1_000),
            vec![asset("a.mp3", 10), asset("b.mp3", 20)],
        )
        .unwrap();
        for _ in 0..20 {
            let ad = catalog.random_ad();
            assert!(catalog.ad_by_key(&ad.key).is_some());
        }
    }
}
