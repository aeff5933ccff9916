//! TOML configuration
//!
//! Every field has a built-in default, so an empty or missing file yields a
//! runnable configuration. Resolution order for the file itself:
//! 1. Explicit path (`--config` flag or `PODSPLICE_CONFIG`)
//! 2. `<config_dir>/podsplice/config.toml`
//! 3. Built-in defaults (missing file is a warning, not an error)
//!
//! Command-line overrides for individual fields are applied by the binary
//! after loading.

use crate::error::{Error, Result};
use crate::fade_curves::FadeCurve;
use crate::timeline::DEFAULT_FADE_SECONDS;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "PODSPLICE_CONFIG";

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub media: MediaConfig,
    pub splice: SpliceConfig,
    pub feed: FeedConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// HTML page served at `/`
    pub index_page: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8000,
            index_page: PathBuf::from("static/index.html"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// The music track ads are spliced into
    pub music_track: PathBuf,
    /// Directory scanned for ad files
    pub ads_dir: PathBuf,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            music_track: PathBuf::from("media/music/track.mp3"),
            ads_dir: PathBuf::from("media/ads"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpliceConfig {
    /// Crossfade length at each splice point
    pub fade_seconds: f64,
    pub fade_curve: FadeCurve,
    /// Upper bound on one encoder run
    pub encode_timeout_secs: u64,
    /// Maximum number of finished splices kept in memory
    pub cache_capacity: usize,
    /// Directory for temporary encoder output (system temp when unset)
    pub work_dir: Option<PathBuf>,
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
}

impl Default for SpliceConfig {
    fn default() -> Self {
        Self {
            fade_seconds: DEFAULT_FADE_SECONDS,
            fade_curve: FadeCurve::default(),
            encode_timeout_secs: 300,
            cache_capacity: 32,
            work_dir: None,
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
        }
    }
}

/// RSS channel metadata
///
/// Episode title and description fall back to the music track's `title` and
/// `comment` tags when unset here.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub title: String,
    pub description: String,
    pub link: String,
    pub language: String,
    pub episode_title: Option<String>,
    pub episode_description: Option<String>,
    /// Public base URL used for the enclosure link; derived from the
    /// request's Host header when unset
    pub base_url: Option<String>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            title: "podsplice".to_string(),
            description: "Music with a word from our sponsors".to_string(),
            link: "http://localhost:8000/".to_string(),
            language: "en".to_string(),
            episode_title: None,
            episode_description: None,
            base_url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when RUST_LOG is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "podsplice_server=info,podsplice_core=info,tower_http=info".to_string(),
        }
    }
}

impl Config {
    /// Parse a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(text).map_err(|e| Error::Config(format!("invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse the file at `path`
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Load configuration following the resolution order
    ///
    /// An explicitly named file must exist. The per-user default file is
    /// optional. Returns where the values came from so the caller can report
    /// it once logging is up.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, ConfigSource)> {
        if let Some(path) = explicit {
            let config = Self::from_file(path)?;
            return Ok((config, ConfigSource::File(path.to_path_buf())));
        }

        match default_config_path() {
            Some(path) if path.exists() => {
                let config = Self::from_file(&path)?;
                Ok((config, ConfigSource::File(path)))
            }
            Some(path) => Ok((Self::default(), ConfigSource::MissingFile(path))),
            None => Ok((Self::default(), ConfigSource::NoConfigDir)),
        }
    }

    /// Reject values no splice could run with
    pub fn validate(&self) -> Result<()> {
        if !self.splice.fade_seconds.is_finite() || self.splice.fade_seconds <= 0.0 {
            return Err(Error::Config(format!(
                "splice.fade_seconds must be positive, got {}",
                self.splice.fade_seconds
            )));
        }
        if self.splice.encode_timeout_secs == 0 {
            return Err(Error::Config("splice.encode_timeout_secs must be at least 1".to_string()));
        }
        if self.splice.cache_capacity == 0 {
            return Err(Error::Config("splice.cache_capacity must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Where [`Config::load`] found its values
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Parsed from this file
    File(PathBuf),
    /// Defaults; the per-user file does not exist
    MissingFile(PathBuf),
    /// Defaults; the platform has no config directory
    NoConfigDir,
}

impl ConfigSource {
    pub fn is_file(&self) -> bool {
        matches!(self, ConfigSource::File(_))
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::MissingFile(path) => write!(f, "defaults ({} not found)", path.display()),
            ConfigSource::NoConfigDir => write!(f, "defaults (no config directory)"),
        }
    }
}

/// Explicit config path: CLI argument first, then `PODSPLICE_CONFIG`
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }
    std::env::var_os(CONFIG_ENV_VAR)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

/// `<config_dir>/podsplice/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("podsplice").join("config.toml"))
}
