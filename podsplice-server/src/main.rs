//! podsplice-server - Main entry point
//!
//! Serves a music episode with an ad spliced into the middle, padded so its
//! size always matches the length advertised in the RSS feed.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use podsplice_core::config::{resolve_config_path, Config};
use podsplice_core::{FfmpegEngine, FfprobeProber, MediaCatalog, SpliceSettings, Splicer};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use podsplice_server::{build_router, AppState};

/// Command-line arguments for podsplice-server
#[derive(Parser, Debug)]
#[command(name = "podsplice-server")]
#[command(about = "Size-preserving ad splicing podcast server")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "PODSPLICE_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "PODSPLICE_BIND")]
    bind: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "PODSPLICE_PORT")]
    port: Option<u16>,

    /// Music track ads are spliced into
    #[arg(long, env = "PODSPLICE_MUSIC_TRACK")]
    music_track: Option<PathBuf>,

    /// Directory containing ad files
    #[arg(long, env = "PODSPLICE_ADS_DIR")]
    ads_dir: Option<PathBuf>,

    /// ffmpeg executable
    #[arg(long, env = "PODSPLICE_FFMPEG")]
    ffmpeg: Option<PathBuf>,

    /// ffprobe executable
    #[arg(long, env = "PODSPLICE_FFPROBE")]
    ffprobe: Option<PathBuf>,

    /// Directory for temporary encoder output
    #[arg(long, env = "PODSPLICE_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// HTML page served at `/`
    #[arg(long, env = "PODSPLICE_INDEX_PAGE")]
    index_page: Option<PathBuf>,
}

impl Args {
    /// Command-line values take priority over the file
    fn apply_to(&self, config: &mut Config) {
        if let Some(bind) = &self.bind {
            config.server.bind = bind.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(track) = &self.music_track {
            config.media.music_track = track.clone();
        }
        if let Some(dir) = &self.ads_dir {
            config.media.ads_dir = dir.clone();
        }
        if let Some(ffmpeg) = &self.ffmpeg {
            config.splice.ffmpeg_path = ffmpeg.clone();
        }
        if let Some(ffprobe) = &self.ffprobe {
            config.splice.ffprobe_path = ffprobe.clone();
        }
        if let Some(dir) = &self.work_dir {
            config.splice.work_dir = Some(dir.clone());
        }
        if let Some(page) = &self.index_page {
            config.server.index_page = page.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let (mut config, config_source) =
        Config::load(config_path.as_deref()).context("Failed to load configuration")?;
    args.apply_to(&mut config);

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config_source.is_file() {
        info!("Configuration: {}", config_source);
    } else {
        warn!("Configuration: {}", config_source);
    }

    info!("Music track: {}", config.media.music_track.display());
    info!("Ads directory: {}", config.media.ads_dir.display());

    let prober = FfprobeProber::locate(&config.splice.ffprobe_path).context("ffprobe is required")?;
    let engine = FfmpegEngine::locate(&config.splice.ffmpeg_path).context("ffmpeg is required")?;
    info!("Encoder: {}", engine.program().display());

    let catalog = MediaCatalog::load(&config.media.music_track, &config.media.ads_dir, &prober)
        .await
        .context("Failed to load media")?;
    info!(
        "Target episode size: {} bytes ({} ads)",
        catalog.target_size_bytes(),
        catalog.ads().len()
    );

    let splicer = Splicer::new(Arc::new(engine), SpliceSettings::from(&config.splice));
    info!("Index page: {}", config.server.index_page.display());
    let state =
        AppState::new(splicer, catalog, config.feed.clone()).with_index_page(&config.server.index_page);
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .context("Invalid bind address")?;
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let args = Args::try_parse_from([
            "podsplice-server",
            "--port",
            "9100",
            "--index-page",
            "/srv/podsplice/index.html",
            "--work-dir",
            "/var/tmp/podsplice",
        ])
        .unwrap();

        let mut config = Config::default();
        args.apply_to(&mut config);
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.bind, "127.0.0.1");
        assert_eq!(config.server.index_page, PathBuf::from("/srv/podsplice/index.html"));
        assert_eq!(config.splice.work_dir, Some(PathBuf::from("/var/tmp/podsplice")));
    }
}
