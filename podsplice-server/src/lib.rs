//! podsplice-server library interface
//!
//! Exposes the router and shared state so integration tests can drive the
//! HTTP surface without binding a socket.

pub mod api;
pub mod error;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use podsplice_core::config::{FeedConfig, ServerConfig};
use podsplice_core::{MediaCatalog, Splicer};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub splicer: Arc<Splicer>,
    pub catalog: Arc<MediaCatalog>,
    pub feed: Arc<FeedConfig>,
    /// HTML page served at `/`
    pub index_page: PathBuf,
    /// Service start, used for uptime and the feed's publication date
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(splicer: Splicer, catalog: MediaCatalog, feed: FeedConfig) -> Self {
        Self {
            splicer: Arc::new(splicer),
            catalog: Arc::new(catalog),
            feed: Arc::new(feed),
            index_page: ServerConfig::default().index_page,
            startup_time: Utc::now(),
        }
    }

    pub fn with_index_page(mut self, index_page: impl Into<PathBuf>) -> Self {
        self.index_page = index_page.into();
        self
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::index_routes(&state.index_page))
        .merge(api::health_routes())
        .merge(api::episode_routes())
        .merge(api::feed_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
