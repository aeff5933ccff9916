//! Landing page

use axum::Router;
use std::path::Path;
use tower_http::services::ServeFile;

use super::no_cache;
use crate::AppState;

/// Build index routes: `GET /` serves the HTML page at `index_page`
pub fn index_routes(index_page: &Path) -> Router<AppState> {
    no_cache(Router::new().route_service("/", ServeFile::new(index_page)))
}
