//! HTTP API handlers for podsplice-server

pub mod episode;
pub mod feed;
pub mod health;
pub mod index;
pub mod range;

pub use episode::episode_routes;
pub use feed::feed_routes;
pub use health::health_routes;
pub use index::index_routes;

use axum::http::{header, HeaderValue};
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;

/// Mark every response of `router` as uncacheable
pub fn no_cache<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache, no-store, must-revalidate"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::PRAGMA,
            HeaderValue::from_static("no-cache"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::EXPIRES,
            HeaderValue::from_static("0"),
        ))
}
