//! Spliced episode download

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use tracing::debug;

use super::feed::EPISODE_PATH;
use super::no_cache;
use super::range::{parse_range, ByteRange};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Query parameters for GET /episode.mp3
#[derive(Debug, Deserialize)]
pub struct EpisodeParams {
    /// Ad key (file name); random when absent
    pub ad: Option<String>,
}

/// GET /episode.mp3
///
/// Always `catalog.target_size_bytes()` long, whichever ad is spliced in.
pub async fn get_episode(
    State(state): State<AppState>,
    Query(params): Query<EpisodeParams>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let ad = match params.ad.as_deref() {
        Some(key) => state
            .catalog
            .ad_by_key(key)
            .ok_or_else(|| ApiError::NotFound(format!("Unknown ad: {}", key)))?,
        None => state.catalog.random_ad(),
    };

    let bytes = state
        .splicer
        .splice_and_pad(state.catalog.original(), ad, state.catalog.target_size_bytes())
        .await?;
    let length = bytes.len() as u64;

    let range = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok())
        .map_or(ByteRange::Full, |value| parse_range(value, length));
    debug!(ad = %ad.key, ?range, "Serving episode");

    let (status, body, content_range) = match range {
        ByteRange::Full => (StatusCode::OK, bytes, None),
        ByteRange::Partial { start, end } => (
            StatusCode::PARTIAL_CONTENT,
            bytes.slice(start as usize..=end as usize),
            Some(format!("bytes {}-{}/{}", start, end, length)),
        ),
        ByteRange::Unsatisfiable => return Err(ApiError::RangeNotSatisfiable { length }),
    };

    let body_len = body.len() as u64;
    let mut response = (status, Body::from(body)).into_response();
    let response_headers = response.headers_mut();
    response_headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("audio/mpeg"));
    response_headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    response_headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body_len));
    response_headers.insert(
        header::CONTENT_DISPOSITION,
        attachment(&state.catalog.original().key),
    );
    if let Some(content_range) = content_range {
        let value = HeaderValue::from_str(&content_range)
            .map_err(|e| ApiError::Internal(format!("bad Content-Range: {}", e)))?;
        response_headers.insert(header::CONTENT_RANGE, value);
    }
    Ok(response)
}

/// `attachment; filename="<name>"`, falling back to a generic name when
/// `name` cannot be carried in a header
fn attachment(name: &str) -> HeaderValue {
    let name = name.replace(['"', '\\'], "_");
    HeaderValue::from_str(&format!("attachment; filename=\"{}\"", name))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment; filename=\"episode.mp3\""))
}

/// Build episode routes
pub fn episode_routes() -> Router<AppState> {
    no_cache(Router::new().route(EPISODE_PATH, get(get_episode)))
}
