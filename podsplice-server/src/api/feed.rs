//! RSS feed advertising the episode
//!
//! The enclosure length is the catalog's target size, which every served
//! episode is padded to, so clients never see a size mismatch.

use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use podsplice_core::config::FeedConfig;
use podsplice_core::AudioAsset;
use rss::extension::itunes::ITunesItemExtensionBuilder;
use rss::{Channel, ChannelBuilder, EnclosureBuilder, GuidBuilder, ItemBuilder};

use crate::AppState;

/// Path the episode is served from
pub const EPISODE_PATH: &str = "/episode.mp3";

/// GET /feed.xml
pub async fn get_feed(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let base_url = state
        .feed
        .base_url
        .clone()
        .or_else(|| {
            headers
                .get(header::HOST)
                .and_then(|host| host.to_str().ok())
                .map(|host| format!("http://{}", host))
        })
        .unwrap_or_else(|| "http://localhost".to_string());

    let channel = build_channel(
        &state.feed,
        state.catalog.original(),
        &base_url,
        state.catalog.target_size_bytes(),
        state.startup_time,
    );
    (
        [(header::CONTENT_TYPE, "application/rss+xml; charset=utf-8")],
        channel.to_string(),
    )
}

/// RSS 2.0 channel with one item for the spliced episode
///
/// Episode title and description come from the feed config, then from the
/// music track's tags, then from the file name and channel description.
pub fn build_channel(
    feed: &FeedConfig,
    original: &AudioAsset,
    base_url: &str,
    enclosure_length: u64,
    published: DateTime<Utc>,
) -> Channel {
    let episode_url = format!("{}{}", base_url.trim_end_matches('/'), EPISODE_PATH);
    let pub_date = published.to_rfc2822();

    let title = feed
        .episode_title
        .clone()
        .or_else(|| original.title.clone())
        .unwrap_or_else(|| original.key.clone());
    let description = feed
        .episode_description
        .clone()
        .or_else(|| original.comment.clone())
        .unwrap_or_else(|| feed.description.clone());

    let enclosure = EnclosureBuilder::default()
        .url(episode_url.clone())
        .length(enclosure_length.to_string())
        .mime_type("audio/mpeg".to_string())
        .build();
    let guid = GuidBuilder::default()
        .value(episode_url.clone())
        .permalink(false)
        .build();
    let itunes = ITunesItemExtensionBuilder::default()
        .duration(Some(format_duration(original.duration_seconds)))
        .build();

    let item = ItemBuilder::default()
        .title(Some(title))
        .description(Some(description))
        .link(Some(episode_url))
        .guid(Some(guid))
        .pub_date(Some(pub_date.clone()))
        .enclosure(Some(enclosure))
        .itunes_ext(Some(itunes))
        .build();

    ChannelBuilder::default()
        .title(feed.title.clone())
        .link(feed.link.clone())
        .description(feed.description.clone())
        .language(Some(feed.language.clone()))
        .last_build_date(Some(pub_date))
        .items(vec![item])
        .build()
}

/// HH:MM:SS
fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

/// Build feed routes
pub fn feed_routes() -> Router<AppState> {
    Router::new().route("/feed.xml", get(get_feed))
}
