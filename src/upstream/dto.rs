//! Wire shapes for the upstream provider API.
//!
//! These mirror the provider's JSON exactly and go no further than this
//! module's siblings: [`super::adapter`] converts them into
//! [`UpstreamTrack`](super::UpstreamTrack) before anything else sees them.

use serde::Deserialize;

/// Search endpoint response.
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
pub struct SearchItem {
    pub id: SearchItemId,
    pub snippet: Snippet,
}

#[derive(Debug, Deserialize)]
pub struct SearchItemId {
    #[serde(rename = "videoId")]
    pub video_id: Option<String>,
}

/// Video list endpoint response (detail and trending).
#[derive(Debug, Deserialize)]
pub struct VideoListResponse {
    #[serde(default)]
    pub items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
pub struct VideoItem {
    pub id: String,
    pub snippet: Snippet,
    #[serde(rename = "contentDetails")]
    pub content_details: Option<ContentDetails>,
    pub statistics: Option<Statistics>,
}

#[derive(Debug, Deserialize)]
pub struct Snippet {
    #[serde(default)]
    pub title: String,
    #[serde(rename = "channelId", default)]
    pub channel_id: String,
    #[serde(rename = "channelTitle", default)]
    pub channel_title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "publishedAt")]
    pub published_at: Option<String>,
    pub thumbnails: Option<Thumbnails>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct Thumbnails {
    pub medium: Option<Thumbnail>,
    pub default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
pub struct Thumbnail {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct ContentDetails {
    /// ISO-8601 duration, e.g. "PT3M20S"
    #[serde(default)]
    pub duration: String,
}

#[derive(Debug, Deserialize)]
pub struct Statistics {
    /// The provider serializes counts as strings
    #[serde(rename = "viewCount")]
    pub view_count: Option<String>,
}

/// Audio extraction endpoint response.
#[derive(Debug, Deserialize)]
pub struct StreamResponse {
    pub url: String,
    #[serde(default = "default_format")]
    pub format: String,
    /// Seconds until the signed URL expires
    #[serde(rename = "expiresInSecs", default = "default_expiry_secs")]
    pub expires_in_secs: i64,
}

fn default_format() -> String {
    "m4a".to_string()
}

fn default_expiry_secs() -> i64 {
    6 * 3600
}

/// Error envelope used by the provider on non-2xx responses.
#[derive(Debug, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}
