//! Upstream provider HTTP client.
//!
//! Speaks the provider's JSON API for search, trending, detail, related
//! lookup, and audio-stream extraction. Quota accounting is the caller's
//! responsibility (documented contract of
//! [`QuotaTracker`](crate::quota::QuotaTracker)); this client only maps
//! transport and status errors into the crate taxonomy:
//!
//! - 404 -> [`Error::NotFound`]
//! - 401/403 with a key problem -> [`Error::Configuration`]
//! - 429 and 5xx -> [`Error::TransientProvider`]
//! - undecodable body -> [`Error::DataIntegrity`]

use serde::de::DeserializeOwned;

use super::{StreamInfo, UpstreamTrack, adapter, dto};
use crate::error::{Error, Result};

/// User agent sent on every request.
const USER_AGENT: &str = concat!("RadioEngine/", env!("CARGO_PKG_VERSION"));

/// Upstream API client.
pub struct UpstreamClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl UpstreamClient {
    /// Create a new client. Fails if no API key is configured, which
    /// permanently disables the upstream tier for this process.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::configuration("upstream API key is not set"));
        }
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            base_url: "https://provider.invalid/api/v3".to_string(),
            api_key,
        })
    }

    /// Create a client for testing with a custom base URL.
    #[cfg(test)]
    pub fn with_base_url(api_key: &str, base_url: impl Into<String>) -> Self {
        let mut client = Self::new(api_key).expect("test client");
        client.base_url = base_url.into();
        client
    }

    /// Full-text search. Metered: [`QuotaOp::Search`](crate::quota::QuotaOp).
    pub async fn search(&self, query: &str, max_results: u32) -> Result<Vec<UpstreamTrack>> {
        let url = format!(
            "{}/search?part=snippet&type=video&q={}&maxResults={}&key={}",
            self.base_url,
            urlencoding::encode(query),
            max_results,
            self.api_key
        );
        let response: dto::SearchResponse = self.get_json(&url).await?;
        Ok(response
            .items
            .into_iter()
            .filter_map(adapter::from_search_item)
            .collect())
    }

    /// Trending feed. Metered: [`QuotaOp::Trending`](crate::quota::QuotaOp).
    pub async fn trending(&self, max_results: u32) -> Result<Vec<UpstreamTrack>> {
        let url = format!(
            "{}/videos?part=snippet,contentDetails,statistics&chart=mostPopular&videoCategoryId=10&maxResults={}&key={}",
            self.base_url, max_results, self.api_key
        );
        let response: dto::VideoListResponse = self.get_json(&url).await?;
        Ok(response
            .items
            .into_iter()
            .filter_map(adapter::from_video_item)
            .collect())
    }

    /// Detail lookup for a batch of ids. Metered per item:
    /// [`QuotaOp::Detail`](crate::quota::QuotaOp).
    pub async fn detail(&self, external_ids: &[String]) -> Result<Vec<UpstreamTrack>> {
        if external_ids.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!(
            "{}/videos?part=snippet,contentDetails,statistics&id={}&key={}",
            self.base_url,
            external_ids.join(","),
            self.api_key
        );
        let response: dto::VideoListResponse = self.get_json(&url).await?;
        Ok(response
            .items
            .into_iter()
            .filter_map(adapter::from_video_item)
            .collect())
    }

    /// Tracks related to the given id. Metered like a search:
    /// [`QuotaOp::Related`](crate::quota::QuotaOp).
    pub async fn related_by(&self, external_id: &str, max_results: u32) -> Result<Vec<UpstreamTrack>> {
        let url = format!(
            "{}/search?part=snippet&type=video&relatedToVideoId={}&maxResults={}&key={}",
            self.base_url,
            urlencoding::encode(external_id),
            max_results,
            self.api_key
        );
        let response: dto::SearchResponse = self.get_json(&url).await?;
        Ok(response
            .items
            .into_iter()
            .filter_map(adapter::from_search_item)
            .collect())
    }

    /// Extract a playable audio stream URL. Unmetered (resolved outside
    /// the quota'd API), but rate-limited like everything else.
    pub async fn audio_stream(&self, external_id: &str) -> Result<StreamInfo> {
        let url = format!(
            "{}/streams/{}?key={}",
            self.base_url,
            urlencoding::encode(external_id),
            self.api_key
        );
        let response: dto::StreamResponse = self.get_json(&url).await?;
        let expires_at = chrono::Utc::now() + chrono::Duration::seconds(response.expires_in_secs);
        Ok(StreamInfo {
            url: response.url,
            format: response.format,
            expires_at,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::transient(format!("request failed: {e}")))?;

        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::not_found("upstream resource"));
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::configuration("upstream rejected the API key"));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(Error::transient(format!("HTTP {status}")));
        }
        if !status.is_success() {
            if let Ok(api_error) = response.json::<dto::ApiError>().await {
                // The provider reports budget exhaustion as 403; treat it
                // as transient since the epoch will roll.
                if api_error.error.message.to_lowercase().contains("quota") {
                    return Err(Error::transient(api_error.error.message));
                }
                return Err(Error::integrity(format!(
                    "upstream error {}: {}",
                    api_error.error.code, api_error.error.message
                )));
            }
            return Err(Error::transient(format!(
                "HTTP {}: {}",
                status,
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| Error::integrity(format!("undecodable upstream response: {e}")))
    }
}
