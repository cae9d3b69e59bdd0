//! Upstream metadata/audio provider integration.
//!
//! The provider is rate-limited and cost-metered; everything that talks
//! to it goes through the [`QuotaTracker`](crate::quota::QuotaTracker)
//! owned by the caller. This module only does the wire work:
//!
//! - [`dto`]: raw API response shapes (serde)
//! - [`adapter`]: DTO -> domain conversion, duration/title parsing
//! - [`client`]: reqwest HTTP client
//! - [`traits`]: injectable API trait + test mocks

pub mod adapter;
pub mod client;
pub mod dto;
pub mod traits;

pub use client::UpstreamClient;
pub use traits::UpstreamApi;

use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;

use crate::error::{Error, Result};

/// Track metadata as returned by the upstream provider.
///
/// This is OUR type; API responses are converted into it via
/// [`adapter`] so the rest of the crate never sees wire shapes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpstreamTrack {
    /// Provider-stable external id
    pub external_id: String,
    pub title: String,
    /// Best-effort artist, split from the title when possible
    pub artist: String,
    pub channel_id: String,
    pub channel_name: String,
    pub duration_secs: i64,
    pub thumbnail_url: Option<String>,
    pub view_count: i64,
    pub published_at: Option<DateTime<Utc>>,
    pub description: String,
    pub tags: Vec<String>,
}

/// A resolved, time-bounded audio stream reference.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub url: String,
    pub format: String,
    pub expires_at: DateTime<Utc>,
}

/// Bounded retry attempts for transient upstream failures.
pub const RETRY_ATTEMPTS: u32 = 3;

/// Backoff before each retry, doubling: 1s, 2s, 4s.
pub const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Run an upstream call, retrying transient failures with exponential
/// backoff (1s/2s/4s). Non-transient errors and the final transient
/// failure are returned to the caller, which degrades to a fallback.
pub async fn with_retries<T, F, Fut>(mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = RETRY_BASE_DELAY;
    let mut last_err: Option<Error> = None;

    for attempt in 0..RETRY_ATTEMPTS {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt + 1 < RETRY_ATTEMPTS => {
                tracing::warn!(attempt = attempt + 1, "transient upstream failure: {}", e);
                tokio::time::sleep(delay).await;
                delay *= 2;
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_err.unwrap_or_else(|| Error::transient("retries exhausted")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_retries_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = with_retries(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Error::transient("flaky"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_bounded() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retries(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::transient("always down")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), RETRY_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_non_transient_fails_fast() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retries(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::configuration("no key")) }
        })
        .await;
        assert!(matches!(result, Err(Error::Configuration(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
