//! Trait seam for the upstream provider.
//!
//! The resolver and CLI take `impl UpstreamApi` so tests can substitute
//! mocks without a network. The real [`UpstreamClient`] implements the
//! trait by delegation.

use async_trait::async_trait;

use super::{StreamInfo, UpstreamClient, UpstreamTrack};
use crate::error::Result;

/// The rate-limited upstream metadata/audio provider.
#[async_trait]
pub trait UpstreamApi: Send + Sync {
    /// Full-text search.
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<UpstreamTrack>>;

    /// Trending feed.
    async fn trending(&self, max_results: u32) -> Result<Vec<UpstreamTrack>>;

    /// Batched detail lookup.
    async fn detail(&self, external_ids: &[String]) -> Result<Vec<UpstreamTrack>>;

    /// Tracks related to the given id.
    async fn related_by(&self, external_id: &str, max_results: u32)
    -> Result<Vec<UpstreamTrack>>;

    /// Resolve a time-bounded audio stream.
    async fn audio_stream(&self, external_id: &str) -> Result<StreamInfo>;
}

#[async_trait]
impl UpstreamApi for UpstreamClient {
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<UpstreamTrack>> {
        UpstreamClient::search(self, query, max_results).await
    }

    async fn trending(&self, max_results: u32) -> Result<Vec<UpstreamTrack>> {
        UpstreamClient::trending(self, max_results).await
    }

    async fn detail(&self, external_ids: &[String]) -> Result<Vec<UpstreamTrack>> {
        UpstreamClient::detail(self, external_ids).await
    }

    async fn related_by(
        &self,
        external_id: &str,
        max_results: u32,
    ) -> Result<Vec<UpstreamTrack>> {
        UpstreamClient::related_by(self, external_id, max_results).await
    }

    async fn audio_stream(&self, external_id: &str) -> Result<StreamInfo> {
        UpstreamClient::audio_stream(self, external_id).await
    }
}

/// Mock upstream clients for testing.
#[cfg(test)]
pub mod mocks {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::error::Error;

    /// Mock upstream that returns predefined results and counts calls.
    #[derive(Default)]
    pub struct MockUpstream {
        pub search_results: Vec<UpstreamTrack>,
        pub trending_results: Vec<UpstreamTrack>,
        pub related_results: Vec<UpstreamTrack>,
        pub stream: Option<StreamInfo>,
        /// When set, every call fails with a transient error.
        pub down: bool,
        pub stream_calls: AtomicU32,
        pub search_calls: AtomicU32,
    }

    impl MockUpstream {
        pub fn healthy() -> Self {
            Self::default()
        }

        pub fn offline() -> Self {
            Self {
                down: true,
                ..Self::default()
            }
        }

        pub fn with_stream(url: &str, expires_at: chrono::DateTime<chrono::Utc>) -> Self {
            Self {
                stream: Some(StreamInfo {
                    url: url.to_string(),
                    format: "m4a".to_string(),
                    expires_at,
                }),
                ..Self::default()
            }
        }

        fn fail_if_down(&self) -> Result<()> {
            if self.down {
                Err(Error::transient("mock upstream offline"))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl UpstreamApi for MockUpstream {
        async fn search(&self, _query: &str, max_results: u32) -> Result<Vec<UpstreamTrack>> {
            self.search_calls.fetch_add(1, Ordering::SeqCst);
            self.fail_if_down()?;
            Ok(self
                .search_results
                .iter()
                .take(max_results as usize)
                .cloned()
                .collect())
        }

        async fn trending(&self, max_results: u32) -> Result<Vec<UpstreamTrack>> {
            self.fail_if_down()?;
            Ok(self
                .trending_results
                .iter()
                .take(max_results as usize)
                .cloned()
                .collect())
        }

        async fn detail(&self, external_ids: &[String]) -> Result<Vec<UpstreamTrack>> {
            self.fail_if_down()?;
            Ok(self
                .search_results
                .iter()
                .filter(|t| external_ids.contains(&t.external_id))
                .cloned()
                .collect())
        }

        async fn related_by(
            &self,
            _external_id: &str,
            max_results: u32,
        ) -> Result<Vec<UpstreamTrack>> {
            self.fail_if_down()?;
            Ok(self
                .related_results
                .iter()
                .take(max_results as usize)
                .cloned()
                .collect())
        }

        async fn audio_stream(&self, external_id: &str) -> Result<StreamInfo> {
            self.stream_calls.fetch_add(1, Ordering::SeqCst);
            self.fail_if_down()?;
            self.stream
                .clone()
                .ok_or_else(|| Error::not_found(external_id))
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_mock_offline_fails_transient() {
            let mock = MockUpstream::offline();
            let result = mock.search("q", 5).await;
            assert!(matches!(result, Err(Error::TransientProvider(_))));
        }

        #[tokio::test]
        async fn test_mock_stream() {
            let expires = chrono::Utc::now() + chrono::Duration::hours(1);
            let mock = MockUpstream::with_stream("https://cdn.example/a.m4a", expires);
            let info = mock.audio_stream("abc").await.unwrap();
            assert_eq!(info.url, "https://cdn.example/a.m4a");
            assert_eq!(mock.stream_calls.load(Ordering::SeqCst), 1);
        }
    }
}
