//! The tiered resolver.
//!
//! Walks the tier chain for audio resolution and fronts the upstream
//! search with quota-aware degradation. See the module docs of
//! [`crate::resolve`] for the chain order.

use std::sync::Arc;

use chrono::Duration;
use sqlx::sqlite::SqlitePool;
use tokio::sync::mpsc;

use super::tiers::{DistributedCache, ObjectStore, audio_cache_key};
use super::{CachedAudio, Resolution, Tier, fallback_embed_url};
use crate::canonical::{self, CanonicalApi};
use crate::config::{MatchScoringConfig, ResolutionConfig};
use crate::db;
use crate::error::{Error, Result, ResultExt};
use crate::events::{self, BackfillEvent};
use crate::inference;
use crate::model::Track;
use crate::quota::{Clock, PriorityLevel, QuotaOp, QuotaTracker};
use crate::upstream::{UpstreamApi, adapter, with_retries};

/// Archive format used for object-store copies.
const ARCHIVE_FORMAT: &str = "m4a";

/// How long a fallback embed reference is considered valid.
const FALLBACK_TTL_HOURS: i64 = 24;

/// Tiered resolution front.
///
/// Every collaborator except the database is optional: a tier whose
/// credentials are missing is disabled for the process lifetime and the
/// chain simply skips it.
pub struct Resolver {
    pool: SqlitePool,
    object_store: Option<Arc<dyn ObjectStore>>,
    cache: Option<Arc<dyn DistributedCache>>,
    upstream: Option<Arc<dyn UpstreamApi>>,
    canonical: Option<Arc<dyn CanonicalApi>>,
    quota: Arc<QuotaTracker>,
    clock: Arc<dyn Clock>,
    backfill: Option<mpsc::Sender<BackfillEvent>>,
    config: ResolutionConfig,
    match_config: MatchScoringConfig,
}

impl Resolver {
    pub fn new(pool: SqlitePool, quota: Arc<QuotaTracker>, clock: Arc<dyn Clock>) -> Self {
        Self {
            pool,
            object_store: None,
            cache: None,
            upstream: None,
            canonical: None,
            quota,
            clock,
            backfill: None,
            config: ResolutionConfig::default(),
            match_config: MatchScoringConfig::default(),
        }
    }

    pub fn with_object_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.object_store = Some(store);
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn DistributedCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_upstream(mut self, upstream: Arc<dyn UpstreamApi>) -> Self {
        self.upstream = Some(upstream);
        self
    }

    pub fn with_canonical(mut self, canonical: Arc<dyn CanonicalApi>) -> Self {
        self.canonical = Some(canonical);
        self
    }

    pub fn with_backfill(mut self, sender: mpsc::Sender<BackfillEvent>) -> Self {
        self.backfill = Some(sender);
        self
    }

    pub fn with_config(mut self, config: ResolutionConfig, match_config: MatchScoringConfig) -> Self {
        self.config = config;
        self.match_config = match_config;
        self
    }

    // ========================================================================
    // Audio resolution
    // ========================================================================

    /// Resolve a playable reference for a track.
    ///
    /// Has no fatal case: the embeddable fallback reference is the
    /// floor. Even a malformed external id degrades (logged, tiers
    /// skipped) rather than erroring.
    pub async fn resolve_audio(&self, external_id: &str) -> Result<Resolution> {
        if let Err(e) = validate_external_id(external_id) {
            tracing::warn!("skipping resolution tiers: {}", e);
            return Ok(self.fallback_resolution(external_id));
        }

        if let Some(res) = self.try_object_store(external_id).await {
            return Ok(res);
        }
        if let Some(res) = self.try_distributed_cache(external_id).await {
            return Ok(res);
        }
        if let Some(res) = self.try_database_field(external_id).await {
            return Ok(res);
        }
        if let Some(res) = self.try_upstream(external_id).await {
            return Ok(res);
        }

        tracing::info!(external_id, "degrading to embeddable fallback reference");
        Ok(self.fallback_resolution(external_id))
    }

    fn fallback_resolution(&self, external_id: &str) -> Resolution {
        Resolution {
            external_id: external_id.to_string(),
            url: fallback_embed_url(external_id),
            format: "embed".to_string(),
            expires_at: self.clock.now() + Duration::hours(FALLBACK_TTL_HOURS),
            tier: Tier::Fallback,
        }
    }

    /// Tier 1: permanently archived copy behind a signed URL.
    async fn try_object_store(&self, external_id: &str) -> Option<Resolution> {
        let store = self.object_store.as_ref()?;
        match store.head(external_id, ARCHIVE_FORMAT).await {
            Ok(true) => {
                let expires_at =
                    self.clock.now() + Duration::seconds(self.config.signed_url_ttl_secs);
                Some(Resolution {
                    external_id: external_id.to_string(),
                    url: store.signed_url(external_id, ARCHIVE_FORMAT, expires_at),
                    format: ARCHIVE_FORMAT.to_string(),
                    expires_at,
                    tier: Tier::ObjectStore,
                })
            }
            Ok(false) => None,
            Err(e) => {
                tracing::warn!("object store unavailable, falling through: {}", e);
                None
            }
        }
    }

    /// Tier 2: distributed cache.
    async fn try_distributed_cache(&self, external_id: &str) -> Option<Resolution> {
        let cache = self.cache.as_ref()?;
        let key = audio_cache_key(external_id);
        let payload = match cache.get(&key).await {
            Ok(Some(payload)) => payload,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("distributed cache unavailable, falling through: {}", e);
                return None;
            }
        };

        let cached: CachedAudio = match serde_json::from_str(&payload) {
            Ok(cached) => cached,
            Err(e) => {
                tracing::warn!("undecodable cache payload for {}: {}", external_id, e);
                let _ = cache.delete(&key).await;
                return None;
            }
        };

        if cached.is_expired(self.clock.now()) {
            // Expired entries are never served; purge and fall through.
            let _ = cache.delete(&key).await;
            return None;
        }

        Some(Resolution {
            external_id: external_id.to_string(),
            url: cached.url,
            format: cached.format,
            expires_at: cached.expires_at,
            tier: Tier::DistributedCache,
        })
    }

    /// Tier 3: cached field on the track row.
    async fn try_database_field(&self, external_id: &str) -> Option<Resolution> {
        let row = match db::get_cached_audio(&self.pool, external_id).await {
            Ok(row) => row?,
            Err(e) => {
                tracing::warn!("database tier failed, falling through: {}", e);
                return None;
            }
        };

        let (url, expiry) = row;
        let valid = expiry.map(|e| e > self.clock.now()).unwrap_or(false);
        if !valid {
            if let Err(e) = db::clear_cached_audio(&self.pool, external_id).await {
                tracing::warn!("failed to purge expired cached URL: {}", e);
            }
            return None;
        }

        Some(Resolution {
            external_id: external_id.to_string(),
            url,
            format: ARCHIVE_FORMAT.to_string(),
            // Checked above; expiry is present on the valid path
            expires_at: expiry.unwrap_or_else(|| self.clock.now()),
            tier: Tier::Database,
        })
    }

    /// Tier 4: upstream extraction, retried, then backfilled.
    async fn try_upstream(&self, external_id: &str) -> Option<Resolution> {
        let upstream = self.upstream.as_ref()?;

        // Stream extraction is unmetered, but a CRITICAL budget means we
        // stop touching the provider entirely.
        if self.quota.priority_level() == PriorityLevel::Critical {
            tracing::warn!("quota critical; skipping upstream extraction");
            return None;
        }

        let result = with_retries(|| upstream.audio_stream(external_id)).await;
        match result {
            Ok(stream) => {
                self.quota.record(QuotaOp::AudioStream, 1);
                if let Some(sender) = &self.backfill {
                    events::emit(
                        sender,
                        BackfillEvent::AudioResolved {
                            external_id: external_id.to_string(),
                            url: stream.url.clone(),
                            format: stream.format.clone(),
                            expires_at: stream.expires_at,
                        },
                    );
                }
                Some(Resolution {
                    external_id: external_id.to_string(),
                    url: stream.url,
                    format: stream.format,
                    expires_at: stream.expires_at,
                    tier: Tier::Upstream,
                })
            }
            Err(e) => {
                tracing::warn!("upstream extraction failed for {}: {}", external_id, e);
                None
            }
        }
    }

    // ========================================================================
    // Search resolution
    // ========================================================================

    /// Search for tracks, preferring the upstream provider while the
    /// budget allows and degrading to the local catalog otherwise.
    ///
    /// Discovered tracks are upserted into the catalog as a side effect.
    pub async fn search(&self, query: &str, max_results: u32) -> Result<Vec<Track>> {
        let effective = self.shrink_for_priority(max_results);

        let upstream = match &self.upstream {
            Some(upstream) if effective > 0 && self.quota.can_afford(QuotaOp::Search, 1) => {
                upstream
            }
            _ => {
                tracing::info!(query, "search served from local catalog");
                return db::search_tracks(&self.pool, query, max_results as i64)
                    .await
                    .map_err(Error::Database);
            }
        };
        let results = match with_retries(|| upstream.search(query, effective)).await {
            Ok(results) => {
                self.quota.record(QuotaOp::Search, 1);
                results
            }
            Err(e) => {
                tracing::warn!("upstream search failed, using local catalog: {}", e);
                return db::search_tracks(&self.pool, query, max_results as i64)
                    .await
                    .map_err(Error::Database);
            }
        };

        let ordered = self.validate_against_canonical(query, results).await;

        let mut tracks = Vec::with_capacity(ordered.len());
        for upstream_track in &ordered {
            let discovered = adapter::to_discovered(upstream_track);
            match db::upsert_track(&self.pool, &discovered).await {
                Ok(id) => {
                    if let Ok(Some(track)) = db::get_track_by_id(&self.pool, id).await {
                        tracks.push(track);
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        "skipping undecodable search result {}: {}",
                        upstream_track.external_id,
                        e
                    );
                }
            }
        }
        Ok(tracks)
    }

    /// Re-rank upstream results against the canonical record for the
    /// query, when a canonical collaborator is configured. Lookup
    /// failures keep the provider's ordering.
    async fn validate_against_canonical(
        &self,
        query: &str,
        results: Vec<crate::upstream::UpstreamTrack>,
    ) -> Vec<crate::upstream::UpstreamTrack> {
        let Some(client) = &self.canonical else {
            return results;
        };
        let record = match client.lookup(query).await {
            Ok(Some(record)) => record,
            Ok(None) => return results,
            Err(e) => {
                tracing::warn!("canonical lookup failed, keeping provider order: {}", e);
                return results;
            }
        };

        let ranked: Vec<_> = canonical::rank_matches(&results, &record, &self.match_config)
            .into_iter()
            .cloned()
            .collect();
        if ranked.is_empty() {
            // Nothing cleared the cutoff; better loose results than none.
            results
        } else {
            ranked
        }
    }

    /// Result-size degradation as the quota band rises.
    fn shrink_for_priority(&self, max_results: u32) -> u32 {
        match self.quota.priority_level() {
            PriorityLevel::Low => max_results,
            PriorityLevel::Medium => max_results.min(10),
            PriorityLevel::High => max_results.min(5),
            PriorityLevel::Critical => 0,
        }
    }

    // ========================================================================
    // Administration
    // ========================================================================

    /// Archive an audio copy into the object store (tier 1).
    pub async fn archive_audio(&self, external_id: &str, data: &[u8]) -> Result<()> {
        validate_external_id(external_id)?;
        let store = self
            .object_store
            .as_ref()
            .ok_or_else(|| Error::configuration("object store tier is disabled"))?;
        store
            .put(external_id, ARCHIVE_FORMAT, data)
            .await
            .with_context(format!("archiving {external_id}"))
    }

    /// Re-run vibe inference over a stored track's text fields and
    /// persist the result. For catalog rows written before the current
    /// pattern tables.
    pub async fn refresh_inference(&self, external_id: &str) -> Result<Track> {
        validate_external_id(external_id)?;
        let track = db::find_track_by_external_id(&self.pool, external_id)
            .await?
            .ok_or_else(|| Error::not_found(external_id))?;

        let profile =
            inference::infer_from_fields(&track.title, &track.artist, &track.channel_name, "");
        db::update_inference(
            &self.pool,
            track.id,
            &profile.genres,
            &profile.language,
            &profile.culture_tags,
        )
        .await
        .with_context(format!("refreshing inference for {external_id}"))?;

        db::get_track_by_id(&self.pool, track.id)
            .await?
            .ok_or_else(|| Error::not_found(external_id))
    }

    /// Drop every cached reference for a track from tiers 2-3.
    pub async fn purge_cached(&self, external_id: &str) -> Result<()> {
        validate_external_id(external_id)?;
        if let Some(cache) = &self.cache
            && let Err(e) = cache.delete(&audio_cache_key(external_id)).await
        {
            tracing::warn!("cache purge failed for {}: {}", external_id, e);
        }
        db::clear_cached_audio(&self.pool, external_id).await?;
        Ok(())
    }
}

/// External ids are provider tokens: short, no whitespace, no path
/// separators. Anything else is a data-integrity problem.
fn validate_external_id(external_id: &str) -> Result<()> {
    let ok = !external_id.is_empty()
        && external_id.len() <= 64
        && external_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(Error::integrity(format!(
            "malformed external id: {external_id:?}"
        )))
    }
}
