//! Post-commit events for slow background work.
//!
//! The resolution hot path never blocks on cache writes: a successful
//! upstream resolution emits a [`BackfillEvent`] over a bounded channel
//! and returns immediately. A separate worker task consumes the channel
//! and writes the distributed-cache and database tiers. Worker failures
//! are logged and never surfaced; a full channel drops the event (the
//! next resolution will simply miss and re-resolve).

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::SqlitePool;
use tokio::sync::mpsc;

use crate::db;
use crate::resolve::tiers::{DistributedCache, audio_cache_key};
use crate::resolve::CachedAudio;

/// Default bound for the backfill channel.
pub const BACKFILL_CHANNEL_CAPACITY: usize = 64;

/// A resolution worth persisting into the warm tiers.
#[derive(Debug, Clone)]
pub enum BackfillEvent {
    AudioResolved {
        external_id: String,
        url: String,
        format: String,
        expires_at: DateTime<Utc>,
    },
}

/// Create the backfill channel.
pub fn backfill_channel() -> (mpsc::Sender<BackfillEvent>, mpsc::Receiver<BackfillEvent>) {
    mpsc::channel(BACKFILL_CHANNEL_CAPACITY)
}

/// Fire-and-forget send. A full or closed channel is logged and ignored.
pub fn emit(sender: &mpsc::Sender<BackfillEvent>, event: BackfillEvent) {
    if let Err(e) = sender.try_send(event) {
        tracing::warn!("backfill event dropped: {}", e);
    }
}

/// Spawn the worker that applies backfill events to tiers 2-3.
///
/// Cached entries never outlive `max_ttl_secs`, even when the upstream
/// hands out a longer-lived URL. Runs until every sender is dropped;
/// per-event failures are logged and skipped.
pub fn spawn_backfill_worker(
    mut receiver: mpsc::Receiver<BackfillEvent>,
    pool: SqlitePool,
    cache: Option<Arc<dyn DistributedCache>>,
    max_ttl_secs: i64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = receiver.recv().await {
            apply_event(&pool, cache.as_deref(), event, max_ttl_secs).await;
        }
        tracing::debug!("backfill worker stopped");
    })
}

async fn apply_event(
    pool: &SqlitePool,
    cache: Option<&dyn DistributedCache>,
    event: BackfillEvent,
    max_ttl_secs: i64,
) {
    match event {
        BackfillEvent::AudioResolved {
            external_id,
            url,
            format,
            expires_at,
        } => {
            let expires_at = expires_at.min(Utc::now() + Duration::seconds(max_ttl_secs));
            if let Some(cache) = cache {
                let payload = CachedAudio {
                    url: url.clone(),
                    format: format.clone(),
                    expires_at,
                };
                match serde_json::to_string(&payload) {
                    Ok(json) => {
                        let ttl = (expires_at - Utc::now())
                            .to_std()
                            .unwrap_or(std::time::Duration::ZERO);
                        if let Err(e) = cache.set(&audio_cache_key(&external_id), &json, ttl).await
                        {
                            tracing::warn!("cache backfill failed for {}: {}", external_id, e);
                        }
                    }
                    Err(e) => tracing::warn!("unencodable backfill payload: {}", e),
                }
            }

            if let Err(e) = db::set_cached_audio(pool, &external_id, &url, expires_at).await {
                tracing::warn!("database backfill failed for {}: {}", external_id, e);
            }
        }
    }
}
