//! Search and resolution commands, plus shared wiring helpers.

use std::path::Path;
use std::sync::Arc;

use tokio::runtime::Runtime;
use tracing::warn;

use crate::config::Config;
use crate::db;
use crate::quota::{Clock, QuotaTracker, SystemClock};
use crate::resolve::Resolver;
use crate::resolve::tiers::DiskObjectStore;
use crate::upstream::UpstreamClient;

/// Open (and migrate) the database at `path`.
pub(super) async fn open_pool(path: &Path) -> anyhow::Result<sqlx::SqlitePool> {
    let url = db::db_url(Some(path));
    let pool = db::init_db(&url).await?;
    tracing::debug!("catalog contains {} tracks", db::track_count(&pool).await?);
    Ok(pool)
}

/// Wire a resolver from configuration. Missing credentials disable the
/// corresponding tier with a warning rather than failing the command.
pub(super) fn build_resolver(pool: sqlx::SqlitePool, config: &Config) -> Resolver {
    let quota = Arc::new(QuotaTracker::with_system_clock(config.quota.daily_budget));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let mut resolver = Resolver::new(pool, quota, clock)
        .with_config(config.resolution.clone(), config.match_scoring.clone());

    match &config.credentials.upstream_api_key {
        Some(key) => match UpstreamClient::new(key.clone()) {
            Ok(client) => resolver = resolver.with_upstream(Arc::new(client)),
            Err(e) => warn!("upstream tier disabled: {}", e),
        },
        None => warn!("upstream tier disabled: no API key configured"),
    }

    if let (Some(secret), Some(dir)) = (
        &config.credentials.object_store_secret,
        &config.resolution.object_store_dir,
    ) {
        match DiskObjectStore::new(dir.clone(), secret.clone()) {
            Ok(store) => resolver = resolver.with_object_store(Arc::new(store)),
            Err(e) => warn!("object store tier disabled: {}", e),
        }
    }

    resolver
}

/// Search for tracks
pub fn cmd_search(rt: &Runtime, db_path: &Path, query: &str, max: u32) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = open_pool(db_path).await?;
        let config = Config::load();
        let resolver = build_resolver(pool, &config);

        let tracks = resolver.search(query, max).await?;
        if tracks.is_empty() {
            println!("No results for \"{query}\"");
            return Ok(());
        }
        for track in tracks {
            println!(
                "{}  {} - {} [{}] ({} views)",
                track.external_id,
                track.artist,
                track.title,
                track.language,
                track.view_count
            );
        }
        Ok(())
    })
}

/// Resolve a playable reference
pub fn cmd_resolve(rt: &Runtime, db_path: &Path, external_id: &str) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = open_pool(db_path).await?;
        let config = Config::load();

        let (tx, rx) = crate::events::backfill_channel();
        let worker = crate::events::spawn_backfill_worker(
            rx,
            pool.clone(),
            None,
            config.resolution.cached_url_ttl_secs,
        );
        let resolver = build_resolver(pool, &config).with_backfill(tx);

        let resolution = resolver.resolve_audio(external_id).await?;
        println!("tier:    {}", resolution.tier.as_str());
        println!("format:  {}", resolution.format);
        println!("expires: {}", resolution.expires_at.to_rfc3339());
        println!("{}", resolution.url);

        // Let the backfill drain before the process exits.
        drop(resolver);
        worker.await?;
        Ok(())
    })
}
