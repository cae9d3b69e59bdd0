//! Maintenance commands: quota overview, archiving, cache purges, and
//! inference refresh.

use std::path::Path;

use tokio::runtime::Runtime;

use super::resolve::{build_resolver, open_pool};
use crate::config::Config;
use crate::quota::QuotaOp;

/// Show quota configuration and the operation cost table
pub fn cmd_quota() -> anyhow::Result<()> {
    let config = Config::load();
    println!("Daily budget: {} units", config.quota.daily_budget);
    println!("Costs per call:");
    for op in [
        QuotaOp::Search,
        QuotaOp::Related,
        QuotaOp::Trending,
        QuotaOp::Detail,
        QuotaOp::AudioStream,
    ] {
        println!("  {:?}: {}", op, op.unit_cost());
    }
    println!();
    println!("Bands: <50% low, <80% medium, <95% high, >=95% critical");
    Ok(())
}

/// Archive a local audio file into the object store
pub fn cmd_archive(
    rt: &Runtime,
    db_path: &Path,
    external_id: &str,
    file: &Path,
) -> anyhow::Result<()> {
    let data = std::fs::read(file)?;
    rt.block_on(async {
        let pool = open_pool(db_path).await?;
        let config = Config::load();
        let resolver = build_resolver(pool, &config);

        resolver.archive_audio(external_id, &data).await?;
        println!("Archived {} ({} bytes)", external_id, data.len());
        Ok(())
    })
}

/// Drop cached playable references for a track
pub fn cmd_purge(rt: &Runtime, db_path: &Path, external_id: &str) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = open_pool(db_path).await?;
        let config = Config::load();
        let resolver = build_resolver(pool, &config);

        resolver.purge_cached(external_id).await?;
        println!("Purged cached references for {external_id}");
        Ok(())
    })
}

/// Re-run vibe inference for a stored track
pub fn cmd_reinfer(rt: &Runtime, db_path: &Path, external_id: &str) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = open_pool(db_path).await?;
        let config = Config::load();
        let resolver = build_resolver(pool, &config);

        let track = resolver.refresh_inference(external_id).await?;
        println!(
            "{}: genres [{}], language {}, culture [{}]",
            external_id,
            track.genres.join(", "),
            track.language,
            track.culture_tags.join(", ")
        );
        Ok(())
    })
}
