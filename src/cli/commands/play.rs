//! Recommendation and transition-log commands.

use std::path::Path;

use anyhow::bail;
use chrono::Utc;
use tokio::runtime::Runtime;

use super::resolve::open_pool;
use crate::config::Config;
use crate::db;
use crate::graph;
use crate::model::{TransitionRecord, TransitionSource};
use crate::recommend::{RecommendEngine, SessionContext};

/// Recommend the next track
pub fn cmd_next(rt: &Runtime, db_path: &Path, external_id: &str, session: &str) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = open_pool(db_path).await?;
        let config = Config::load();

        let Some(current) = db::find_track_by_external_id(&pool, external_id).await? else {
            bail!("unknown track: {external_id}");
        };
        let ctx = SessionContext::anonymous(
            session,
            current,
            config.recommendation.recent_history_limit,
        );

        let engine = RecommendEngine::new(pool, config.recommendation.clone());
        let rec = engine.next_track(&ctx).await?;

        println!(
            "-> {}  {} - {}  [{}] score {:.0}",
            rec.track.external_id,
            rec.track.artist,
            rec.track.title,
            rec.method.as_str(),
            rec.score
        );
        for (track, score) in rec.alternatives.iter().filter(|(t, _)| t.id != rec.track.id) {
            println!(
                "   {}  {} - {}  score {:.0}",
                track.external_id, track.artist, track.title, score
            );
        }
        Ok(())
    })
}

/// Record an observed transition
pub fn cmd_record(
    rt: &Runtime,
    db_path: &Path,
    from: &str,
    to: &str,
    session: &str,
    skipped: bool,
    source: &str,
) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = open_pool(db_path).await?;

        let Some(from_track) = db::find_track_by_external_id(&pool, from).await? else {
            bail!("unknown track: {from}");
        };
        let Some(to_track) = db::find_track_by_external_id(&pool, to).await? else {
            bail!("unknown track: {to}");
        };

        let record = TransitionRecord {
            from_track_id: from_track.id,
            to_track_id: to_track.id,
            session_id: session.to_string(),
            user_id: None,
            completed: !skipped,
            skipped,
            source: TransitionSource::from_str_lossy(source),
        };
        graph::record(&pool, &record).await?;
        if record.completed {
            db::increment_play_count(&pool, to_track.id).await?;
        }

        println!(
            "Recorded {} -> {}{}",
            from,
            to,
            if skipped { " (skipped)" } else { "" }
        );
        Ok(())
    })
}

/// Show the strongest recent transitions
pub fn cmd_trending(rt: &Runtime, db_path: &Path, hours: i64, max: i64) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = open_pool(db_path).await?;
        let pairs = graph::trending(&pool, hours, max, Utc::now()).await?;
        if pairs.is_empty() {
            println!("No transitions in the last {hours}h");
            return Ok(());
        }

        for pair in pairs {
            let ids = [pair.from_track_id, pair.to_track_id];
            let tracks = db::get_tracks_by_ids(&pool, &ids).await?;
            match tracks.as_slice() {
                [from, to] => println!(
                    "{:>4}x  {} - {}  ->  {} - {}",
                    pair.count, from.artist, from.title, to.artist, to.title
                ),
                _ => println!(
                    "{:>4}x  #{} -> #{}",
                    pair.count, pair.from_track_id, pair.to_track_id
                ),
            }
        }
        Ok(())
    })
}
