//! The fallback ladder: something always plays.
//!
//! When the pipeline produces nothing (cold-start graph, a vibe filter
//! that eliminated everyone, every source erroring), three rungs are
//! tried in order:
//!
//! 1. unplayed popular tracks sharing a genre with the current track
//! 2. any unplayed popular track
//! 3. any track at all
//!
//! The pick is uniform among the first non-empty rung's top ten by
//! popularity. Only a genuinely empty catalog is an error, and that is
//! the sole fatal outcome of recommendation.

use sqlx::sqlite::SqlitePool;

use super::context::SessionContext;
use super::selection::Randomness;
use crate::db;
use crate::error::{Error, Result};
use crate::model::Track;

/// Rung pool size for the uniform pick.
const RUNG_POOL: usize = 10;

/// How deep into the popular catalog each rung looks.
const FETCH_LIMIT: i64 = 200;

pub async fn fallback_track(
    pool: &SqlitePool,
    ctx: &SessionContext,
    rng: &dyn Randomness,
) -> Result<Track> {
    let popular = db::top_tracks_by_views(pool, FETCH_LIMIT).await?;
    if popular.is_empty() {
        return Err(Error::Exhaustion);
    }

    let unplayed_shared_genre: Vec<&Track> = popular
        .iter()
        .filter(|t| t.id != ctx.current.id && ctx.plays_of(t.id) == 0)
        .filter(|t| t.genres.iter().any(|g| ctx.current.genres.contains(g)))
        .collect();
    let unplayed: Vec<&Track> = popular
        .iter()
        .filter(|t| t.id != ctx.current.id && ctx.plays_of(t.id) == 0)
        .collect();
    let anything: Vec<&Track> = popular.iter().collect();

    let (rung, name) = if !unplayed_shared_genre.is_empty() {
        (unplayed_shared_genre, "genre")
    } else if !unplayed.is_empty() {
        (unplayed, "unplayed")
    } else {
        (anything, "any")
    };
    tracing::info!(rung = name, pool = rung.len(), "fallback ladder engaged");

    let pool_size = rung.len().min(RUNG_POOL);
    let idx = ((rng.roll() * pool_size as f64) as usize).min(pool_size - 1);
    Ok(rung[idx].clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FixedRandomness, insert_track, temp_db};

    #[tokio::test]
    async fn test_empty_catalog_is_exhaustion() {
        let (pool, _dir) = temp_db().await;
        let ctx = SessionContext::anonymous(
            "s",
            crate::test_utils::mock_track(999, "ghost"),
            20,
        );
        let rng = FixedRandomness::new(&[0.0]);
        assert!(matches!(
            fallback_track(&pool, &ctx, &rng).await,
            Err(Error::Exhaustion)
        ));
    }

    #[tokio::test]
    async fn test_first_rung_prefers_shared_genre() {
        let (pool, _dir) = temp_db().await;
        let current = insert_track(&pool, "cur", |t| {
            t.genres = vec!["kompa".into()];
        })
        .await;
        let same = insert_track(&pool, "same", |t| {
            t.genres = vec!["kompa".into()];
            t.view_count = 100;
        })
        .await;
        insert_track(&pool, "other", |t| {
            t.genres = vec!["rock".into()];
            t.view_count = 1_000_000;
        })
        .await;

        let ctx = SessionContext::anonymous("s", current, 20);
        let rng = FixedRandomness::new(&[0.0]);
        let track = fallback_track(&pool, &ctx, &rng).await.unwrap();
        assert_eq!(track.id, same.id);
    }

    #[tokio::test]
    async fn test_second_rung_when_no_genre_match() {
        let (pool, _dir) = temp_db().await;
        let current = insert_track(&pool, "cur", |t| {
            t.genres = vec!["kompa".into()];
        })
        .await;
        let other = insert_track(&pool, "other", |t| {
            t.genres = vec!["rock".into()];
        })
        .await;

        let ctx = SessionContext::anonymous("s", current, 20);
        let rng = FixedRandomness::new(&[0.0]);
        let track = fallback_track(&pool, &ctx, &rng).await.unwrap();
        assert_eq!(track.id, other.id);
    }

    #[tokio::test]
    async fn test_last_rung_allows_replays() {
        let (pool, _dir) = temp_db().await;
        let current = insert_track(&pool, "cur", |t| {
            t.genres = vec!["kompa".into()];
        })
        .await;
        let played = insert_track(&pool, "played", |t| {
            t.genres = vec!["rock".into()];
        })
        .await;

        let mut ctx = SessionContext::anonymous("s", current, 20);
        ctx.play_counts.insert(played.id, 3);

        // Everything but the current track has been played; rung 3 still
        // returns something rather than exhausting.
        let rng = FixedRandomness::new(&[0.0]);
        let track = fallback_track(&pool, &ctx, &rng).await.unwrap();
        assert!(track.id == played.id || track.id == ctx.current.id);
    }
}
