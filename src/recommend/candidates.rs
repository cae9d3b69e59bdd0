//! Candidate generation: four sources queried concurrently.
//!
//! Per-source failures degrade to an empty contribution; generation
//! itself only fails if every source is structurally unavailable, which
//! cannot happen with a reachable database.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;

use super::context::SessionContext;
use crate::db;
use crate::graph;
use crate::model::Track;

/// Per-source contribution limits.
pub const GRAPH_LIMIT: i64 = 20;
pub const HISTORY_LIMIT: i64 = 20;
pub const TRENDING_LIMIT: i64 = 10;
pub const RELATED_LIMIT: i64 = 10;

/// Over-fetch factor for the trending source, which is filtered in
/// memory afterwards.
const TRENDING_FETCH: i64 = 50;

/// Where a candidate came from. Order is precedence for cross-source
/// deduplication: a track offered by several sources keeps the
/// highest-precedence attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CandidateSource {
    /// Crowd transition graph from the current track
    Graph,
    /// Tracks matching the user's listening vibe
    UserHistory,
    /// Popular catalog tracks outside the current vibe
    Trending,
    /// Same artist or channel as the current track
    Related,
}

impl CandidateSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Graph => "graph",
            Self::UserHistory => "user_history",
            Self::Trending => "trending",
            Self::Related => "related",
        }
    }
}

/// A track plus the source that proposed it.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub track: Track,
    pub source: CandidateSource,
}

/// Gather candidates from all four sources concurrently.
/// `retention_days` bounds the transition-graph lookback.
pub async fn gather(
    pool: &SqlitePool,
    ctx: &SessionContext,
    retention_days: i64,
    now: DateTime<Utc>,
) -> Vec<Candidate> {
    let (graph, history, trending, related) = tokio::join!(
        from_graph(pool, ctx, retention_days, now),
        from_user_history(pool, ctx),
        from_trending(pool, ctx),
        from_related(pool, ctx),
    );

    let mut out = Vec::new();
    push_all(&mut out, graph, CandidateSource::Graph);
    push_all(&mut out, history, CandidateSource::UserHistory);
    push_all(&mut out, trending, CandidateSource::Trending);
    push_all(&mut out, related, CandidateSource::Related);
    out
}

fn push_all(out: &mut Vec<Candidate>, tracks: Vec<Track>, source: CandidateSource) {
    tracing::debug!(source = source.as_str(), count = tracks.len(), "candidates");
    out.extend(tracks.into_iter().map(|track| Candidate { track, source }));
}

/// Source 1: strongest outgoing edges in the transition graph.
async fn from_graph(
    pool: &SqlitePool,
    ctx: &SessionContext,
    retention_days: i64,
    now: DateTime<Utc>,
) -> Vec<Track> {
    let edges =
        match graph::top_next(pool, ctx.current.id, GRAPH_LIMIT, retention_days, now).await {
            Ok(edges) => edges,
            Err(e) => {
                tracing::warn!("graph source failed: {}", e);
                return Vec::new();
            }
        };
    let ids: Vec<i64> = edges.iter().map(|e| e.to_track_id).collect();
    match db::get_tracks_by_ids(pool, &ids).await {
        Ok(tracks) => tracks,
        Err(e) => {
            tracing::warn!("graph source hydration failed: {}", e);
            Vec::new()
        }
    }
}

/// Source 2: catalog tracks matching the current vibe. Skipped for
/// anonymous sessions, which have no history to personalize against.
async fn from_user_history(pool: &SqlitePool, ctx: &SessionContext) -> Vec<Track> {
    if ctx.anonymous {
        return Vec::new();
    }
    let genre = ctx.current.genres.first().map(String::as_str);
    match db::tracks_matching_vibe(
        pool,
        &ctx.current.language,
        genre,
        ctx.current.id,
        HISTORY_LIMIT,
    )
    .await
    {
        Ok(tracks) => tracks,
        Err(e) => {
            tracing::warn!("user-history source failed: {}", e);
            Vec::new()
        }
    }
}

/// Source 3: popular tracks OUTSIDE the current genres, for discovery.
async fn from_trending(pool: &SqlitePool, ctx: &SessionContext) -> Vec<Track> {
    let popular = match db::top_tracks_by_views(pool, TRENDING_FETCH).await {
        Ok(tracks) => tracks,
        Err(e) => {
            tracing::warn!("trending source failed: {}", e);
            return Vec::new();
        }
    };
    popular
        .into_iter()
        .filter(|t| t.id != ctx.current.id)
        .filter(|t| !t.genres.iter().any(|g| ctx.current.genres.contains(g)))
        .take(TRENDING_LIMIT as usize)
        .collect()
}

/// Source 4: same artist or channel.
async fn from_related(pool: &SqlitePool, ctx: &SessionContext) -> Vec<Track> {
    match db::tracks_by_artist_or_channel(
        pool,
        &ctx.current.artist,
        &ctx.current.channel_id,
        ctx.current.id,
        RELATED_LIMIT,
    )
    .await
    {
        Ok(tracks) => tracks,
        Err(e) => {
            tracing::warn!("related source failed: {}", e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TransitionRecord;
    use crate::test_utils::{insert_track, temp_db};
    use chrono::Utc;

    #[tokio::test]
    async fn test_gather_combines_sources() {
        let (pool, _dir) = temp_db().await;
        let current = insert_track(&pool, "cur", |t| {
            t.genres = vec!["kompa".into()];
            t.language = "ht".into();
            t.artist = "Tabou Combo".into();
        })
        .await;
        let next = insert_track(&pool, "next", |t| {
            t.language = "ht".into();
        })
        .await;
        // related by artist
        insert_track(&pool, "rel", |t| {
            t.artist = "Tabou Combo".into();
        })
        .await;
        // popular, different genre -> trending
        insert_track(&pool, "pop", |t| {
            t.genres = vec!["rock".into()];
            t.view_count = 9_000_000;
        })
        .await;

        graph::record(
            &pool,
            &TransitionRecord::completed_auto(current.id, next.id, "s1"),
        )
        .await
        .unwrap();

        let mut ctx = SessionContext::anonymous("s1", current, 20);
        ctx.anonymous = false;

        let candidates = gather(&pool, &ctx, graph::DEFAULT_RETENTION_DAYS, Utc::now()).await;
        let sources: Vec<CandidateSource> = candidates.iter().map(|c| c.source).collect();
        assert!(sources.contains(&CandidateSource::Graph));
        assert!(sources.contains(&CandidateSource::UserHistory));
        assert!(sources.contains(&CandidateSource::Trending));
        assert!(sources.contains(&CandidateSource::Related));
        // No source ever proposes the current track itself
        assert!(candidates.iter().all(|c| c.track.external_id != "cur"));
    }

    #[tokio::test]
    async fn test_anonymous_session_skips_history_source() {
        let (pool, _dir) = temp_db().await;
        let current = insert_track(&pool, "cur", |t| {
            t.language = "ht".into();
        })
        .await;
        insert_track(&pool, "same-vibe", |t| {
            t.language = "ht".into();
        })
        .await;

        let ctx = SessionContext::anonymous("s1", current, 20);
        let candidates = gather(&pool, &ctx, graph::DEFAULT_RETENTION_DAYS, Utc::now()).await;
        assert!(
            candidates
                .iter()
                .all(|c| c.source != CandidateSource::UserHistory)
        );
    }

    #[tokio::test]
    async fn test_trending_excludes_shared_genres() {
        let (pool, _dir) = temp_db().await;
        let current = insert_track(&pool, "cur", |t| {
            t.genres = vec!["kompa".into()];
        })
        .await;
        insert_track(&pool, "same-genre", |t| {
            t.genres = vec!["kompa".into(), "zouk".into()];
            t.view_count = 5_000_000;
        })
        .await;
        let other = insert_track(&pool, "other-genre", |t| {
            t.genres = vec!["rock".into()];
            t.view_count = 5_000_000;
        })
        .await;

        let ctx = SessionContext::anonymous("s1", current, 20);
        let trending = from_trending(&pool, &ctx).await;
        assert_eq!(trending.len(), 1);
        assert_eq!(trending[0].id, other.id);
    }
}
