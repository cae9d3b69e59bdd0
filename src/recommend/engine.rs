//! Pipeline orchestration.

use std::collections::HashMap;
use std::sync::Arc;

use sqlx::sqlite::SqlitePool;

use super::context::SessionContext;
use super::selection::{Randomness, SelectionMethod, ThreadRandomness};
use super::{candidates, dedupe, fallback, filter, scoring, selection};
use crate::config::RecommendationConfig;
use crate::db;
use crate::error::Result;
use crate::graph;
use crate::model::{Track, TransitionRecord, TransitionSource};
use crate::quota::{Clock, SystemClock};

/// How many outgoing graph edges feed the continuity score.
const CONTINUITY_EDGES: i64 = 100;

/// The engine's answer: one track, how it was chosen, and the full
/// final pool (chosen track included) for a "play instead" surface.
#[derive(Debug, Clone)]
pub struct Recommendation {
    pub track: Track,
    pub score: f64,
    pub method: SelectionMethod,
    pub alternatives: Vec<(Track, f64)>,
}

/// The next-track engine. Holds no session state; callers pass a
/// [`SessionContext`] per call.
pub struct RecommendEngine {
    pool: SqlitePool,
    config: RecommendationConfig,
    rng: Arc<dyn Randomness>,
    clock: Arc<dyn Clock>,
}

impl RecommendEngine {
    pub fn new(pool: SqlitePool, config: RecommendationConfig) -> Self {
        Self {
            pool,
            config,
            rng: Arc::new(ThreadRandomness),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_randomness(mut self, rng: Arc<dyn Randomness>) -> Self {
        self.rng = rng;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Produce the next track for a session.
    ///
    /// Never fails on an empty pipeline; the fallback ladder answers
    /// instead. The only recommendation-specific error is an empty
    /// catalog.
    pub async fn next_track(&self, ctx: &SessionContext) -> Result<Recommendation> {
        let now = self.clock.now();

        let pool = candidates::gather(&self.pool, ctx, self.config.retention_days, now).await;
        let pool = filter::apply(pool, ctx, &self.config.default_locale);
        let pool = dedupe::apply(pool, ctx);

        if pool.is_empty() {
            tracing::info!(
                session = %ctx.session_id,
                "pipeline produced no candidates"
            );
            return self.fall_back(ctx).await;
        }

        let probs = self.transition_probabilities(ctx).await;
        let scored = scoring::score_all(pool, ctx, &probs);

        match selection::select(scored, self.rng.as_ref()) {
            Some(sel) => Ok(Recommendation {
                track: sel.chosen.candidate.track,
                score: sel.chosen.score,
                method: sel.method,
                alternatives: sel
                    .alternatives
                    .into_iter()
                    .map(|s| (s.candidate.track, s.score))
                    .collect(),
            }),
            None => self.fall_back(ctx).await,
        }
    }

    /// Record that a session actually moved from one track to another.
    /// Feeds the transition graph and the play counter.
    pub async fn record_playback(
        &self,
        ctx: &SessionContext,
        to: &Track,
        source: TransitionSource,
    ) -> Result<()> {
        let mut record = TransitionRecord::completed_auto(ctx.current.id, to.id, &ctx.session_id);
        record.source = source;
        graph::record(&self.pool, &record).await?;
        db::increment_play_count(&self.pool, to.id).await?;
        Ok(())
    }

    async fn fall_back(&self, ctx: &SessionContext) -> Result<Recommendation> {
        let track = fallback::fallback_track(&self.pool, ctx, self.rng.as_ref()).await?;
        Ok(Recommendation {
            track,
            score: 0.0,
            method: SelectionMethod::Random,
            alternatives: Vec::new(),
        })
    }

    /// Outgoing edge probabilities for the current track; failures
    /// degrade to no continuity signal.
    async fn transition_probabilities(&self, ctx: &SessionContext) -> HashMap<i64, f64> {
        match graph::probabilities(
            &self.pool,
            ctx.current.id,
            CONTINUITY_EDGES,
            self.config.retention_days,
            self.clock.now(),
        )
        .await
        {
            Ok(edges) => edges
                .into_iter()
                .map(|e| (e.to_track_id, e.probability))
                .collect(),
            Err(e) => {
                tracing::warn!("transition probabilities unavailable: {}", e);
                HashMap::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::test_utils::{FixedRandomness, insert_track, temp_db};

    fn engine(pool: SqlitePool, rolls: &[f64]) -> RecommendEngine {
        RecommendEngine::new(pool, RecommendationConfig::default())
            .with_randomness(Arc::new(FixedRandomness::new(rolls)))
    }

    #[tokio::test]
    async fn test_graph_edge_drives_selection() {
        let (pool, _dir) = temp_db().await;
        let current = insert_track(&pool, "cur", |t| {
            t.language = "ht".into();
        })
        .await;
        let next = insert_track(&pool, "next", |t| {
            t.language = "ht".into();
        })
        .await;

        for i in 0..8 {
            graph::record(
                &pool,
                &TransitionRecord::completed_auto(current.id, next.id, &format!("s{i}")),
            )
            .await
            .unwrap();
        }

        let engine = engine(pool, &[0.9, 0.0]);
        let ctx = SessionContext::anonymous("s", current, 20);
        let rec = engine.next_track(&ctx).await.unwrap();
        assert_eq!(rec.track.id, next.id);
        assert_ne!(rec.method, SelectionMethod::Random);
        assert!(rec.score > 0.0);
        // Alternatives carry the whole final pool, winner included
        assert!(rec.alternatives.iter().any(|(t, _)| t.id == rec.track.id));
    }

    #[tokio::test]
    async fn test_configured_retention_ages_out_graph_signal() {
        let (pool, _dir) = temp_db().await;
        let current = insert_track(&pool, "cur", |t| {
            t.language = "en".into();
            t.genres = vec!["kompa".into()];
        })
        .await;
        // Shares a genre with current (so trending skips it) and has a
        // different artist/channel (so related skips it). Only the graph
        // edge can propose it.
        let next = insert_track(&pool, "next", |t| {
            t.language = "en".into();
            t.genres = vec!["kompa".into()];
            t.artist = "Someone Else".into();
        })
        .await;
        graph::record_at(
            &pool,
            &TransitionRecord::completed_auto(current.id, next.id, "s"),
            chrono::Utc::now() - chrono::Duration::days(60),
        )
        .await
        .unwrap();

        let engine = engine(pool.clone(), &[0.5, 0.0]);
        let ctx = SessionContext::anonymous("s", current.clone(), 20);
        let rec = engine.next_track(&ctx).await.unwrap();
        assert_eq!(rec.track.id, next.id);
        assert_ne!(rec.method, SelectionMethod::Random);

        // A 30-day window ages the edge out and the ladder answers.
        let tight = RecommendationConfig {
            retention_days: 30,
            ..RecommendationConfig::default()
        };
        let engine = RecommendEngine::new(pool, tight)
            .with_randomness(Arc::new(FixedRandomness::new(&[0.5, 0.0])));
        let ctx = SessionContext::anonymous("s", current, 20);
        let rec = engine.next_track(&ctx).await.unwrap();
        assert_eq!(rec.method, SelectionMethod::Random);
    }

    #[tokio::test]
    async fn test_language_lock_eliminates_all_then_falls_back() {
        let (pool, _dir) = temp_db().await;
        let current = insert_track(&pool, "cur", |t| {
            t.language = "ht".into();
            t.genres = vec!["kompa".into()];
        })
        .await;
        // Ten popular English candidates, all reachable via graph edges
        for i in 0..10 {
            let t = insert_track(&pool, &format!("en{i}"), |t| {
                t.language = "en".into();
                t.genres = vec!["pop".into()];
                t.view_count = 1_000_000;
            })
            .await;
            graph::record(
                &pool,
                &TransitionRecord::completed_auto(current.id, t.id, "s0"),
            )
            .await
            .unwrap();
        }

        let engine = engine(pool, &[0.5, 0.0]);
        let ctx = SessionContext::anonymous("s", current, 20);
        let rec = engine.next_track(&ctx).await.unwrap();
        // Nothing survived the lock; the ladder answered instead of an
        // error or a vibe break in the scored path.
        assert_eq!(rec.method, SelectionMethod::Random);
    }

    #[tokio::test]
    async fn test_empty_catalog_is_the_only_fatal_case() {
        let (pool, _dir) = temp_db().await;
        let engine = engine(pool, &[0.5]);
        let ctx =
            SessionContext::anonymous("s", crate::test_utils::mock_track(1, "ghost"), 20);
        assert!(matches!(
            engine.next_track(&ctx).await,
            Err(Error::Exhaustion)
        ));
    }

    #[tokio::test]
    async fn test_blocked_track_never_recommended() {
        let (pool, _dir) = temp_db().await;
        let current = insert_track(&pool, "cur", |t| {
            t.language = "en".into();
        })
        .await;
        let blocked = insert_track(&pool, "bad", |t| {
            t.language = "en".into();
            t.view_count = 50_000_000;
        })
        .await;
        let ok = insert_track(&pool, "ok", |t| {
            t.language = "en".into();
        })
        .await;
        for (to, n) in [(blocked.id, 9), (ok.id, 1)] {
            for i in 0..n {
                graph::record(
                    &pool,
                    &TransitionRecord::completed_auto(current.id, to, &format!("s{to}-{i}")),
                )
                .await
                .unwrap();
            }
        }

        let engine = engine(pool, &[0.5, 0.0]);
        let mut ctx = SessionContext::anonymous("s", current, 20);
        ctx.blocked.insert(blocked.id);
        let rec = engine.next_track(&ctx).await.unwrap();
        assert_eq!(rec.track.id, ok.id);
    }

    #[tokio::test]
    async fn test_recent_history_not_repeated() {
        let (pool, _dir) = temp_db().await;
        let current = insert_track(&pool, "cur", |t| {
            t.language = "en".into();
        })
        .await;
        let recent = insert_track(&pool, "recent", |t| {
            t.language = "en".into();
        })
        .await;
        let fresh = insert_track(&pool, "fresh", |t| {
            t.language = "en".into();
        })
        .await;
        for (to, n) in [(recent.id, 9), (fresh.id, 1)] {
            for i in 0..n {
                graph::record(
                    &pool,
                    &TransitionRecord::completed_auto(current.id, to, &format!("s{to}-{i}")),
                )
                .await
                .unwrap();
            }
        }

        let engine = engine(pool, &[0.5, 0.0]);
        let mut ctx = SessionContext::anonymous("s", current, 20);
        ctx.push_recent(recent.id);
        let rec = engine.next_track(&ctx).await.unwrap();
        assert_eq!(rec.track.id, fresh.id);
    }

    #[tokio::test]
    async fn test_record_playback_updates_graph_and_counts() {
        let (pool, _dir) = temp_db().await;
        let current = insert_track(&pool, "cur", |_| {}).await;
        let next = insert_track(&pool, "next", |_| {}).await;

        let engine = engine(pool.clone(), &[0.5]);
        let ctx = SessionContext::anonymous("s", current.clone(), 20);
        engine
            .record_playback(&ctx, &next, TransitionSource::Auto)
            .await
            .unwrap();

        let edges = graph::probabilities(
            &pool,
            current.id,
            10,
            graph::DEFAULT_RETENTION_DAYS,
            chrono::Utc::now(),
        )
        .await
        .unwrap();
        assert_eq!(edges.len(), 1);
        let refreshed = db::get_track_by_id(&pool, next.id).await.unwrap().unwrap();
        assert_eq!(refreshed.play_count, 1);
    }
}
