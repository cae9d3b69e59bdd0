//! Transition graph: append-only log plus aggregation queries.
//!
//! The collaborative-filtering backbone. Every observed "track A was
//! followed by track B" event is appended to the `transitions` table;
//! aggregation queries turn the raw log into edge strengths and
//! probabilities.
//!
//! Retention: records older than the configured window (90 days by
//! default) never influence aggregation. Enforced at query time with a
//! cutoff bound, so nothing needs a deletion job to stay correct.
//!
//! Zero-result aggregations are valid ("no continuity signal"), never an
//! error.

use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::SqlitePool;

use crate::model::TransitionRecord;

/// Default retention window for aggregation queries, in days.
pub const DEFAULT_RETENTION_DAYS: i64 = 90;

/// Aggregated outgoing edge from one track to another.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionEdge {
    /// Destination track id
    pub to_track_id: i64,
    /// Number of qualifying transitions within the retention window
    pub count: i64,
    /// count / total qualifying transitions from the source
    pub probability: f64,
}

/// Aggregated (from, to) pair for trending queries.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendingPair {
    pub from_track_id: i64,
    pub to_track_id: i64,
    pub count: i64,
}

/// Append a transition. Unconditional: no idempotence, no dedup.
/// Duplicates are edge strength.
pub async fn record(pool: &SqlitePool, record: &TransitionRecord) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO transitions
            (from_track_id, to_track_id, session_id, user_id, completed, skipped, source, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.from_track_id)
    .bind(record.to_track_id)
    .bind(&record.session_id)
    .bind(&record.user_id)
    .bind(record.completed)
    .bind(record.skipped)
    .bind(record.source.as_str())
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

/// Append a transition with an explicit timestamp. Used by tests and
/// by backfill imports; production callers use [`record`].
pub async fn record_at(
    pool: &SqlitePool,
    record: &TransitionRecord,
    at: DateTime<Utc>,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO transitions
            (from_track_id, to_track_id, session_id, user_id, completed, skipped, source, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.from_track_id)
    .bind(record.to_track_id)
    .bind(&record.session_id)
    .bind(&record.user_id)
    .bind(record.completed)
    .bind(record.skipped)
    .bind(record.source.as_str())
    .bind(at.to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

fn retention_cutoff(now: DateTime<Utc>, retention_days: i64) -> String {
    (now - Duration::days(retention_days)).to_rfc3339()
}

/// Outgoing transition probabilities from a track.
///
/// Filters to completed transitions within the last `retention_days`,
/// groups by destination, and returns the top `limit` by count with
/// probability = count / total. Empty for an unseen source.
pub async fn probabilities(
    pool: &SqlitePool,
    from_track_id: i64,
    limit: i64,
    retention_days: i64,
    now: DateTime<Utc>,
) -> sqlx::Result<Vec<TransitionEdge>> {
    aggregate_edges(pool, from_track_id, limit, retention_days, now, false).await
}

/// Like [`probabilities`] but additionally excludes skipped transitions.
/// This is the signal the candidate generator consumes: completions the
/// listener actually sat through.
pub async fn top_next(
    pool: &SqlitePool,
    from_track_id: i64,
    limit: i64,
    retention_days: i64,
    now: DateTime<Utc>,
) -> sqlx::Result<Vec<TransitionEdge>> {
    aggregate_edges(pool, from_track_id, limit, retention_days, now, true).await
}

async fn aggregate_edges(
    pool: &SqlitePool,
    from_track_id: i64,
    limit: i64,
    retention_days: i64,
    now: DateTime<Utc>,
    exclude_skipped: bool,
) -> sqlx::Result<Vec<TransitionEdge>> {
    let skip_clause = if exclude_skipped {
        "AND skipped = 0"
    } else {
        ""
    };
    let sql = format!(
        "SELECT to_track_id, COUNT(*) as cnt FROM transitions \
         WHERE from_track_id = ? AND completed = 1 AND created_at >= ? {skip_clause} \
         GROUP BY to_track_id ORDER BY cnt DESC, to_track_id ASC"
    );

    let rows: Vec<(i64, i64)> = sqlx::query_as(&sql)
        .bind(from_track_id)
        .bind(retention_cutoff(now, retention_days))
        .fetch_all(pool)
        .await?;

    // Probabilities are over the full outgoing edge set; the limit only
    // truncates the returned slice. A truncated result therefore sums to
    // less than 1, never exactly 1 by construction.
    let total: i64 = rows.iter().map(|(_, c)| c).sum();
    if total == 0 {
        return Ok(Vec::new());
    }

    Ok(rows
        .into_iter()
        .take(limit.max(0) as usize)
        .map(|(to_track_id, count)| TransitionEdge {
            to_track_id,
            count,
            probability: count as f64 / total as f64,
        })
        .collect())
}

/// Most-traveled (from, to) pairs within the last `window_hours`.
pub async fn trending(
    pool: &SqlitePool,
    window_hours: i64,
    limit: i64,
    now: DateTime<Utc>,
) -> sqlx::Result<Vec<TrendingPair>> {
    let cutoff = (now - Duration::hours(window_hours)).to_rfc3339();
    let rows: Vec<(i64, i64, i64)> = sqlx::query_as(
        "SELECT from_track_id, to_track_id, COUNT(*) as cnt FROM transitions \
         WHERE created_at >= ? \
         GROUP BY from_track_id, to_track_id \
         ORDER BY cnt DESC, from_track_id ASC, to_track_id ASC LIMIT ?",
    )
    .bind(cutoff)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(from_track_id, to_track_id, count)| TrendingPair {
            from_track_id,
            to_track_id,
            count,
        })
        .collect())
}
