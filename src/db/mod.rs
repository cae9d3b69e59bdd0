//! Database module for track persistence and catalog queries.
//!
//! Uses SQLx with SQLite for lightweight, embedded storage. Provides the
//! track-store collaborator surface as free functions over a pool:
//! - upsert-on-discovery keyed by external id
//! - lookups by internal and external id
//! - atomic play-count increment
//! - popularity and vibe-matching queries for the recommendation pipeline
//! - the cached-audio-URL column used as resolution tier 3
//!
//! # Example
//!
//! ```ignore
//! use radio_engine::db::{init_db, find_track_by_external_id};
//!
//! let pool = init_db("sqlite:radio.db").await?;
//! let track = find_track_by_external_id(&pool, "dQw4w9WgXcQ").await?;
//! ```

use chrono::{DateTime, Utc};
use sqlx::migrate::MigrateDatabase;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::model::{Track, TrackRow};

/// Default database filename.
pub const DEFAULT_DB_NAME: &str = "radio_engine.db";

const TRACK_COLUMNS: &str = "id, external_id, title, artist, channel_id, channel_name, \
     duration_secs, thumbnail_url, view_count, play_count, published_at, \
     genres, language, culture_tags";

/// Build a SQLite database URL from an optional path.
///
/// If no path is provided, uses [`DEFAULT_DB_NAME`] in the current directory.
pub fn db_url(path: Option<&std::path::Path>) -> String {
    match path {
        Some(p) => format!("sqlite:{}", p.display()),
        None => format!("sqlite:{}", DEFAULT_DB_NAME),
    }
}

/// Initialize the database connection pool and run migrations.
///
/// Creates the database file if it doesn't exist, establishes a connection
/// pool with up to 5 connections, and runs all pending migrations.
pub async fn init_db(db_url: &str) -> Result<SqlitePool, sqlx::Error> {
    if !sqlx::Sqlite::database_exists(db_url).await.unwrap_or(false) {
        sqlx::Sqlite::create_database(db_url).await?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// Metadata for a track discovered via search or resolve.
///
/// Input to [`upsert_track`]; the database assigns the internal id and
/// keeps local counters across re-discovery.
#[derive(Debug, Clone, Default)]
pub struct DiscoveredTrack {
    pub external_id: String,
    pub title: String,
    pub artist: String,
    pub channel_id: String,
    pub channel_name: String,
    pub duration_secs: i64,
    pub thumbnail_url: Option<String>,
    pub view_count: i64,
    pub published_at: Option<DateTime<Utc>>,
    pub genres: Vec<String>,
    pub language: String,
    pub culture_tags: Vec<String>,
}

/// Insert or refresh a track keyed by its external id.
///
/// Uses SQLite's UPSERT: metadata fields are refreshed from upstream while
/// the local play count is preserved. Returns the internal id.
pub async fn upsert_track(pool: &SqlitePool, track: &DiscoveredTrack) -> sqlx::Result<i64> {
    let genres = serde_json::to_string(&track.genres).unwrap_or_else(|_| "[]".to_string());
    let culture = serde_json::to_string(&track.culture_tags).unwrap_or_else(|_| "[]".to_string());
    let published = track.published_at.map(|dt| dt.to_rfc3339());

    let row: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO tracks (external_id, title, artist, channel_id, channel_name,
                            duration_secs, thumbnail_url, view_count, published_at,
                            genres, language, culture_tags)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(external_id) DO UPDATE SET
            title = excluded.title,
            artist = excluded.artist,
            channel_id = excluded.channel_id,
            channel_name = excluded.channel_name,
            duration_secs = excluded.duration_secs,
            thumbnail_url = excluded.thumbnail_url,
            view_count = excluded.view_count,
            published_at = excluded.published_at,
            genres = excluded.genres,
            language = excluded.language,
            culture_tags = excluded.culture_tags
        RETURNING id
        "#,
    )
    .bind(&track.external_id)
    .bind(&track.title)
    .bind(&track.artist)
    .bind(&track.channel_id)
    .bind(&track.channel_name)
    .bind(track.duration_secs)
    .bind(&track.thumbnail_url)
    .bind(track.view_count)
    .bind(published)
    .bind(genres)
    .bind(&track.language)
    .bind(culture)
    .fetch_one(pool)
    .await?;

    Ok(row.0)
}

/// Look up a track by its external provider id.
pub async fn find_track_by_external_id(
    pool: &SqlitePool,
    external_id: &str,
) -> sqlx::Result<Option<Track>> {
    let row: Option<TrackRow> = sqlx::query_as(&format!(
        "SELECT {TRACK_COLUMNS} FROM tracks WHERE external_id = ?"
    ))
    .bind(external_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(TrackRow::into_track))
}

/// Look up a track by its internal database id.
pub async fn get_track_by_id(pool: &SqlitePool, track_id: i64) -> sqlx::Result<Option<Track>> {
    let row: Option<TrackRow> =
        sqlx::query_as(&format!("SELECT {TRACK_COLUMNS} FROM tracks WHERE id = ?"))
            .bind(track_id)
            .fetch_optional(pool)
            .await?;
    Ok(row.map(TrackRow::into_track))
}

/// Load several tracks by internal id, preserving the input order.
///
/// Missing ids are silently dropped; callers treat absence as "no signal".
pub async fn get_tracks_by_ids(pool: &SqlitePool, ids: &[i64]) -> sqlx::Result<Vec<Track>> {
    let mut tracks = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(track) = get_track_by_id(pool, *id).await? {
            tracks.push(track);
        }
    }
    Ok(tracks)
}

/// Atomically increment a track's play count.
pub async fn increment_play_count(pool: &SqlitePool, track_id: i64) -> sqlx::Result<()> {
    sqlx::query("UPDATE tracks SET play_count = play_count + 1 WHERE id = ?")
        .bind(track_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Refresh a track's inferred vibe (genres, language, culture tags).
pub async fn update_inference(
    pool: &SqlitePool,
    track_id: i64,
    genres: &[String],
    language: &str,
    culture_tags: &[String],
) -> sqlx::Result<()> {
    let genres = serde_json::to_string(genres).unwrap_or_else(|_| "[]".to_string());
    let culture = serde_json::to_string(culture_tags).unwrap_or_else(|_| "[]".to_string());
    sqlx::query("UPDATE tracks SET genres = ?, language = ?, culture_tags = ? WHERE id = ?")
        .bind(genres)
        .bind(language)
        .bind(culture)
        .bind(track_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Most-viewed tracks in the catalog. Backbone of the fallback ladder
/// and the trending candidate source.
pub async fn top_tracks_by_views(pool: &SqlitePool, limit: i64) -> sqlx::Result<Vec<Track>> {
    let rows: Vec<TrackRow> = sqlx::query_as(&format!(
        "SELECT {TRACK_COLUMNS} FROM tracks ORDER BY view_count DESC, id ASC LIMIT ?"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(TrackRow::into_track).collect())
}

/// Tracks matching the current vibe by language or genre, most-played
/// first. `genre` is matched against the JSON-encoded genres column.
pub async fn tracks_matching_vibe(
    pool: &SqlitePool,
    language: &str,
    genre: Option<&str>,
    exclude_track_id: i64,
    limit: i64,
) -> sqlx::Result<Vec<Track>> {
    let genre_pattern = genre
        .map(|g| format!("%\"{g}\"%"))
        .unwrap_or_else(|| "%\"\u{1}\"%".to_string()); // matches nothing

    let rows: Vec<TrackRow> = sqlx::query_as(&format!(
        "SELECT {TRACK_COLUMNS} FROM tracks \
         WHERE (language = ? OR genres LIKE ?) AND id != ? \
         ORDER BY play_count DESC, view_count DESC LIMIT ?"
    ))
    .bind(language)
    .bind(genre_pattern)
    .bind(exclude_track_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(TrackRow::into_track).collect())
}

/// Tracks by the same artist or channel as the current track.
pub async fn tracks_by_artist_or_channel(
    pool: &SqlitePool,
    artist: &str,
    channel_id: &str,
    exclude_track_id: i64,
    limit: i64,
) -> sqlx::Result<Vec<Track>> {
    let rows: Vec<TrackRow> = sqlx::query_as(&format!(
        "SELECT {TRACK_COLUMNS} FROM tracks \
         WHERE (artist = ? OR channel_id = ?) AND id != ? \
         ORDER BY view_count DESC LIMIT ?"
    ))
    .bind(artist)
    .bind(channel_id)
    .bind(exclude_track_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(TrackRow::into_track).collect())
}

/// Case-insensitive title/artist search over the local catalog.
///
/// This is the quota-denied fallback for upstream search: always available,
/// never metered.
pub async fn search_tracks(
    pool: &SqlitePool,
    query: &str,
    limit: i64,
) -> sqlx::Result<Vec<Track>> {
    let pattern = format!("%{}%", query.replace('%', ""));
    let rows: Vec<TrackRow> = sqlx::query_as(&format!(
        "SELECT {TRACK_COLUMNS} FROM tracks \
         WHERE title LIKE ? OR artist LIKE ? \
         ORDER BY view_count DESC LIMIT ?"
    ))
    .bind(&pattern)
    .bind(&pattern)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(TrackRow::into_track).collect())
}

/// Number of tracks in the catalog.
pub async fn track_count(pool: &SqlitePool) -> sqlx::Result<i64> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tracks")
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}

// ============================================================================
// Cached audio URL (resolution tier 3)
// ============================================================================

/// Read the cached audio URL for a track, with its expiry.
///
/// Expiry validation is the caller's job: the resolver treats an expired
/// entry as a miss and purges it.
pub async fn get_cached_audio(
    pool: &SqlitePool,
    external_id: &str,
) -> sqlx::Result<Option<(String, Option<DateTime<Utc>>)>> {
    let row: Option<(Option<String>, Option<String>)> = sqlx::query_as(
        "SELECT cached_audio_url, cached_audio_expires_at FROM tracks WHERE external_id = ?",
    )
    .bind(external_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.and_then(|(url, expires)| {
        url.map(|u| {
            let expiry = expires
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc));
            (u, expiry)
        })
    }))
}

/// Store a resolved audio URL on the track row.
pub async fn set_cached_audio(
    pool: &SqlitePool,
    external_id: &str,
    url: &str,
    expires_at: DateTime<Utc>,
) -> sqlx::Result<()> {
    sqlx::query(
        "UPDATE tracks SET cached_audio_url = ?, cached_audio_expires_at = ? WHERE external_id = ?",
    )
    .bind(url)
    .bind(expires_at.to_rfc3339())
    .bind(external_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Purge an expired cached audio URL.
pub async fn clear_cached_audio(pool: &SqlitePool, external_id: &str) -> sqlx::Result<()> {
    sqlx::query(
        "UPDATE tracks SET cached_audio_url = NULL, cached_audio_expires_at = NULL \
         WHERE external_id = ?",
    )
    .bind(external_id)
    .execute(pool)
    .await?;
    Ok(())
}
