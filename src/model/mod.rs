//! Core data models.
//!
//! Defines the primary entities: [`Track`] and [`TransitionRecord`].
//! Row types derive from SQLx for database mapping; set-valued fields
//! (genres, culture tags) are stored as JSON text columns and decoded
//! into the richer [`Track`] type.
//!
//! # Database Schema
//!
//! - `tracks` - tracks discovered via search/resolve, keyed by external id
//! - `transitions` - append-only transition log (collaborative filtering)

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Sentinel language code for tracks whose language could not be inferred.
pub const LANGUAGE_UNKNOWN: &str = "unknown";

/// Pseudo-language for tracks with no vocals; exempt from the language lock.
pub const LANGUAGE_INSTRUMENTAL: &str = "instrumental";

/// A track known to the catalog.
///
/// Created on first encounter (search or resolve), mutated only by
/// play-count increments and inference refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    /// Database ID (auto-generated)
    pub id: i64,
    /// Stable external provider id
    pub external_id: String,
    /// Track title
    pub title: String,
    /// Artist name (best-effort, from upstream metadata)
    pub artist: String,
    /// Upstream channel/publisher id
    pub channel_id: String,
    /// Upstream channel/publisher display name
    pub channel_name: String,
    /// Duration in seconds
    pub duration_secs: i64,
    /// Thumbnail URL, if any
    pub thumbnail_url: Option<String>,
    /// Upstream view count (popularity signal)
    pub view_count: i64,
    /// Local play count across all listeners
    pub play_count: i64,
    /// Upstream publish time
    pub published_at: Option<DateTime<Utc>>,
    /// Inferred genre tags; never empty after inference
    pub genres: Vec<String>,
    /// Inferred language code, or "unknown"
    pub language: String,
    /// Inferred culture tags
    pub culture_tags: Vec<String>,
}

impl Track {
    /// Whether this track's language should lock the session's vibe.
    ///
    /// A "distinct" language is anything other than the default locale,
    /// "unknown", and "instrumental".
    pub fn has_distinct_language(&self, default_locale: &str) -> bool {
        self.language != default_locale
            && self.language != LANGUAGE_UNKNOWN
            && self.language != LANGUAGE_INSTRUMENTAL
    }
}

/// Raw `tracks` row as stored; JSON columns still encoded.
#[derive(Debug, Clone, FromRow)]
pub struct TrackRow {
    pub id: i64,
    pub external_id: String,
    pub title: String,
    pub artist: String,
    pub channel_id: String,
    pub channel_name: String,
    pub duration_secs: i64,
    pub thumbnail_url: Option<String>,
    pub view_count: i64,
    pub play_count: i64,
    pub published_at: Option<String>,
    pub genres: String,
    pub language: String,
    pub culture_tags: String,
}

impl TrackRow {
    /// Decode JSON columns into a [`Track`].
    ///
    /// Undecodable JSON degrades to an empty set with a warning rather
    /// than failing the whole query.
    pub fn into_track(self) -> Track {
        let genres = decode_tags(&self.genres, self.id, "genres");
        let culture_tags = decode_tags(&self.culture_tags, self.id, "culture_tags");
        let published_at = self
            .published_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Track {
            id: self.id,
            external_id: self.external_id,
            title: self.title,
            artist: self.artist,
            channel_id: self.channel_id,
            channel_name: self.channel_name,
            duration_secs: self.duration_secs,
            thumbnail_url: self.thumbnail_url,
            view_count: self.view_count,
            play_count: self.play_count,
            published_at,
            genres,
            language: self.language,
            culture_tags,
        }
    }
}

fn decode_tags(json: &str, track_id: i64, column: &str) -> Vec<String> {
    match serde_json::from_str(json) {
        Ok(tags) => tags,
        Err(e) => {
            tracing::warn!("Undecodable {} for track {}: {}", column, track_id, e);
            Vec::new()
        }
    }
}

/// How a transition was initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionSource {
    /// Chosen by the recommendation engine
    Auto,
    /// Explicitly picked by the listener
    Manual,
    /// Produced by shuffle
    Shuffle,
}

impl TransitionSource {
    /// Stable column representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Manual => "manual",
            Self::Shuffle => "shuffle",
        }
    }

    /// Parse the column representation; unknown values default to Auto.
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "manual" => Self::Manual,
            "shuffle" => Self::Shuffle,
            _ => Self::Auto,
        }
    }
}

/// One observed listening transition. Append-only; duplicates are edge
/// strength, not noise.
#[derive(Debug, Clone)]
pub struct TransitionRecord {
    pub from_track_id: i64,
    pub to_track_id: i64,
    pub session_id: String,
    pub user_id: Option<String>,
    pub completed: bool,
    pub skipped: bool,
    pub source: TransitionSource,
}

impl TransitionRecord {
    /// A completed automatic transition, the common case.
    pub fn completed_auto(from: i64, to: i64, session_id: impl Into<String>) -> Self {
        Self {
            from_track_id: from,
            to_track_id: to,
            session_id: session_id.into(),
            user_id: None,
            completed: true,
            skipped: false,
            source: TransitionSource::Auto,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinct_language() {
        let mut track = crate::test_utils::mock_track(1, "abc");
        track.language = "ht".to_string();
        assert!(track.has_distinct_language("en"));

        track.language = "en".to_string();
        assert!(!track.has_distinct_language("en"));

        track.language = LANGUAGE_UNKNOWN.to_string();
        assert!(!track.has_distinct_language("en"));

        track.language = LANGUAGE_INSTRUMENTAL.to_string();
        assert!(!track.has_distinct_language("en"));
    }

    #[test]
    fn test_row_decode_bad_json_degrades() {
        let row = TrackRow {
            id: 7,
            external_id: "x".into(),
            title: "t".into(),
            artist: "a".into(),
            channel_id: "c".into(),
            channel_name: "cn".into(),
            duration_secs: 100,
            thumbnail_url: None,
            view_count: 0,
            play_count: 0,
            published_at: Some("not a date".into()),
            genres: "not json".into(),
            language: "en".into(),
            culture_tags: "[\"latin\"]".into(),
        };
        let track = row.into_track();
        assert!(track.genres.is_empty());
        assert_eq!(track.culture_tags, vec!["latin".to_string()]);
        assert!(track.published_at.is_none());
    }

    #[test]
    fn test_transition_source_roundtrip() {
        for src in [
            TransitionSource::Auto,
            TransitionSource::Manual,
            TransitionSource::Shuffle,
        ] {
            assert_eq!(TransitionSource::from_str_lossy(src.as_str()), src);
        }
        assert_eq!(
            TransitionSource::from_str_lossy("garbage"),
            TransitionSource::Auto
        );
    }
}
