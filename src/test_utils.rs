//! Shared test fixtures. Compiled only for tests.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sqlx::sqlite::SqlitePool;
use tempfile::TempDir;

use crate::db::{self, DiscoveredTrack};
use crate::model::Track;
use crate::quota::Clock;
use crate::recommend::selection::Randomness;
use crate::upstream::UpstreamTrack;

/// Fresh migrated database in a temp directory. Keep the `TempDir`
/// alive for the duration of the test.
pub async fn temp_db() -> (SqlitePool, TempDir) {
    let dir = TempDir::new().expect("create temp dir");
    let url = db::db_url(Some(&dir.path().join("test.db")));
    let pool = db::init_db(&url).await.expect("init test db");
    (pool, dir)
}

/// An in-memory [`Track`] that never touched the database.
pub fn mock_track(id: i64, external_id: &str) -> Track {
    Track {
        id,
        external_id: external_id.to_string(),
        title: format!("Track {external_id}"),
        artist: "Test Artist".to_string(),
        channel_id: format!("ch-{external_id}"),
        channel_name: "Test Channel".to_string(),
        duration_secs: 240,
        thumbnail_url: None,
        view_count: 0,
        play_count: 0,
        published_at: None,
        genres: Vec::new(),
        language: "unknown".to_string(),
        culture_tags: Vec::new(),
    }
}

/// A minimal [`DiscoveredTrack`] for upsert tests.
pub fn discovered(external_id: &str, title: &str, artist: &str) -> DiscoveredTrack {
    DiscoveredTrack {
        external_id: external_id.to_string(),
        title: title.to_string(),
        artist: artist.to_string(),
        channel_id: format!("ch-{external_id}"),
        channel_name: artist.to_string(),
        duration_secs: 240,
        language: "unknown".to_string(),
        ..DiscoveredTrack::default()
    }
}

/// Upsert a track built from [`discovered`] after applying `tweak`,
/// returning the stored [`Track`].
pub async fn insert_track(
    pool: &SqlitePool,
    external_id: &str,
    tweak: impl FnOnce(&mut DiscoveredTrack),
) -> Track {
    let mut track = discovered(external_id, &format!("Track {external_id}"), "Test Artist");
    tweak(&mut track);
    let id = db::upsert_track(pool, &track).await.expect("upsert");
    db::get_track_by_id(pool, id)
        .await
        .expect("fetch")
        .expect("inserted track exists")
}

/// An [`UpstreamTrack`] as the provider would return it.
pub fn upstream_track(external_id: &str, title: &str, channel_name: &str) -> UpstreamTrack {
    UpstreamTrack {
        external_id: external_id.to_string(),
        title: title.to_string(),
        channel_id: format!("ch-{external_id}"),
        channel_name: channel_name.to_string(),
        duration_secs: 240,
        view_count: 1_000,
        ..UpstreamTrack::default()
    }
}

/// A settable clock for expiry and epoch tests.
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn at(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(now),
        })
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Scripted randomness: yields the given rolls in order, then cycles.
pub struct FixedRandomness {
    rolls: Vec<f64>,
    next: Mutex<usize>,
}

impl FixedRandomness {
    pub fn new(rolls: &[f64]) -> Self {
        assert!(!rolls.is_empty(), "need at least one roll");
        Self {
            rolls: rolls.to_vec(),
            next: Mutex::new(0),
        }
    }
}

impl Randomness for FixedRandomness {
    fn roll(&self) -> f64 {
        let mut next = self.next.lock();
        let value = self.rolls[*next % self.rolls.len()];
        *next += 1;
        value
    }
}
