//! Per-session listening state.

use std::collections::{HashMap, HashSet};

use crate::model::Track;

/// Everything the pipeline knows about one listening session.
///
/// The caller owns this; the engine never mutates it. `recent_history`
/// is a bounded window, most recent last, maintained via
/// [`SessionContext::push_recent`].
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: String,
    /// The track that just finished (or is playing).
    pub current: Track,
    /// Track ids recently played in this session, oldest first.
    pub recent_history: Vec<i64>,
    /// Maximum entries retained in `recent_history`.
    pub history_limit: usize,
    /// Track ids the user has liked.
    pub liked: HashSet<i64>,
    /// Track ids the user never wants to hear.
    pub blocked: HashSet<i64>,
    /// Lifetime play counts per track id for this user.
    pub play_counts: HashMap<i64, i64>,
    /// Channel ids the user follows.
    pub followed_channels: HashSet<String>,
    /// No user profile attached; personalized sources are skipped.
    pub anonymous: bool,
}

impl SessionContext {
    /// A session with no user profile.
    pub fn anonymous(session_id: impl Into<String>, current: Track, history_limit: usize) -> Self {
        Self {
            session_id: session_id.into(),
            current,
            recent_history: Vec::new(),
            history_limit,
            liked: HashSet::new(),
            blocked: HashSet::new(),
            play_counts: HashMap::new(),
            followed_channels: HashSet::new(),
            anonymous: true,
        }
    }

    /// Append a played track id, trimming to the window bound.
    pub fn push_recent(&mut self, track_id: i64) {
        self.recent_history.push(track_id);
        if self.recent_history.len() > self.history_limit {
            let overflow = self.recent_history.len() - self.history_limit;
            self.recent_history.drain(..overflow);
        }
    }

    pub fn is_recent(&self, track_id: i64) -> bool {
        self.recent_history.contains(&track_id)
    }

    pub fn plays_of(&self, track_id: i64) -> i64 {
        self.play_counts.get(&track_id).copied().unwrap_or(0)
    }
}
