//! Resource resolution: track id -> time-bounded playable reference.
//!
//! An ordered chain of storage tiers, short-circuiting on first hit:
//!
//! 1. Object store (permanently archived copy) -> short-lived signed URL
//! 2. Distributed cache -> cached stream URL, if unexpired
//! 3. Database cached field -> same, one hop slower
//! 4. Upstream provider -> last resort, metered and retried
//!
//! A tier outage never fails the overall resolution; it falls through.
//! Upstream failure degrades to an embeddable fallback reference, so the
//! resolution path has no fatal case.

pub mod resolver;
pub mod tiers;

pub use resolver::Resolver;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which tier produced a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    ObjectStore,
    DistributedCache,
    Database,
    Upstream,
    /// Embeddable player reference; always available
    Fallback,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ObjectStore => "object_store",
            Self::DistributedCache => "distributed_cache",
            Self::Database => "database",
            Self::Upstream => "upstream",
            Self::Fallback => "fallback",
        }
    }
}

/// A playable reference for a track.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub external_id: String,
    pub url: String,
    pub format: String,
    pub expires_at: DateTime<Utc>,
    pub tier: Tier,
}

/// Payload stored in the distributed cache for a resolved stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CachedAudio {
    pub url: String,
    pub format: String,
    pub expires_at: DateTime<Utc>,
}

impl CachedAudio {
    /// An entry read with `expires_at <= now` must be treated as absent.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// The always-available degraded reference: an embeddable player URL.
/// Extraction failure ends here instead of an error.
pub fn fallback_embed_url(external_id: &str) -> String {
    format!(
        "https://player.invalid/embed/{}",
        urlencoding::encode(external_id)
    )
}
