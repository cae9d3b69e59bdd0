//! Configuration system using TOML files.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: %APPDATA%\radio-engine\config.toml
//! - macOS: ~/Library/Application Support/radio-engine/config.toml
//! - Linux: ~/.config/radio-engine/config.toml
//!
//! The config file is human-readable and editable. Settings are
//! loaded at startup; missing sections fall back to defaults.
//!
//! The match-scoring thresholds live here rather than as literals in the
//! scoring code: they are heuristic constants with no documented
//! derivation, so they stay named and overridable.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API credentials (keep separate for potential future encryption)
    pub credentials: Credentials,

    /// Quota budget and costs
    pub quota: QuotaConfig,

    /// Recommendation pipeline tuning
    pub recommendation: RecommendationConfig,

    /// Resolution cache tuning
    pub resolution: ResolutionConfig,

    /// Canonical-metadata match scoring thresholds
    pub match_scoring: MatchScoringConfig,
}

/// API credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    /// API key for the upstream metadata/audio provider
    pub upstream_api_key: Option<String>,

    /// Secret used to sign object-store URLs. If absent the object-store
    /// tier is disabled for the process lifetime.
    pub object_store_secret: Option<String>,
}

/// Daily quota budget and related knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    /// Daily unit budget for the upstream provider
    pub daily_budget: u64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            daily_budget: 10_000,
        }
    }
}

/// Recommendation pipeline tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationConfig {
    /// Maximum entries kept in a session's recent-history window
    pub recent_history_limit: usize,

    /// Transition-log retention window in days. Records older than this
    /// never influence aggregation.
    pub retention_days: i64,

    /// Default locale; a current track in this language (or "unknown")
    /// does not trigger the language lock
    pub default_locale: String,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            recent_history_limit: 20,
            retention_days: 90,
            default_locale: "en".to_string(),
        }
    }
}

/// Resolution cache tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    /// TTL for signed object-store URLs, in seconds
    pub signed_url_ttl_secs: i64,

    /// Ceiling on the lifetime of distributed-cache and database-cached
    /// audio URLs, in seconds. Upstream expiries beyond this are clamped.
    pub cached_url_ttl_secs: i64,

    /// Directory for the local object store (archived audio copies)
    pub object_store_dir: Option<PathBuf>,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            signed_url_ttl_secs: 4 * 3600,
            cached_url_ttl_secs: 5 * 3600,
            object_store_dir: None,
        }
    }
}

/// Thresholds for scoring upstream search results against a canonical
/// (title, artist, duration) record.
///
/// These values are heuristic. They are configuration, not logic, so a
/// deployment can tighten or loosen matching without a rebuild.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchScoringConfig {
    /// Maximum duration delta (seconds) still considered a match
    pub duration_tolerance_secs: i64,

    /// Keywords that mark a result as a wrong-version upload
    pub dirty_keywords: Vec<String>,

    /// Bonus for results from an authoritative channel
    pub authority_bonus: f32,

    /// Minimum score for a result to be accepted at all
    pub accept_cutoff: f32,
}

impl Default for MatchScoringConfig {
    fn default() -> Self {
        Self {
            duration_tolerance_secs: 5,
            dirty_keywords: [
                "karaoke",
                "cover",
                "reaction",
                "sped up",
                "slowed",
                "nightcore",
                "8d audio",
                "live",
                "remix",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            authority_bonus: 0.15,
            accept_cutoff: 0.45,
        }
    }
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("radio-engine"))
}

/// Get the full path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

impl Config {
    /// Load config from the default location, falling back to defaults
    /// if the file doesn't exist or can't be parsed.
    pub fn load() -> Self {
        let Some(path) = config_path() else {
            return Self::default();
        };
        Self::load_from(&path)
    }

    /// Load config from a specific path, falling back to defaults.
    pub fn load_from(path: &std::path::Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to parse config at {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Save config to the default location.
    pub fn save(&self) -> std::io::Result<()> {
        let Some(path) = config_path() else {
            return Err(std::io::Error::other("no config directory available"));
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(&path, contents)
    }
}
