//! Canonical-metadata lookup and match scoring.
//!
//! An authoritative (title, artist, duration) tuple — the golden record —
//! is used to sanity-check loosely-matched upstream search results: the
//! provider's full-text search happily returns karaoke uploads, sped-up
//! edits, and reaction videos for a plain song query. This module scores
//! each result against the golden record and picks the best acceptable
//! one.
//!
//! The lookup itself is a collaborator behind [`CanonicalApi`]; only the
//! scoring contract lives here. The thresholds are deployment
//! configuration ([`MatchScoringConfig`]), not literals: they are
//! heuristics with no derivation worth baking in.

use async_trait::async_trait;

pub use crate::config::MatchScoringConfig;
use crate::error::Result;
use crate::upstream::UpstreamTrack;

/// The golden record for a piece of music.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalTrack {
    pub title: String,
    pub artist: String,
    pub duration_ms: u64,
}

impl CanonicalTrack {
    pub fn duration_secs(&self) -> i64 {
        (self.duration_ms / 1000) as i64
    }
}

/// Free-text lookup of a single best canonical record. Unmetered.
#[async_trait]
pub trait CanonicalApi: Send + Sync {
    /// Best canonical match for free text, or `None` when the catalog
    /// has nothing convincing.
    async fn lookup(&self, free_text: &str) -> Result<Option<CanonicalTrack>>;
}

/// Score an upstream result against a canonical record. Higher is better;
/// results below [`MatchScoringConfig::accept_cutoff`] should be rejected.
///
/// Components:
/// - token overlap of the canonical title/artist against the result's
///   title + channel text (up to 0.4 + 0.3)
/// - duration proximity within the configured tolerance (up to 0.3)
/// - dirty-keyword penalty (-0.2 each)
/// - authority bonus for official-looking channels
pub fn match_score(
    candidate: &UpstreamTrack,
    canonical: &CanonicalTrack,
    config: &MatchScoringConfig,
) -> f32 {
    let haystack = format!(
        "{} {} {}",
        candidate.title, candidate.artist, candidate.channel_name
    )
    .to_lowercase();

    let mut score = 0.0f32;
    score += 0.4 * token_overlap(&canonical.title.to_lowercase(), &haystack);
    score += 0.3 * token_overlap(&canonical.artist.to_lowercase(), &haystack);

    // Duration proximity: full credit at zero delta, linear falloff to the
    // tolerance edge, nothing beyond it.
    if candidate.duration_secs > 0 && canonical.duration_ms > 0 {
        let delta = (candidate.duration_secs - canonical.duration_secs()).abs();
        if delta <= config.duration_tolerance_secs {
            let tolerance = config.duration_tolerance_secs.max(1) as f32;
            score += 0.3 * (1.0 - delta as f32 / tolerance);
        }
    }

    for keyword in &config.dirty_keywords {
        let kw = keyword.to_lowercase();
        // A dirty keyword is fine if the canonical title itself carries it
        // (e.g. an actual live album).
        if haystack.contains(&kw) && !canonical.title.to_lowercase().contains(&kw) {
            score -= 0.2;
        }
    }

    if is_authoritative_channel(&candidate.channel_name) {
        score += config.authority_bonus;
    }

    score
}

/// Rank results best-first, dropping those below the cutoff.
pub fn rank_matches<'a>(
    candidates: &'a [UpstreamTrack],
    canonical: &CanonicalTrack,
    config: &MatchScoringConfig,
) -> Vec<&'a UpstreamTrack> {
    let mut scored: Vec<(f32, &UpstreamTrack)> = candidates
        .iter()
        .map(|c| (match_score(c, canonical, config), c))
        .filter(|(score, _)| *score >= config.accept_cutoff)
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().map(|(_, c)| c).collect()
}

/// Fraction of `needle` tokens present in `haystack`.
fn token_overlap(needle: &str, haystack: &str) -> f32 {
    let tokens: Vec<&str> = needle
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    if tokens.is_empty() {
        return 0.0;
    }
    let hits = tokens.iter().filter(|t| haystack.contains(*t)).count();
    hits as f32 / tokens.len() as f32
}

fn is_authoritative_channel(channel_name: &str) -> bool {
    let lower = channel_name.to_lowercase();
    lower.contains("vevo") || lower.contains("official") || lower.ends_with("- topic")
}
