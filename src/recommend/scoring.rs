//! Composite candidate scoring.
//!
//! Five capped components sum into a 0-100 score:
//!
//! | component   | cap | signal                                      |
//! |-------------|-----|---------------------------------------------|
//! | similarity  | 40  | shared genres/culture/language with current |
//! | familiarity | 30  | likes, play history, followed channel       |
//! | continuity  | 20  | crowd transition probability                |
//! | discovery   | 10  | novelty for this user                       |
//! | popularity  | 10  | logarithmic view-count bands                |
//!
//! A recent-history repeat takes a flat -50 before the final clamp.
//! Scores order candidates; they carry no meaning across sessions.

use std::collections::HashMap;

use super::candidates::Candidate;
use super::context::SessionContext;
use crate::model::Track;

pub const SIMILARITY_CAP: f64 = 40.0;
pub const FAMILIARITY_CAP: f64 = 30.0;
pub const CONTINUITY_CAP: f64 = 20.0;
pub const DISCOVERY_CAP: f64 = 10.0;
pub const POPULARITY_CAP: f64 = 10.0;
pub const REPEAT_PENALTY: f64 = -50.0;

/// A candidate with its composite score.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub score: f64,
    /// Liked, or played more than a handful of times. Drives the
    /// familiar/discovery selection split.
    pub familiar: bool,
}

/// Score every candidate and sort best-first.
///
/// `transition_probs` maps destination track id to the crowd transition
/// probability out of the current track.
pub fn score_all(
    candidates: Vec<Candidate>,
    ctx: &SessionContext,
    transition_probs: &HashMap<i64, f64>,
) -> Vec<ScoredCandidate> {
    let mut scored: Vec<ScoredCandidate> = candidates
        .into_iter()
        .map(|candidate| {
            let score = composite(&candidate.track, ctx, transition_probs);
            let familiar = is_familiar(&candidate.track, ctx);
            ScoredCandidate {
                candidate,
                score,
                familiar,
            }
        })
        .collect();
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.candidate.track.id.cmp(&b.candidate.track.id))
    });
    scored
}

pub fn composite(track: &Track, ctx: &SessionContext, probs: &HashMap<i64, f64>) -> f64 {
    let mut score = similarity(track, &ctx.current)
        + familiarity(track, ctx)
        + continuity(track.id, probs)
        + discovery(track, ctx)
        + popularity(track.view_count)
        + artist_repeat_penalty(track, ctx);
    if ctx.is_recent(track.id) {
        score += REPEAT_PENALTY;
    }
    score.clamp(0.0, 100.0)
}

fn is_familiar(track: &Track, ctx: &SessionContext) -> bool {
    ctx.liked.contains(&track.id) || ctx.plays_of(track.id) > 3
}

/// Shared genres, culture tags, and language with the current track.
fn similarity(track: &Track, current: &Track) -> f64 {
    let mut score: f64 = 0.0;
    for genre in &track.genres {
        if current.genres.contains(genre) {
            score += 10.0;
        }
    }
    for tag in &track.culture_tags {
        if current.culture_tags.contains(tag) {
            score += 5.0;
        }
    }
    if track.language == current.language {
        score += 10.0;
    }
    score.min(SIMILARITY_CAP)
}

fn familiarity(track: &Track, ctx: &SessionContext) -> f64 {
    let mut score: f64 = 0.0;
    if ctx.liked.contains(&track.id) {
        score += 30.0;
    } else {
        score += match ctx.plays_of(track.id) {
            p if p > 10 => 25.0,
            p if p > 5 => 20.0,
            p if p > 0 => 10.0,
            _ => 0.0,
        };
    }
    if ctx.followed_channels.contains(&track.channel_id) {
        score += 10.0;
    }
    score.min(FAMILIARITY_CAP)
}

/// Crowd transition probability, scaled to the cap.
fn continuity(track_id: i64, probs: &HashMap<i64, f64>) -> f64 {
    let p = probs.get(&track_id).copied().unwrap_or(0.0);
    (p * 100.0).min(CONTINUITY_CAP)
}

/// Novelty nudge: unplayed tracks, and anything from a followed channel
/// (new material from a trusted source).
fn discovery(track: &Track, ctx: &SessionContext) -> f64 {
    let mut score: f64 = 0.0;
    if ctx.plays_of(track.id) == 0 {
        score += 5.0;
    }
    if ctx.followed_channels.contains(&track.channel_id) {
        score += 5.0;
    }
    score.min(DISCOVERY_CAP)
}

/// Logarithmic popularity bands; popularity is a tiebreaker, never a
/// driver.
fn popularity(view_count: i64) -> f64 {
    match view_count {
        v if v > 10_000_000 => 10.0,
        v if v > 1_000_000 => 7.0,
        v if v > 100_000 => 5.0,
        v if v > 10_000 => 3.0,
        _ => 0.0,
    }
}

/// Placeholder for an artist-repetition penalty. Always zero until
/// sessions track per-artist play spacing; the term stays in the sum so
/// the composite shape does not change when it lands.
/// TODO: wire artist play-spacing into SessionContext and implement.
fn artist_repeat_penalty(_track: &Track, _ctx: &SessionContext) -> f64 {
    0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recommend::candidates::CandidateSource;
    use crate::test_utils::mock_track;
    use proptest::prelude::*;

    fn ctx() -> SessionContext {
        let mut current = mock_track(1, "cur");
        current.genres = vec!["kompa".into(), "zouk".into()];
        current.culture_tags = vec!["haitian".into()];
        current.language = "ht".into();
        SessionContext::anonymous("s", current, 20)
    }

    fn track(id: i64) -> Track {
        mock_track(id, &format!("t{id}"))
    }

    #[test]
    fn test_similarity_counts_shared_attributes() {
        let ctx = ctx();
        let mut t = track(2);
        t.genres = vec!["kompa".into()];
        t.culture_tags = vec!["haitian".into()];
        t.language = "ht".into();
        // 10 (genre) + 5 (culture) + 10 (language)
        assert_eq!(similarity(&t, &ctx.current), 25.0);
    }

    #[test]
    fn test_similarity_capped() {
        let ctx = ctx();
        let mut wide = ctx.current.clone();
        wide.genres = vec!["a".into(), "b".into(), "c".into(), "d".into(), "e".into()];
        let mut t2 = track(3);
        t2.genres = wide.genres.clone();
        t2.language = wide.language.clone();
        assert_eq!(similarity(&t2, &wide), SIMILARITY_CAP);
    }

    #[test]
    fn test_familiarity_like_dominates_play_count() {
        let mut ctx = ctx();
        ctx.play_counts.insert(2, 50);
        assert_eq!(familiarity(&track(2), &ctx), 25.0);
        ctx.liked.insert(2);
        assert_eq!(familiarity(&track(2), &ctx), 30.0);
    }

    #[test]
    fn test_continuity_scales_probability() {
        let probs: HashMap<i64, f64> = [(2, 0.15), (3, 0.8)].into();
        assert_eq!(continuity(2, &probs), 15.0);
        // Strong edges saturate the cap
        assert_eq!(continuity(3, &probs), CONTINUITY_CAP);
        assert_eq!(continuity(99, &probs), 0.0);
    }

    #[test]
    fn test_recent_repeat_penalized() {
        let mut ctx = ctx();
        let probs = HashMap::new();
        let t = track(2);
        let fresh = composite(&t, &ctx, &probs);
        ctx.recent_history.push(2);
        let repeated = composite(&t, &ctx, &probs);
        assert!(repeated < fresh);
        assert!(repeated >= 0.0); // clamped, never negative
    }

    #[test]
    fn test_score_all_sorted_descending() {
        let ctx = ctx();
        let probs: HashMap<i64, f64> = [(3, 0.5)].into();
        let mut similar = track(2);
        similar.language = "ht".into();
        let candidates = vec![
            Candidate {
                track: track(4),
                source: CandidateSource::Trending,
            },
            Candidate {
                track: similar,
                source: CandidateSource::UserHistory,
            },
            Candidate {
                track: track(3),
                source: CandidateSource::Graph,
            },
        ];
        let scored = score_all(candidates, &ctx, &probs);
        assert!(scored.windows(2).all(|w| w[0].score >= w[1].score));
        // The strong graph edge wins over mild similarity
        assert_eq!(scored[0].candidate.track.id, 3);
    }

    proptest! {
        #[test]
        fn prop_composite_always_in_range(
            plays in 0i64..100,
            views in 0i64..100_000_000,
            prob in 0.0f64..1.0,
            liked in proptest::bool::ANY,
            recent in proptest::bool::ANY,
        ) {
            let mut ctx = ctx();
            let mut t = track(2);
            t.view_count = views;
            t.genres = ctx.current.genres.clone();
            t.culture_tags = ctx.current.culture_tags.clone();
            t.language = ctx.current.language.clone();
            ctx.play_counts.insert(2, plays);
            if liked {
                ctx.liked.insert(2);
            }
            if recent {
                ctx.recent_history.push(2);
            }
            let probs: HashMap<i64, f64> = [(2, prob)].into();
            let score = composite(&t, &ctx, &probs);
            prop_assert!((0.0..=100.0).contains(&score));
        }
    }
}
