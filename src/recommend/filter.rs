//! Vibe filtering, hard constraints only.
//!
//! The language lock: when the current track is in a distinct language
//! (not the deployment default, not unknown, not instrumental), every
//! candidate must share that language or be language-neutral. A kompa
//! session does not wander into English pop because an algorithm liked
//! the view counts.

use super::candidates::Candidate;
use super::context::SessionContext;
use crate::model::{LANGUAGE_INSTRUMENTAL, LANGUAGE_UNKNOWN, Track};

/// Whether a candidate survives the vibe constraints of the current
/// track.
pub fn passes_vibe(candidate: &Track, current: &Track, default_locale: &str) -> bool {
    if current.has_distinct_language(default_locale) {
        let lang = candidate.language.as_str();
        return lang == current.language
            || lang == LANGUAGE_INSTRUMENTAL
            || lang == LANGUAGE_UNKNOWN;
    }
    true
}

/// Apply hard constraints: blocked tracks and the language lock.
pub fn apply(
    candidates: Vec<Candidate>,
    ctx: &SessionContext,
    default_locale: &str,
) -> Vec<Candidate> {
    let before = candidates.len();
    let kept: Vec<Candidate> = candidates
        .into_iter()
        .filter(|c| !ctx.blocked.contains(&c.track.id))
        .filter(|c| passes_vibe(&c.track, &ctx.current, default_locale))
        .collect();
    if kept.len() < before {
        tracing::debug!(dropped = before - kept.len(), "vibe filter");
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recommend::candidates::CandidateSource;
    use crate::test_utils::mock_track;

    fn with_language(id: i64, language: &str) -> Track {
        let mut t = mock_track(id, &format!("t{id}"));
        t.language = language.to_string();
        t
    }

    fn candidate(track: Track) -> Candidate {
        Candidate {
            track,
            source: CandidateSource::Trending,
        }
    }

    #[test]
    fn test_language_lock_engages_for_distinct_language() {
        let current = with_language(1, "ht");
        assert!(passes_vibe(&with_language(2, "ht"), &current, "en"));
        assert!(passes_vibe(&with_language(3, "instrumental"), &current, "en"));
        assert!(passes_vibe(&with_language(4, "unknown"), &current, "en"));
        assert!(!passes_vibe(&with_language(5, "en"), &current, "en"));
        assert!(!passes_vibe(&with_language(6, "es"), &current, "en"));
    }

    #[test]
    fn test_no_lock_for_default_locale_or_neutral() {
        for lang in ["en", "unknown", "instrumental"] {
            let current = with_language(1, lang);
            assert!(passes_vibe(&with_language(2, "ko"), &current, "en"));
        }
    }

    #[test]
    fn test_blocked_tracks_dropped() {
        let current = with_language(1, "en");
        let mut ctx = SessionContext::anonymous("s", current, 20);
        ctx.blocked.insert(3);

        let kept = apply(
            vec![candidate(with_language(2, "en")), candidate(with_language(3, "en"))],
            &ctx,
            "en",
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].track.id, 2);
    }

    #[test]
    fn test_all_candidates_can_be_eliminated() {
        // A Haitian kompa session with only English candidates on offer
        // leaves nothing; the caller falls back rather than breaking the
        // vibe.
        let current = with_language(1, "ht");
        let ctx = SessionContext::anonymous("s", current, 20);
        let candidates: Vec<Candidate> = (2..12)
            .map(|id| candidate(with_language(id, "en")))
            .collect();
        assert!(apply(candidates, &ctx, "en").is_empty());
    }
}
