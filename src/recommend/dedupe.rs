//! Deduplication across candidate streams.
//!
//! Drops the current track and anything in the session's recent-history
//! window, then collapses cross-source duplicates. A track proposed by
//! several sources keeps its highest-precedence attribution
//! (graph > user history > trending > related); order is otherwise
//! stable.

use std::collections::HashMap;

use super::candidates::Candidate;
use super::context::SessionContext;

pub fn apply(candidates: Vec<Candidate>, ctx: &SessionContext) -> Vec<Candidate> {
    // Track id -> index of the kept occurrence.
    let mut kept_at: HashMap<i64, usize> = HashMap::new();
    let mut out: Vec<Candidate> = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        let id = candidate.track.id;
        if id == ctx.current.id || ctx.is_recent(id) {
            continue;
        }
        match kept_at.get(&id) {
            Some(&idx) => {
                // CandidateSource derives Ord in precedence order.
                if candidate.source < out[idx].source {
                    out[idx].source = candidate.source;
                }
            }
            None => {
                kept_at.insert(id, out.len());
                out.push(candidate);
            }
        }
    }
    out
}
