//! Final selection from the scored pool.
//!
//! The top five scores form the final pool. An 80/20 roll decides
//! between the familiar and discovery halves of the pool; within the
//! chosen half the pick is weighted random by score. Deliberate
//! unpredictability: the best-scored track must not win every time or
//! the session turns into a loop.

use rand::Rng;

use super::scoring::ScoredCandidate;

/// Size of the final selection pool.
pub const POOL_SIZE: usize = 5;

/// Probability mass given to the familiar half of the pool.
pub const FAMILIAR_WEIGHT: f64 = 0.8;

/// Injectable randomness so selection is deterministic under test.
pub trait Randomness: Send + Sync {
    /// Uniform draw in `[0, 1)`.
    fn roll(&self) -> f64;
}

/// Production randomness via the thread-local generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandomness;

impl Randomness for ThreadRandomness {
    fn roll(&self) -> f64 {
        rand::rng().random::<f64>()
    }
}

/// How the winning track was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMethod {
    /// Weighted pick among tracks the user knows
    Familiar,
    /// Weighted pick among fresh tracks
    Discovery,
    /// Uniform pick from the fallback ladder
    Random,
}

impl SelectionMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Familiar => "familiar",
            Self::Discovery => "discovery",
            Self::Random => "random",
        }
    }
}

/// The selection outcome: a winner plus the full final pool, which
/// callers surface as alternatives (the winner included).
#[derive(Debug, Clone)]
pub struct Selection {
    pub chosen: ScoredCandidate,
    pub method: SelectionMethod,
    pub alternatives: Vec<ScoredCandidate>,
}

/// Pick from a best-first scored list. `None` only when the list is
/// empty.
pub fn select(scored: Vec<ScoredCandidate>, rng: &dyn Randomness) -> Option<Selection> {
    let pool: Vec<ScoredCandidate> = scored.into_iter().take(POOL_SIZE).collect();
    if pool.is_empty() {
        return None;
    }

    let familiar: Vec<&ScoredCandidate> = pool.iter().filter(|c| c.familiar).collect();
    let discovery: Vec<&ScoredCandidate> = pool.iter().filter(|c| !c.familiar).collect();

    let r = rng.roll();
    let (chosen_id, method) = if r > 1.0 - FAMILIAR_WEIGHT && !familiar.is_empty() {
        let idx = weighted_pick(&familiar, rng);
        (familiar[idx].candidate.track.id, SelectionMethod::Familiar)
    } else if !discovery.is_empty() {
        let idx = weighted_pick(&discovery, rng);
        (
            discovery[idx].candidate.track.id,
            SelectionMethod::Discovery,
        )
    } else {
        // The pool is entirely familiar but the draw asked for
        // discovery: take the best deterministically.
        (pool[0].candidate.track.id, SelectionMethod::Random)
    };

    let chosen = pool
        .iter()
        .find(|c| c.candidate.track.id == chosen_id)?
        .clone();
    Some(Selection {
        chosen,
        method,
        alternatives: pool,
    })
}

/// Score-weighted pick; uniform when every score is zero.
fn weighted_pick(pool: &[&ScoredCandidate], rng: &dyn Randomness) -> usize {
    let total: f64 = pool.iter().map(|c| c.score).sum();
    let r = rng.roll();
    if total <= 0.0 {
        return ((r * pool.len() as f64) as usize).min(pool.len() - 1);
    }
    let mut remaining = r * total;
    for (i, candidate) in pool.iter().enumerate() {
        remaining -= candidate.score;
        if remaining < 0.0 {
            return i;
        }
    }
    pool.len() - 1
}
