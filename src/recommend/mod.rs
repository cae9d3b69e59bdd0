//! The next-track recommendation pipeline.
//!
//! One call produces one track for an endless listening session. Stages
//! run in order, each narrowing the pool:
//!
//! 1. [`candidates`]: four concurrent sources (transition graph, user
//!    history vibe, trending, related-by-artist)
//! 2. [`filter`]: vibe constraints, most importantly the language lock
//! 3. [`dedupe`]: drop the current track, recent history, and
//!    cross-source duplicates
//! 4. [`scoring`]: composite 0-100 score per survivor
//! 5. [`selection`]: weighted random pick from the top five
//!
//! An empty pool after any stage drops to the [`fallback`] ladder rather
//! than failing; only an empty catalog is an error.

pub mod candidates;
pub mod context;
pub mod dedupe;
pub mod engine;
pub mod fallback;
pub mod filter;
pub mod scoring;
pub mod selection;

pub use candidates::{Candidate, CandidateSource};
pub use context::SessionContext;
pub use engine::{Recommendation, RecommendEngine};
pub use scoring::ScoredCandidate;
pub use selection::{Randomness, SelectionMethod, ThreadRandomness};
