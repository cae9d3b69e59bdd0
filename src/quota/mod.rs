//! Upstream quota tracking.
//!
//! The upstream provider meters API usage in units against a fixed daily
//! budget. This tracker keeps a process-local consumed counter with a
//! fixed cost table per operation kind, and maps the consumption ratio to
//! a priority band that downstream callers use to shrink result sizes and
//! prefer cache tiers.
//!
//! The tracker is explicitly constructed and passed by reference (no
//! global singleton); the clock is injectable so epoch-reset behavior is
//! testable with a fake clock.
//!
//! Accuracy is process-local only: multiple processes sharing one
//! upstream key will each undercount. Accepted limitation.
//!
//! # Contract
//!
//! Callers must check [`QuotaTracker::can_afford`] before calling the
//! upstream, then [`QuotaTracker::record`] after. `record` does not
//! enforce the budget itself.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use parking_lot::Mutex;

/// The provider resets daily quota at midnight in its reference timezone
/// (UTC-8). Epoch boundaries are computed at this fixed offset, not in
/// the server's local time.
pub const QUOTA_EPOCH_OFFSET_HOURS: i32 = -8;

/// A clock abstraction so quota epochs are testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Metered upstream operation kinds with their fixed unit costs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuotaOp {
    /// Full-text search
    Search,
    /// Per-item detail lookup
    Detail,
    /// Trending feed
    Trending,
    /// Related-tracks lookup (a search variant upstream, same cost)
    Related,
    /// Audio stream extraction (resolved outside the metered API)
    AudioStream,
}

impl QuotaOp {
    /// Fixed unit cost per single invocation/item.
    pub fn unit_cost(self) -> u64 {
        match self {
            Self::Search => 100,
            Self::Detail => 1,
            Self::Trending => 1,
            Self::Related => 100,
            Self::AudioStream => 0,
        }
    }
}

/// Consumption band; callers degrade behavior as the band rises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PriorityLevel {
    /// < 50% consumed
    Low,
    /// < 80% consumed
    Medium,
    /// < 95% consumed
    High,
    /// >= 95% consumed
    Critical,
}

#[derive(Debug)]
struct QuotaState {
    consumed: u64,
    epoch: NaiveDate,
}

/// Process-wide quota budget tracker.
pub struct QuotaTracker {
    state: Mutex<QuotaState>,
    daily_budget: u64,
    clock: Arc<dyn Clock>,
}

impl QuotaTracker {
    /// Create a tracker with the given daily budget and clock.
    pub fn new(daily_budget: u64, clock: Arc<dyn Clock>) -> Self {
        let epoch = epoch_date(clock.now());
        Self {
            state: Mutex::new(QuotaState { consumed: 0, epoch }),
            daily_budget,
            clock,
        }
    }

    /// Tracker with the system clock.
    pub fn with_system_clock(daily_budget: u64) -> Self {
        Self::new(daily_budget, Arc::new(SystemClock))
    }

    /// Whether `count` invocations of `op` fit in the remaining budget.
    ///
    /// Pure check; does not consume.
    pub fn can_afford(&self, op: QuotaOp, count: u64) -> bool {
        let mut state = self.state.lock();
        self.roll_epoch(&mut state);
        let cost = op.unit_cost().saturating_mul(count);
        state.consumed.saturating_add(cost) <= self.daily_budget
    }

    /// Record consumption of `count` invocations of `op`.
    ///
    /// Callers must have checked [`can_afford`](Self::can_afford) first;
    /// this method never rejects.
    pub fn record(&self, op: QuotaOp, count: u64) {
        let mut state = self.state.lock();
        self.roll_epoch(&mut state);
        let cost = op.unit_cost().saturating_mul(count);
        state.consumed = state.consumed.saturating_add(cost);
        tracing::debug!(
            consumed = state.consumed,
            budget = self.daily_budget,
            "quota recorded {:?} x{}",
            op,
            count
        );
    }

    /// Units consumed in the current epoch.
    pub fn consumed(&self) -> u64 {
        let mut state = self.state.lock();
        self.roll_epoch(&mut state);
        state.consumed
    }

    /// Configured daily budget.
    pub fn daily_budget(&self) -> u64 {
        self.daily_budget
    }

    /// Current consumption band.
    pub fn priority_level(&self) -> PriorityLevel {
        if self.daily_budget == 0 {
            return PriorityLevel::Critical;
        }
        let consumed = self.consumed();
        let ratio = consumed as f64 / self.daily_budget as f64;
        if ratio < 0.5 {
            PriorityLevel::Low
        } else if ratio < 0.8 {
            PriorityLevel::Medium
        } else if ratio < 0.95 {
            PriorityLevel::High
        } else {
            PriorityLevel::Critical
        }
    }

    /// Reset consumed to zero exactly once per epoch-boundary crossing.
    fn roll_epoch(&self, state: &mut QuotaState) {
        let today = epoch_date(self.clock.now());
        if today != state.epoch {
            tracing::info!(
                previous_epoch = %state.epoch,
                consumed = state.consumed,
                "quota epoch reset"
            );
            state.consumed = 0;
            state.epoch = today;
        }
    }
}

/// Calendar date at the provider's reference offset.
fn epoch_date(now: DateTime<Utc>) -> NaiveDate {
    let offset = FixedOffset::east_opt(QUOTA_EPOCH_OFFSET_HOURS * 3600)
        .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap());
    now.with_timezone(&offset).date_naive()
}
