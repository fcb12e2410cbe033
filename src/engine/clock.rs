//! Authoritative time for deadlines.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::time::Instant;

/// Source of "now" for the engine.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Time left until `deadline`, zero once it has passed.
    fn remaining(&self, deadline: DateTime<Utc>) -> Duration {
        (deadline - self.now()).to_std().unwrap_or(Duration::ZERO)
    }

    /// Whole seconds left, rounded up so a running session never reports 0.
    fn remaining_seconds(&self, deadline: DateTime<Utc>) -> u64 {
        let remaining = self.remaining(deadline);
        remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0)
    }
}

/// Wall time anchored to tokio's monotonic clock.
///
/// Reads the system clock once and advances with [`Instant`] afterwards, so
/// wall-clock adjustments never move a deadline. Under a paused tokio runtime
/// it follows `tokio::time::advance`.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    anchor_wall: DateTime<Utc>,
    anchor: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            anchor_wall: Utc::now(),
            anchor: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = TimeDelta::from_std(self.anchor.elapsed()).unwrap_or(TimeDelta::MAX);
        self.anchor_wall
            .checked_add_signed(elapsed)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}
