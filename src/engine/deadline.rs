//! Deadline - Time budget abstraction for cooperative yielding.
//!
//! The engine never acquires scheduling slots itself. The embedder obtains a
//! bounded time window from whatever primitive its host offers (an idle
//! callback, a frame tick, a plain loop) and hands the engine a [`Deadline`]
//! to poll. The engine yields between units of work once the remaining time
//! drops under [`YIELD_FLOOR`].

use std::time::{Duration, Instant};

/// Minimum remaining time before the work loop yields its slot.
pub const YIELD_FLOOR: Duration = Duration::from_millis(1);

/// Pollable "time remaining in this slot" query.
pub trait Deadline {
    fn time_remaining(&self) -> Duration;
}

/// Deadline that never expires. Drives a full pass to completion in one
/// call; what tests and synchronous embedders want.
pub struct Unlimited;

impl Deadline for Unlimited {
    fn time_remaining(&self) -> Duration {
        Duration::MAX
    }
}

/// Fixed time window starting when the budget is created.
pub struct FrameBudget {
    end: Instant,
}

impl FrameBudget {
    /// Budget expiring `window` from now.
    pub fn new(window: Duration) -> Self {
        Self {
            end: Instant::now() + window,
        }
    }
}

impl Deadline for FrameBudget {
    fn time_remaining(&self) -> Duration {
        self.end.saturating_duration_since(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlimited_never_expires() {
        assert!(Unlimited.time_remaining() >= YIELD_FLOOR);
    }

    #[test]
    fn test_frame_budget_expires() {
        let budget = FrameBudget::new(Duration::ZERO);
        assert!(budget.time_remaining() < YIELD_FLOOR);
    }
}
