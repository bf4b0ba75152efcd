//! Scheduling capability and a deterministic manual clock.

use std::collections::BTreeSet;
use std::time::Duration;

use crate::ids::{IdAllocator, TimerId};

/// Host timer primitive (`now` + `after`/`cancel`).
///
/// The scheduler never calls back into a controller. When a timer elapses the
/// host hands its id to the owning controller's `on_timer`, which checks that
/// the id is still live before acting on it.
pub trait Scheduler {
    /// Time elapsed since the host's origin.
    fn now(&self) -> Duration;

    /// Arrange for a timer id to be delivered after `delay`.
    ///
    /// `None` means the host could not arm a timer; callers act as if the
    /// delay had already elapsed.
    fn after(&mut self, delay: Duration) -> Option<TimerId>;

    /// Cancel a pending timer. Unknown or already fired ids are ignored.
    fn cancel(&mut self, timer: TimerId);
}

/// Scheduler driven by explicit time advances.
///
/// Used by tests and by simulation hosts that replay a scroll trace.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Duration,
    ids: IdAllocator,
    /// Ordered by due time, then by id (creation order).
    pending: BTreeSet<(Duration, TimerId)>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward by `delta` and return the timers that came due, in
    /// firing order.
    pub fn advance_by(&mut self, delta: Duration) -> Vec<TimerId> {
        let target = self.now + delta;
        self.advance_to(target)
    }

    /// Move time to `at` (never backwards) and return the timers that came due.
    pub fn advance_to(&mut self, at: Duration) -> Vec<TimerId> {
        if at > self.now {
            self.now = at;
        }
        let mut fired = Vec::new();
        while let Some(&(due, id)) = self.pending.iter().next() {
            if due > self.now {
                break;
            }
            self.pending.remove(&(due, id));
            fired.push(id);
        }
        fired
    }

    /// Due time of a pending timer.
    pub fn due(&self, timer: TimerId) -> Option<Duration> {
        self.pending
            .iter()
            .find(|(_, id)| *id == timer)
            .map(|(due, _)| *due)
    }

    #[inline]
    pub fn is_pending(&self, timer: TimerId) -> bool {
        self.due(timer).is_some()
    }

    #[inline]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl Scheduler for ManualClock {
    fn now(&self) -> Duration {
        self.now
    }

    fn after(&mut self, delay: Duration) -> Option<TimerId> {
        let id = self.ids.alloc_timer();
        self.pending.insert((self.now + delay, id));
        Some(id)
    }

    fn cancel(&mut self, timer: TimerId) {
        self.pending.retain(|(_, id)| *id != timer);
    }
}
