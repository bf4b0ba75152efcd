//! Staggered reveal controller.
//!
//! Each target moves `Hidden → PendingReveal → Revealed` exactly once. The
//! first intersecting event schedules a reveal after `index × stagger_ms`;
//! later events for the same target are ignored, so scrolling away never hides
//! content again.

use std::time::Duration;

use hashbrown::HashMap;
use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::config::RevealConfig;
use crate::error::ViewportError;
use crate::ids::{TargetId, TimerId};
use crate::outputs::{Outbox, RevealEvent};
use crate::scheduler::Scheduler;
use crate::visibility::{Subscription, VisibilityEvent, VisibilityHost};
use crate::Result;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevealState {
    Hidden,
    PendingReveal,
    /// Terminal.
    Revealed,
}

/// One element of the ordered reveal list.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub id: TargetId,
    /// Position in the list; drives the stagger delay.
    pub index: u32,
    pub state: RevealState,
}

impl Target {
    #[inline]
    pub fn revealed(&self) -> bool {
        self.state == RevealState::Revealed
    }
}

/// A reveal waiting for its timer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledReveal {
    pub target: TargetId,
    pub index: u32,
    pub due: Duration,
}

/// Pending reveals keyed by the timer that will apply them.
#[derive(Debug, Default)]
pub struct RevealSchedule {
    entries: HashMap<TimerId, ScheduledReveal>,
}

impl RevealSchedule {
    #[inline]
    fn insert(&mut self, timer: TimerId, reveal: ScheduledReveal) {
        self.entries.insert(timer, reveal);
    }

    #[inline]
    fn take(&mut self, timer: TimerId) -> Option<ScheduledReveal> {
        self.entries.remove(&timer)
    }

    fn drain_timers(&mut self) -> Vec<TimerId> {
        self.entries.drain().map(|(timer, _)| timer).collect()
    }

    #[inline]
    pub fn contains(&self, timer: TimerId) -> bool {
        self.entries.contains_key(&timer)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pending reveals ordered by due time, then list position.
    pub fn entries(&self) -> Vec<ScheduledReveal> {
        let mut out: Vec<ScheduledReveal> = self.entries.values().copied().collect();
        out.sort_by_key(|r| (r.due, r.index));
        out
    }
}

#[derive(Debug)]
pub struct RevealController {
    cfg: RevealConfig,
    targets: Vec<Target>,
    by_id: HashMap<TargetId, usize>,
    subscription: Option<Subscription>,
    schedule: RevealSchedule,
    outbox: Outbox<RevealEvent>,
    mounted: bool,
    torn_down: bool,
}

impl RevealController {
    pub fn new(cfg: RevealConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            targets: Vec::new(),
            by_id: HashMap::new(),
            subscription: None,
            schedule: RevealSchedule::default(),
            outbox: Outbox::default(),
            mounted: false,
            torn_down: false,
        })
    }

    #[inline]
    pub fn config(&self) -> &RevealConfig {
        &self.cfg
    }

    /// Register the ordered target list with the visibility host.
    ///
    /// Without visibility detection every target is revealed immediately.
    pub fn mount(
        &mut self,
        targets: &[TargetId],
        visibility: &mut dyn VisibilityHost,
    ) -> Result<()> {
        if self.torn_down {
            return Err(ViewportError::TornDown);
        }
        if self.mounted {
            return Err(ViewportError::AlreadyMounted);
        }

        let mut by_id = HashMap::with_capacity(targets.len());
        for (index, id) in targets.iter().enumerate() {
            if by_id.insert(*id, index).is_some() {
                return Err(ViewportError::DuplicateTarget { target: *id });
            }
        }
        self.by_id = by_id;
        self.targets = targets
            .iter()
            .enumerate()
            .map(|(index, id)| Target {
                id: *id,
                index: index as u32,
                state: RevealState::Hidden,
            })
            .collect();
        self.mounted = true;

        self.subscription = Subscription::open(visibility, targets, &self.cfg.observer);
        if self.subscription.is_none() {
            debug!(
                "visibility detection unavailable; revealing {} targets",
                targets.len()
            );
            for t in &mut self.targets {
                t.state = RevealState::Revealed;
            }
            self.outbox.push(RevealEvent::FailedOpen {
                targets: targets.to_vec(),
            });
        }
        Ok(())
    }

    /// Apply one visibility event. Returns true when a reveal was scheduled
    /// (or applied at once because the scheduler could not arm a timer).
    pub fn on_visibility(
        &mut self,
        event: &VisibilityEvent,
        scheduler: &mut dyn Scheduler,
    ) -> bool {
        if self.torn_down || !event.intersecting {
            return false;
        }
        match &self.subscription {
            Some(sub) if sub.accepts(event) => {}
            _ => {
                trace!("ignoring event from stale subscription {:?}", event.subscription);
                return false;
            }
        }
        let Some(&slot) = self.by_id.get(&event.target) else {
            trace!("ignoring event for unknown target {:?}", event.target);
            return false;
        };
        let target = &mut self.targets[slot];
        if target.state != RevealState::Hidden {
            return false;
        }

        let delay = self.cfg.delay_for(target.index);
        let Some(timer) = scheduler.after(delay) else {
            debug!("no timer for {:?}; revealing without delay", target.id);
            target.state = RevealState::Revealed;
            self.outbox.push(RevealEvent::Revealed {
                target: target.id,
                index: target.index,
                at: scheduler.now(),
            });
            return true;
        };
        target.state = RevealState::PendingReveal;
        self.schedule.insert(
            timer,
            ScheduledReveal {
                target: target.id,
                index: target.index,
                due: scheduler.now() + delay,
            },
        );
        true
    }

    /// Apply a batch of events in delivery order. Returns how many reveals were scheduled.
    pub fn on_visibility_batch(
        &mut self,
        events: &[VisibilityEvent],
        scheduler: &mut dyn Scheduler,
    ) -> usize {
        let mut scheduled = 0;
        for event in events {
            if self.on_visibility(event, scheduler) {
                scheduled += 1;
            }
        }
        scheduled
    }

    /// Apply an elapsed reveal timer. Timers that are no longer in the schedule
    /// (cancelled by teardown, or never ours) are ignored.
    pub fn on_timer(&mut self, timer: TimerId, scheduler: &dyn Scheduler) -> Option<TargetId> {
        if self.torn_down {
            trace!("ignoring timer {timer:?} after teardown");
            return None;
        }
        let reveal = self.schedule.take(timer)?;
        let slot = *self.by_id.get(&reveal.target)?;
        let target = &mut self.targets[slot];
        if target.state != RevealState::PendingReveal {
            return None;
        }
        target.state = RevealState::Revealed;
        self.outbox.push(RevealEvent::Revealed {
            target: reveal.target,
            index: reveal.index,
            at: scheduler.now(),
        });
        Some(reveal.target)
    }

    /// Cancel every pending reveal and the observation. Idempotent.
    pub fn teardown(
        &mut self,
        visibility: &mut dyn VisibilityHost,
        scheduler: &mut dyn Scheduler,
    ) {
        for timer in self.schedule.drain_timers() {
            scheduler.cancel(timer);
        }
        if let Some(sub) = self.subscription.as_mut() {
            sub.cancel(visibility);
        }
        self.torn_down = true;
    }

    pub fn state(&self, target: TargetId) -> Option<RevealState> {
        self.by_id.get(&target).map(|&slot| self.targets[slot].state)
    }

    #[inline]
    pub fn is_revealed(&self, target: TargetId) -> bool {
        self.state(target) == Some(RevealState::Revealed)
    }

    pub fn revealed_targets(&self) -> Vec<TargetId> {
        self.targets
            .iter()
            .filter(|t| t.revealed())
            .map(|t| t.id)
            .collect()
    }

    #[inline]
    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    #[inline]
    pub fn schedule(&self) -> &RevealSchedule {
        &self.schedule
    }

    #[inline]
    pub fn subscription(&self) -> Option<&Subscription> {
        self.subscription.as_ref()
    }

    #[inline]
    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn take_events(&mut self) -> Vec<RevealEvent> {
        self.outbox.take()
    }
}
