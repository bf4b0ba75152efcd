//! Visibility observation capability.
//!
//! A host registers a fixed set of targets and later delivers
//! [`VisibilityEvent`]s for them. Events are reported on every change of the
//! `intersecting` flag, not only on first entry: the reveal controller only
//! cares about the first one, the playback controller needs both directions.

use serde::{Deserialize, Serialize};

use crate::config::ObserverConfig;
use crate::ids::{SubscriptionId, TargetId};

/// One intersection change for one target.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VisibilityEvent {
    pub subscription: SubscriptionId,
    pub target: TargetId,
    /// True while at least `threshold_fraction` of the target is visible.
    pub intersecting: bool,
    #[serde(default)]
    pub ratio: f32,
}

/// Viewport-intersection detection provided by the rendering layer.
pub trait VisibilityHost {
    /// Start watching `targets`. Returns `None` when the environment has no
    /// visibility detection (static render, old runtime); callers fail open.
    fn observe(&mut self, targets: &[TargetId], config: &ObserverConfig)
        -> Option<SubscriptionId>;

    /// Stop watching and release the observation. Must tolerate unknown ids.
    fn cancel(&mut self, subscription: SubscriptionId);
}

/// Host without visibility detection.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoVisibility;

impl VisibilityHost for NoVisibility {
    fn observe(&mut self, _: &[TargetId], _: &ObserverConfig) -> Option<SubscriptionId> {
        None
    }

    fn cancel(&mut self, _: SubscriptionId) {}
}

/// Controller-side handle on a live observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    id: SubscriptionId,
    active: bool,
}

impl Subscription {
    /// Register `targets` with the host. `None` means the capability is missing.
    pub fn open(
        host: &mut dyn VisibilityHost,
        targets: &[TargetId],
        config: &ObserverConfig,
    ) -> Option<Self> {
        host.observe(targets, config)
            .map(|id| Self { id, active: true })
    }

    #[inline]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Liveness check applied at every event entry point.
    #[inline]
    pub fn accepts(&self, event: &VisibilityEvent) -> bool {
        self.active && event.subscription == self.id
    }

    /// Release the observation. Safe to call any number of times.
    pub fn cancel(&mut self, host: &mut dyn VisibilityHost) {
        if self.active {
            host.cancel(self.id);
            self.active = false;
        }
    }
}
