//! Notifications drained by the widget after each host callback.
//!
//! Controllers never call into the widget. They append to an outbox that the
//! widget drains with `take_events()` and re-renders from.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ids::{SessionId, TargetId};
use crate::media::{LoadFailure, MediaPhase};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RevealEvent {
    /// A target finished its stagger delay and should animate in.
    Revealed {
        target: TargetId,
        index: u32,
        at: Duration,
    },
    /// Visibility detection is unavailable; every target was revealed at once.
    FailedOpen { targets: Vec<TargetId> },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MediaEvent {
    PhaseChanged {
        session: SessionId,
        from: MediaPhase,
        to: MediaPhase,
    },
    /// The host refused to start playback; the phase is unchanged.
    PlayRejected { session: SessionId, reason: String },
    /// The source failed; the session is now in its terminal `Error` phase.
    LoadFailed {
        session: SessionId,
        cause: LoadFailure,
    },
}

/// Append-only event buffer with a drain accessor.
#[derive(Clone, Debug, PartialEq)]
pub struct Outbox<E> {
    events: Vec<E>,
}

impl<E> Default for Outbox<E> {
    fn default() -> Self {
        Self { events: Vec::new() }
    }
}

impl<E> Outbox<E> {
    #[inline]
    pub fn push(&mut self, event: E) {
        self.events.push(event);
    }

    #[inline]
    pub fn take(&mut self) -> Vec<E> {
        std::mem::take(&mut self.events)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }
}
