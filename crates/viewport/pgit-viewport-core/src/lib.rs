//! pgit viewport core (host-agnostic)
//!
//! Progressive-disclosure and media-playback controllers for the pgit site
//! widgets. The controllers are passive state machines: the host injects its
//! capabilities ([`VisibilityHost`], [`Scheduler`], [`MediaHost`]) as method
//! parameters and forwards observer events, timer firings and media status
//! back in. Every callback carries an id that is checked against live state,
//! so deliveries that race a teardown are dropped.

pub mod config;
pub mod error;
pub mod geometry;
pub mod ids;
pub mod media;
pub mod outputs;
pub mod reveal;
pub mod scheduler;
pub mod visibility;

// Re-exports for consumers (adapters)
pub use config::{Length, ObserverConfig, PlaybackConfig, RevealConfig};
pub use error::ViewportError;
pub use geometry::{GeometryObserver, Rect};
pub use ids::{MediaHandle, PlayTicket, SessionId, SubscriptionId, TargetId, TimerId};
pub use media::{
    LoadFailure, LoadSignal, MediaHost, MediaPhase, MediaSession, MediaView, PlayRejection,
    PlayRequest,
};
pub use outputs::{MediaEvent, RevealEvent};
pub use reveal::{RevealController, RevealSchedule, RevealState, ScheduledReveal, Target};
pub use scheduler::{ManualClock, Scheduler};
pub use visibility::{NoVisibility, Subscription, VisibilityEvent, VisibilityHost};

/// Result type for controller operations
pub type Result<T> = core::result::Result<T, ViewportError>;
