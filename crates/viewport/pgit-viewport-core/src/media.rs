//! Viewport-gated media playback controller.
//!
//! Phase table:
//!
//! ```text
//! Idle    --attach_source-->  Loading   (load timeout armed)
//! Loading --ready-->          Ready
//! Loading --error|timeout-->  Error     (terminal)
//! Ready   --enter viewport--> Playing
//! Playing --exit viewport-->  Paused
//! Paused  --enter viewport--> Playing
//! ```
//!
//! Play requests go through the host and may be rejected (autoplay policy,
//! buffering). A rejection never changes the phase; the next viewport enter
//! asks again.

use std::fmt;

use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};

use crate::config::PlaybackConfig;
use crate::error::ViewportError;
use crate::ids::{MediaHandle, PlayTicket, SessionId, TargetId, TimerId};
use crate::outputs::{MediaEvent, Outbox};
use crate::scheduler::Scheduler;
use crate::visibility::{Subscription, VisibilityEvent, VisibilityHost};
use crate::Result;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaPhase {
    /// No source assigned.
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
    /// Load failed or timed out. Terminal for the source.
    Error,
}

impl MediaPhase {
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Error => "error",
        }
    }

    /// Phases from which a play request may be issued.
    #[inline]
    pub fn can_play(&self) -> bool {
        matches!(self, Self::Ready | Self::Paused)
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error)
    }
}

impl fmt::Display for MediaPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Load status reported by the media element.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadSignal {
    Ready,
    Error,
}

impl LoadSignal {
    /// Map an HTML media event name. Progress events such as `loadstart` carry
    /// no phase information and map to `None`.
    pub fn from_event_name(name: &str) -> Option<Self> {
        match name {
            "canplay" | "canplaythrough" | "loadeddata" | "loadedmetadata" => Some(Self::Ready),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadFailure {
    /// The media element reported an error.
    Error,
    /// Neither signal arrived within the load timeout.
    Timeout,
}

/// Why the host refused to start playback.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayRejection {
    pub reason: String,
}

impl PlayRejection {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for PlayRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

/// Immediate result of [`MediaHost::request_play`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlayRequest {
    Started,
    /// Completion arrives later through [`MediaSession::on_play_settled`].
    Pending(PlayTicket),
    Rejected(PlayRejection),
}

/// Host media primitive.
pub trait MediaHost {
    fn request_play(&mut self, media: MediaHandle) -> PlayRequest;
    fn request_pause(&mut self, media: MediaHandle);
}

/// Render flags derived from the session phase.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaView {
    pub phase: MediaPhase,
    /// No source: show the static placeholder image.
    pub placeholder: bool,
    pub loading_overlay: bool,
    /// "Failed to load video" fallback.
    pub error_overlay: bool,
    /// Media element opacity (hidden while loading or failed).
    pub media_visible: bool,
}

#[derive(Debug)]
pub struct MediaSession {
    id: SessionId,
    cfg: PlaybackConfig,
    phase: MediaPhase,
    in_viewport: bool,
    media: Option<MediaHandle>,
    target: Option<TargetId>,
    subscription: Option<Subscription>,
    load_timer: Option<TimerId>,
    pending_play: Option<PlayTicket>,
    rejections: u32,
    outbox: Outbox<MediaEvent>,
    torn_down: bool,
}

impl MediaSession {
    pub fn new(id: SessionId, cfg: PlaybackConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            id,
            cfg,
            phase: MediaPhase::Idle,
            in_viewport: false,
            media: None,
            target: None,
            subscription: None,
            load_timer: None,
            pending_play: None,
            rejections: 0,
            outbox: Outbox::default(),
            torn_down: false,
        })
    }

    /// Observe the element that contains the media.
    ///
    /// Without visibility detection the media counts as permanently in view.
    pub fn mount(
        &mut self,
        target: TargetId,
        visibility: &mut dyn VisibilityHost,
        media: &mut dyn MediaHost,
    ) -> Result<()> {
        if self.torn_down {
            return Err(ViewportError::TornDown);
        }
        if self.target.is_some() {
            return Err(ViewportError::AlreadyMounted);
        }
        self.target = Some(target);
        self.subscription = Subscription::open(visibility, &[target], &self.cfg.observer);
        if self.subscription.is_none() {
            debug!("session {:?}: visibility detection unavailable", self.id);
            self.on_viewport_change(true, media);
        }
        Ok(())
    }

    /// Assign the media source and start loading. Only valid from `Idle`.
    ///
    /// A scheduler that cannot arm the load timeout fails the load at once.
    pub fn attach_source(
        &mut self,
        media: MediaHandle,
        scheduler: &mut dyn Scheduler,
    ) -> Result<()> {
        if self.torn_down {
            return Err(ViewportError::TornDown);
        }
        if self.phase != MediaPhase::Idle {
            warn!(
                "session {:?}: attach_source ignored in phase {}",
                self.id, self.phase
            );
            return Err(ViewportError::SourceAlreadyAttached { phase: self.phase });
        }
        self.media = Some(media);
        self.rejections = 0;
        self.load_timer = scheduler.after(self.cfg.load_timeout());
        self.set_phase(MediaPhase::Loading);
        if self.load_timer.is_none() {
            // Without a deadline a stalled load would never resolve.
            self.fail(LoadFailure::Timeout);
        }
        Ok(())
    }

    /// Route an observer event; events for other subscriptions or targets are dropped.
    pub fn on_visibility(&mut self, event: &VisibilityEvent, media: &mut dyn MediaHost) {
        let live = match &self.subscription {
            Some(sub) => sub.accepts(event) && Some(event.target) == self.target,
            None => false,
        };
        if !live {
            trace!("session {:?}: ignoring stale visibility event", self.id);
            return;
        }
        self.on_viewport_change(event.intersecting, media);
    }

    /// Every `true` is an enter attempt: a playable session asks the host to play.
    pub fn on_viewport_change(&mut self, in_viewport: bool, media: &mut dyn MediaHost) {
        if self.torn_down {
            return;
        }
        self.in_viewport = in_viewport;
        if in_viewport {
            self.try_play(media);
            return;
        }

        let Some(handle) = self.media else {
            return;
        };
        if self.phase == MediaPhase::Playing {
            media.request_pause(handle);
            self.set_phase(MediaPhase::Paused);
        } else if self.pending_play.take().is_some() {
            // The in-flight request may still start the media; stop it.
            media.request_pause(handle);
        }
    }

    pub fn on_load_signal(
        &mut self,
        signal: LoadSignal,
        scheduler: &mut dyn Scheduler,
        media: &mut dyn MediaHost,
    ) {
        if self.torn_down || self.phase != MediaPhase::Loading {
            trace!(
                "session {:?}: ignoring {signal:?} in phase {}",
                self.id,
                self.phase
            );
            return;
        }
        if let Some(timer) = self.load_timer.take() {
            scheduler.cancel(timer);
        }
        match signal {
            LoadSignal::Ready => {
                self.set_phase(MediaPhase::Ready);
                if self.in_viewport {
                    self.try_play(media);
                }
            }
            LoadSignal::Error => self.fail(LoadFailure::Error),
        }
    }

    /// Apply an elapsed timer. Returns true when it was the live load timeout.
    pub fn on_timer(&mut self, timer: TimerId) -> bool {
        if self.torn_down || self.load_timer != Some(timer) {
            trace!("session {:?}: ignoring stale timer {timer:?}", self.id);
            return false;
        }
        self.load_timer = None;
        if self.phase != MediaPhase::Loading {
            return false;
        }
        self.fail(LoadFailure::Timeout);
        true
    }

    /// Completion of a play request that returned [`PlayRequest::Pending`].
    pub fn on_play_settled(
        &mut self,
        ticket: PlayTicket,
        outcome: std::result::Result<(), PlayRejection>,
        media: &mut dyn MediaHost,
    ) {
        if self.torn_down || self.pending_play != Some(ticket) {
            trace!("session {:?}: ignoring stale play ticket {ticket:?}", self.id);
            return;
        }
        // Leaving the viewport, clearing the source and teardown all drop the
        // ticket, so a live ticket implies the media is still wanted on screen.
        self.pending_play = None;
        match outcome {
            Ok(()) if self.phase.can_play() && self.in_viewport => {
                self.rejections = 0;
                self.set_phase(MediaPhase::Playing);
            }
            Ok(()) => {
                if let Some(handle) = self.media {
                    media.request_pause(handle);
                }
            }
            Err(rejection) => self.reject(rejection),
        }
    }

    /// Drop the current source and return to `Idle`, ready for a new `attach_source`.
    pub fn clear_source(&mut self, scheduler: &mut dyn Scheduler, media: &mut dyn MediaHost) {
        if self.torn_down {
            return;
        }
        if let Some(timer) = self.load_timer.take() {
            scheduler.cancel(timer);
        }
        let in_flight = self.pending_play.take().is_some();
        if let Some(handle) = self.media.take() {
            if self.phase == MediaPhase::Playing || in_flight {
                media.request_pause(handle);
            }
        }
        self.rejections = 0;
        self.set_phase(MediaPhase::Idle);
    }

    /// Cancel the load timeout and the observation. Idempotent; every later
    /// callback is ignored.
    pub fn teardown(&mut self, visibility: &mut dyn VisibilityHost, scheduler: &mut dyn Scheduler) {
        if let Some(timer) = self.load_timer.take() {
            scheduler.cancel(timer);
        }
        if let Some(sub) = self.subscription.as_mut() {
            sub.cancel(visibility);
        }
        self.pending_play = None;
        self.torn_down = true;
    }

    fn try_play(&mut self, media: &mut dyn MediaHost) {
        if !self.phase.can_play() || self.pending_play.is_some() {
            return;
        }
        let Some(handle) = self.media else {
            return;
        };
        if let Some(limit) = self.cfg.play_retry_limit {
            if self.rejections >= limit {
                debug!(
                    "session {:?}: {} play rejections, not retrying",
                    self.id, self.rejections
                );
                return;
            }
        }
        match media.request_play(handle) {
            PlayRequest::Started => {
                self.rejections = 0;
                self.set_phase(MediaPhase::Playing);
            }
            PlayRequest::Pending(ticket) => self.pending_play = Some(ticket),
            PlayRequest::Rejected(rejection) => self.reject(rejection),
        }
    }

    fn reject(&mut self, rejection: PlayRejection) {
        self.rejections = self.rejections.saturating_add(1);
        debug!("session {:?}: play rejected: {rejection}", self.id);
        self.outbox.push(MediaEvent::PlayRejected {
            session: self.id,
            reason: rejection.reason,
        });
    }

    fn fail(&mut self, cause: LoadFailure) {
        warn!("session {:?}: media load failed ({cause:?})", self.id);
        self.set_phase(MediaPhase::Error);
        self.outbox.push(MediaEvent::LoadFailed {
            session: self.id,
            cause,
        });
    }

    fn set_phase(&mut self, to: MediaPhase) {
        let from = self.phase;
        if from == to {
            return;
        }
        self.phase = to;
        self.outbox.push(MediaEvent::PhaseChanged {
            session: self.id,
            from,
            to,
        });
    }

    #[inline]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[inline]
    pub fn config(&self) -> &PlaybackConfig {
        &self.cfg
    }

    #[inline]
    pub fn phase(&self) -> MediaPhase {
        self.phase
    }

    #[inline]
    pub fn in_viewport(&self) -> bool {
        self.in_viewport
    }

    #[inline]
    pub fn has_source(&self) -> bool {
        self.media.is_some()
    }

    #[inline]
    pub fn media(&self) -> Option<MediaHandle> {
        self.media
    }

    #[inline]
    pub fn load_timer(&self) -> Option<TimerId> {
        self.load_timer
    }

    #[inline]
    pub fn pending_play(&self) -> Option<PlayTicket> {
        self.pending_play
    }

    /// Consecutive rejected play requests since the last successful start.
    #[inline]
    pub fn rejected_plays(&self) -> u32 {
        self.rejections
    }

    #[inline]
    pub fn subscription(&self) -> Option<&Subscription> {
        self.subscription.as_ref()
    }

    #[inline]
    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn view(&self) -> MediaView {
        MediaView {
            phase: self.phase,
            placeholder: self.phase == MediaPhase::Idle,
            loading_overlay: self.phase == MediaPhase::Loading,
            error_overlay: self.phase == MediaPhase::Error,
            media_visible: matches!(
                self.phase,
                MediaPhase::Ready | MediaPhase::Playing | MediaPhase::Paused
            ),
        }
    }

    pub fn take_events(&mut self) -> Vec<MediaEvent> {
        self.outbox.take()
    }
}
