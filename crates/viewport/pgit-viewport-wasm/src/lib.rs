use std::time::Duration;

use js_sys::{Array, Function, Reflect};
use log::warn;
use serde::de::DeserializeOwned;
use serde_wasm_bindgen as swb;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use pgit_viewport_core::{
    LoadSignal, MediaHandle, MediaHost, MediaSession, ObserverConfig, PlayRejection,
    PlayRequest, PlayTicket, PlaybackConfig, RevealConfig, RevealController, Scheduler,
    SessionId, SubscriptionId, TargetId, TimerId, ViewportError, VisibilityEvent,
    VisibilityHost,
};

fn jsvalue_is_undefined_or_null(v: &JsValue) -> bool {
    v.is_undefined() || v.is_null()
}

fn viewport_error(e: ViewportError) -> JsError {
    JsError::new(&format!("{} error: {e}", e.category()))
}

fn method(host: &JsValue, name: &str) -> Option<Function> {
    Reflect::get(host, &JsValue::from_str(name))
        .ok()
        .and_then(|v| v.dyn_into::<Function>().ok())
}

fn required(host: &JsValue, name: &str) -> Result<Function, JsError> {
    method(host, name).ok_or_else(|| JsError::new(&format!("host.{name} must be a function")))
}

fn as_u32(v: &JsValue) -> Option<u32> {
    v.as_f64()
        .filter(|n| n.is_finite() && *n >= 0.0 && *n <= f64::from(u32::MAX))
        .map(|n| n as u32)
}

/// Human readable reason from a thrown value or rejection payload.
fn reason_of(v: &JsValue) -> String {
    if let Some(err) = v.dyn_ref::<js_sys::Error>() {
        return err.message().into();
    }
    v.as_string().unwrap_or_else(|| "play() was rejected".to_string())
}

fn parse<T: DeserializeOwned>(v: JsValue, what: &str) -> Result<T, JsError> {
    swb::from_value(v).map_err(|e| JsError::new(&format!("{what} error: {e}")))
}

/// `host.now() -> ms`, `host.after(ms) -> id`, `host.cancel(id)`.
struct JsClock {
    now: Function,
    after: Function,
    cancel: Function,
}

impl JsClock {
    fn from_host(host: &JsValue) -> Result<Self, JsError> {
        Ok(Self {
            now: required(host, "now")?,
            after: required(host, "after")?,
            cancel: required(host, "cancel")?,
        })
    }
}

impl Scheduler for JsClock {
    fn now(&self) -> Duration {
        let ms = self
            .now
            .call0(&JsValue::UNDEFINED)
            .ok()
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);
        Duration::try_from_secs_f64(ms.max(0.0) / 1000.0).unwrap_or_default()
    }

    fn after(&mut self, delay: Duration) -> Option<TimerId> {
        let arg = JsValue::from_f64(delay.as_secs_f64() * 1000.0);
        match self.after.call1(&JsValue::UNDEFINED, &arg) {
            Ok(v) => {
                let id = as_u32(&v).map(TimerId);
                if id.is_none() {
                    warn!("host.after returned a non-numeric timer id");
                }
                id
            }
            Err(_) => {
                warn!("host.after threw");
                None
            }
        }
    }

    fn cancel(&mut self, timer: TimerId) {
        let _ = self
            .cancel
            .call1(&JsValue::UNDEFINED, &JsValue::from(timer.0));
    }
}

/// `host.observe(targets, config) -> id | null` and `host.disconnect(id)`.
/// Missing functions mean the page has no visibility detection.
struct JsVisibility {
    observe: Option<Function>,
    disconnect: Option<Function>,
}

impl JsVisibility {
    fn from_host(host: &JsValue) -> Self {
        Self {
            observe: method(host, "observe"),
            disconnect: method(host, "disconnect"),
        }
    }
}

impl VisibilityHost for JsVisibility {
    fn observe(&mut self, targets: &[TargetId], config: &ObserverConfig) -> Option<SubscriptionId> {
        let observe = self.observe.as_ref()?;
        let ids: Array = targets.iter().map(|t| JsValue::from(t.0)).collect();
        let cfg = swb::to_value(config).ok()?;
        match observe.call2(&JsValue::UNDEFINED, &ids, &cfg) {
            Ok(v) => as_u32(&v).map(SubscriptionId),
            Err(_) => {
                warn!("host.observe threw; treating targets as always visible");
                None
            }
        }
    }

    fn cancel(&mut self, subscription: SubscriptionId) {
        if let Some(disconnect) = &self.disconnect {
            let _ = disconnect.call1(&JsValue::UNDEFINED, &JsValue::from(subscription.0));
        }
    }
}

/// `host.play(handle)` returns nothing when playback started, a numeric ticket
/// when it will settle later through `settle_play`, and throws when refused.
struct JsMedia {
    play: Function,
    pause: Function,
}

impl JsMedia {
    fn from_host(host: &JsValue) -> Result<Self, JsError> {
        Ok(Self {
            play: required(host, "play")?,
            pause: required(host, "pause")?,
        })
    }
}

impl MediaHost for JsMedia {
    fn request_play(&mut self, media: MediaHandle) -> PlayRequest {
        match self.play.call1(&JsValue::UNDEFINED, &JsValue::from(media.0)) {
            Ok(v) => match as_u32(&v) {
                Some(ticket) => PlayRequest::Pending(PlayTicket(ticket)),
                None => PlayRequest::Started,
            },
            Err(e) => PlayRequest::Rejected(PlayRejection::new(reason_of(&e))),
        }
    }

    fn request_pause(&mut self, media: MediaHandle) {
        let _ = self.pause.call1(&JsValue::UNDEFINED, &JsValue::from(media.0));
    }
}

fn reveal_policy(policy: JsValue) -> Result<RevealConfig, JsError> {
    if jsvalue_is_undefined_or_null(&policy) {
        return Ok(RevealConfig::default());
    }
    if let Some(name) = policy.as_string() {
        return match name.as_str() {
            "feature-grid" => Ok(RevealConfig::feature_grid()),
            "steps-timeline" => Ok(RevealConfig::steps_timeline()),
            other => Err(JsError::new(&format!("unknown reveal preset '{other}'"))),
        };
    }
    parse(policy, "reveal policy")
}

fn playback_policy(policy: JsValue) -> Result<PlaybackConfig, JsError> {
    if jsvalue_is_undefined_or_null(&policy) {
        return Ok(PlaybackConfig::default());
    }
    if let Some(name) = policy.as_string() {
        return match name.as_str() {
            "video-placeholder" => Ok(PlaybackConfig::video_placeholder()),
            other => Err(JsError::new(&format!("unknown playback preset '{other}'"))),
        };
    }
    parse(policy, "playback policy")
}

fn set_panic_hook() {
    #[cfg(feature = "console_error")]
    console_error_panic_hook::set_once();
}

/// Staggered reveal list bound to a JS host object.
#[wasm_bindgen]
pub struct StaggeredReveal {
    core: RevealController,
    clock: JsClock,
    visibility: JsVisibility,
}

#[wasm_bindgen]
impl StaggeredReveal {
    /// `policy` is a preset name (`"feature-grid"`, `"steps-timeline"`), a
    /// policy object, or undefined for the feature grid defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(policy: JsValue, host: JsValue) -> Result<StaggeredReveal, JsError> {
        set_panic_hook();
        let cfg = reveal_policy(policy)?;
        Ok(StaggeredReveal {
            core: RevealController::new(cfg).map_err(viewport_error)?,
            clock: JsClock::from_host(&host)?,
            visibility: JsVisibility::from_host(&host),
        })
    }

    /// Register target ids in list order.
    #[wasm_bindgen]
    pub fn mount(&mut self, targets: Vec<u32>) -> Result<(), JsError> {
        let ids: Vec<TargetId> = targets.into_iter().map(TargetId).collect();
        self.core
            .mount(&ids, &mut self.visibility)
            .map_err(viewport_error)
    }

    /// Feed `[{ subscription, target, intersecting, ratio }]`. Returns the
    /// number of reveals scheduled.
    #[wasm_bindgen(js_name = on_intersections)]
    pub fn on_intersections(&mut self, events: JsValue) -> Result<u32, JsError> {
        let events: Vec<VisibilityEvent> = parse(events, "intersections")?;
        Ok(self.core.on_visibility_batch(&events, &mut self.clock) as u32)
    }

    /// Deliver an elapsed timer. Returns the revealed target, if any.
    #[wasm_bindgen(js_name = fire_timer)]
    pub fn fire_timer(&mut self, timer: u32) -> Option<u32> {
        self.core.on_timer(TimerId(timer), &self.clock).map(|t| t.0)
    }

    #[wasm_bindgen(js_name = is_revealed)]
    pub fn is_revealed(&self, target: u32) -> bool {
        self.core.is_revealed(TargetId(target))
    }

    #[wasm_bindgen]
    pub fn revealed(&self) -> Vec<u32> {
        self.core.revealed_targets().into_iter().map(|t| t.0).collect()
    }

    #[wasm_bindgen(js_name = take_events)]
    pub fn take_events(&mut self) -> Result<JsValue, JsError> {
        swb::to_value(&self.core.take_events())
            .map_err(|e| JsError::new(&format!("events error: {e}")))
    }

    #[wasm_bindgen]
    pub fn teardown(&mut self) {
        self.core.teardown(&mut self.visibility, &mut self.clock);
    }
}

/// Viewport-gated media session bound to a JS host object.
#[wasm_bindgen]
pub struct MediaPlayback {
    core: MediaSession,
    clock: JsClock,
    visibility: JsVisibility,
    media: JsMedia,
}

#[wasm_bindgen]
impl MediaPlayback {
    #[wasm_bindgen(constructor)]
    pub fn new(session: u32, policy: JsValue, host: JsValue) -> Result<MediaPlayback, JsError> {
        set_panic_hook();
        let cfg = playback_policy(policy)?;
        Ok(MediaPlayback {
            core: MediaSession::new(SessionId(session), cfg).map_err(viewport_error)?,
            clock: JsClock::from_host(&host)?,
            visibility: JsVisibility::from_host(&host),
            media: JsMedia::from_host(&host)?,
        })
    }

    #[wasm_bindgen]
    pub fn mount(&mut self, target: u32) -> Result<(), JsError> {
        self.core
            .mount(TargetId(target), &mut self.visibility, &mut self.media)
            .map_err(viewport_error)
    }

    #[wasm_bindgen(js_name = attach_source)]
    pub fn attach_source(&mut self, media: u32) -> Result<(), JsError> {
        self.core
            .attach_source(MediaHandle(media), &mut self.clock)
            .map_err(viewport_error)
    }

    #[wasm_bindgen(js_name = clear_source)]
    pub fn clear_source(&mut self) {
        self.core.clear_source(&mut self.clock, &mut self.media);
    }

    #[wasm_bindgen(js_name = on_intersections)]
    pub fn on_intersections(&mut self, events: JsValue) -> Result<(), JsError> {
        let events: Vec<VisibilityEvent> = parse(events, "intersections")?;
        for event in &events {
            self.core.on_visibility(event, &mut self.media);
        }
        Ok(())
    }

    /// Forward an HTML media event by name (`canplay`, `error`, ...).
    /// Returns false for events that carry no load status.
    #[wasm_bindgen(js_name = on_media_event)]
    pub fn on_media_event(&mut self, name: &str) -> bool {
        match LoadSignal::from_event_name(name) {
            Some(signal) => {
                self.core
                    .on_load_signal(signal, &mut self.clock, &mut self.media);
                true
            }
            None => false,
        }
    }

    /// Returns true when the timer was the live load timeout.
    #[wasm_bindgen(js_name = fire_timer)]
    pub fn fire_timer(&mut self, timer: u32) -> bool {
        self.core.on_timer(TimerId(timer))
    }

    /// Settle a ticket returned by `host.play`. Pass undefined on success or
    /// the rejection reason.
    #[wasm_bindgen(js_name = settle_play)]
    pub fn settle_play(&mut self, ticket: u32, error: JsValue) {
        let outcome = if jsvalue_is_undefined_or_null(&error) {
            Ok(())
        } else {
            Err(PlayRejection::new(reason_of(&error)))
        };
        self.core
            .on_play_settled(PlayTicket(ticket), outcome, &mut self.media);
    }

    #[wasm_bindgen]
    pub fn phase(&self) -> String {
        self.core.phase().name().to_string()
    }

    #[wasm_bindgen]
    pub fn view(&self) -> Result<JsValue, JsError> {
        swb::to_value(&self.core.view()).map_err(|e| JsError::new(&format!("view error: {e}")))
    }

    #[wasm_bindgen(js_name = take_events)]
    pub fn take_events(&mut self) -> Result<JsValue, JsError> {
        swb::to_value(&self.core.take_events())
            .map_err(|e| JsError::new(&format!("events error: {e}")))
    }

    #[wasm_bindgen]
    pub fn teardown(&mut self) {
        self.core.teardown(&mut self.visibility, &mut self.clock);
    }
}

/// Numeric ABI version for compatibility checks at init.
#[wasm_bindgen]
pub fn abi_version() -> u32 {
    1
}
