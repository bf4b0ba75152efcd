//! Policy configuration for the observer and both controllers.
//!
//! Every struct deserializes from partial JSON (`#[serde(default)]`), so hosts
//! only spell out the fields they change. Presets reproduce the three widgets
//! on the site.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ViewportError;

/// CSS-like length used for the observer root margin.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Length {
    Px(f32),
    /// Percentage of the viewport height.
    Percent(f32),
}

impl Length {
    pub const ZERO: Length = Length::Px(0.0);

    /// Resolve to pixels against the given viewport height.
    #[inline]
    pub fn resolve(&self, viewport_height: f32) -> f32 {
        match *self {
            Length::Px(px) => px,
            Length::Percent(pct) => viewport_height * pct / 100.0,
        }
    }
}

impl Default for Length {
    fn default() -> Self {
        Self::ZERO
    }
}

impl FromStr for Length {
    type Err = ViewportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || ViewportError::InvalidLength {
            input: s.to_string(),
        };
        let (number, ctor): (&str, fn(f32) -> Length) =
            if let Some(n) = trimmed.strip_suffix('%') {
                (n, Length::Percent)
            } else if let Some(n) = trimmed.strip_suffix("px") {
                (n, Length::Px)
            } else {
                // A bare zero is the only unitless length CSS accepts.
                (trimmed, Length::Px)
            };
        let value: f32 = number.trim().parse().map_err(|_| invalid())?;
        if !value.is_finite() {
            return Err(invalid());
        }
        if number.trim() == trimmed && value != 0.0 {
            return Err(invalid());
        }
        Ok(ctor(value))
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Length::Px(v) => write!(f, "{v}px"),
            Length::Percent(v) => write!(f, "{v}%"),
        }
    }
}

impl TryFrom<String> for Length {
    type Error = ViewportError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Length> for String {
    fn from(value: Length) -> Self {
        value.to_string()
    }
}

/// Visibility detection settings shared by both controllers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverConfig {
    /// Fraction of the target area that must be inside the (margin-adjusted)
    /// viewport before the target counts as visible.
    pub threshold_fraction: f32,
    /// Bottom root margin; negative values shrink the viewport from below.
    pub root_margin_bottom: Length,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            threshold_fraction: 0.0,
            root_margin_bottom: Length::ZERO,
        }
    }
}

impl ObserverConfig {
    pub fn validate(&self) -> Result<(), ViewportError> {
        if !(0.0..=1.0).contains(&self.threshold_fraction) {
            return Err(ViewportError::invalid_config(
                "threshold_fraction",
                format!("must be within 0..=1, got {}", self.threshold_fraction),
            ));
        }
        Ok(())
    }
}

/// Policy for a staggered reveal list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevealConfig {
    /// Per-index delay multiplier in milliseconds.
    pub stagger_ms: u32,
    pub observer: ObserverConfig,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self::feature_grid()
    }
}

impl RevealConfig {
    /// Feature cards: 90 ms cascade, 20 % coverage.
    pub fn feature_grid() -> Self {
        Self {
            stagger_ms: 90,
            observer: ObserverConfig {
                threshold_fraction: 0.2,
                root_margin_bottom: Length::Percent(-10.0),
            },
        }
    }

    /// Install steps: 120 ms cascade, 15 % coverage.
    pub fn steps_timeline() -> Self {
        Self {
            stagger_ms: 120,
            observer: ObserverConfig {
                threshold_fraction: 0.15,
                root_margin_bottom: Length::Percent(-10.0),
            },
        }
    }

    /// Delay before the target at `index` is revealed.
    #[inline]
    pub fn delay_for(&self, index: u32) -> Duration {
        Duration::from_millis(u64::from(self.stagger_ms) * u64::from(index))
    }

    pub fn validate(&self) -> Result<(), ViewportError> {
        self.observer.validate()
    }
}

/// Policy for a viewport-gated media session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub observer: ObserverConfig,
    /// How long a source may stay in `Loading` before it is declared failed.
    pub load_timeout_ms: u32,
    /// Consecutive rejected play requests tolerated before the session stops
    /// asking. `None` retries on every viewport enter.
    pub play_retry_limit: Option<u32>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self::video_placeholder()
    }
}

impl PlaybackConfig {
    /// Demo video: play at 50 % coverage, give up loading after 10 s.
    pub fn video_placeholder() -> Self {
        Self {
            observer: ObserverConfig {
                threshold_fraction: 0.5,
                root_margin_bottom: Length::ZERO,
            },
            load_timeout_ms: 10_000,
            play_retry_limit: None,
        }
    }

    #[inline]
    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.load_timeout_ms))
    }

    pub fn validate(&self) -> Result<(), ViewportError> {
        self.observer.validate()?;
        if self.load_timeout_ms == 0 {
            return Err(ViewportError::invalid_config(
                "load_timeout_ms",
                "must be greater than zero",
            ));
        }
        if self.play_retry_limit == Some(0) {
            return Err(ViewportError::invalid_config(
                "play_retry_limit",
                "must allow at least one attempt",
            ));
        }
        Ok(())
    }
}
