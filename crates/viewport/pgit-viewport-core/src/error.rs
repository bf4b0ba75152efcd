//! Error types for the viewport controllers

use serde::{Deserialize, Serialize};

use crate::ids::TargetId;
use crate::media::MediaPhase;

/// Errors returned by controller operations.
///
/// None of these are fatal to the host: every variant describes a call that was
/// ignored, and the controller state is left untouched.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ViewportError {
    /// A policy field is out of range
    #[error("Invalid config: {field} {reason}")]
    InvalidConfig { field: String, reason: String },

    /// A CSS-like length could not be parsed
    #[error("Invalid length: '{input}'")]
    InvalidLength { input: String },

    /// `attach_source` on a session that already has one
    #[error("Source already attached (phase: {phase:?})")]
    SourceAlreadyAttached { phase: MediaPhase },

    /// A controller may only register its targets once
    #[error("Controller is already mounted")]
    AlreadyMounted,

    /// The same target appears twice in one observation set
    #[error("Duplicate target: {target:?}")]
    DuplicateTarget { target: TargetId },

    /// The controller was torn down; it accepts no further work
    #[error("Controller has been torn down")]
    TornDown,
}

impl ViewportError {
    pub(crate) fn invalid_config(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// Misuse races (double attach, late calls after teardown) are expected in UI
    /// hosts and can be dropped; configuration mistakes cannot.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::SourceAlreadyAttached { .. } | Self::AlreadyMounted | Self::TornDown
        )
    }

    /// Get error category for logging
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } | Self::InvalidLength { .. } => "config",
            Self::SourceAlreadyAttached { .. } => "media",
            Self::AlreadyMounted | Self::DuplicateTarget { .. } => "observation",
            Self::TornDown => "lifecycle",
        }
    }
}
