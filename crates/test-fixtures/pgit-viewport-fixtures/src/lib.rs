//! Shared JSON fixtures: widget policies and recorded scroll traces.
//!
//! Everything is addressed by category and name through
//! `fixtures/manifest.json` at the workspace root, so tests never hard-code
//! fixture paths.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;

/// Manifest section name to `{ fixture name: relative path }`.
type Sections = BTreeMap<String, BTreeMap<String, String>>;

static SECTIONS: Lazy<Sections> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../../../fixtures/manifest.json"))
        .expect("fixtures/manifest.json is valid")
});

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Category {
    RevealPolicies,
    PlaybackPolicies,
    ScrollTraces,
}

impl Category {
    fn section(self) -> &'static str {
        match self {
            Self::RevealPolicies => "reveal-policies",
            Self::PlaybackPolicies => "playback-policies",
            Self::ScrollTraces => "scroll-traces",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::RevealPolicies => "reveal policy",
            Self::PlaybackPolicies => "playback policy",
            Self::ScrollTraces => "scroll trace",
        }
    }

    fn entries(self) -> &'static BTreeMap<String, String> {
        static EMPTY: BTreeMap<String, String> = BTreeMap::new();
        SECTIONS.get(self.section()).unwrap_or(&EMPTY)
    }

    /// Names in this category, sorted.
    fn names(self) -> Vec<String> {
        self.entries().keys().cloned().collect()
    }

    /// Absolute path of a named fixture.
    fn locate(self, name: &str) -> Result<PathBuf> {
        let rel = self
            .entries()
            .get(name)
            .ok_or_else(|| anyhow!("unknown {} fixture '{name}'", self.label()))?;
        Ok(PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../../../fixtures")
            .join(rel))
    }

    fn text(self, name: &str) -> Result<String> {
        let path = self.locate(name)?;
        fs::read_to_string(&path)
            .with_context(|| format!("reading {} fixture {}", self.label(), path.display()))
    }

    fn decode<T: DeserializeOwned>(self, name: &str) -> Result<T> {
        serde_json::from_str(&self.text(name)?)
            .with_context(|| format!("decoding {} fixture '{name}'", self.label()))
    }
}

pub mod reveal_policies {
    use super::*;

    const CATEGORY: Category = Category::RevealPolicies;

    pub fn keys() -> Vec<String> {
        CATEGORY.names()
    }

    pub fn json(name: &str) -> Result<String> {
        CATEGORY.text(name)
    }

    pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
        CATEGORY.decode(name)
    }
}

pub mod playback_policies {
    use super::*;

    const CATEGORY: Category = Category::PlaybackPolicies;

    pub fn keys() -> Vec<String> {
        CATEGORY.names()
    }

    pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
        CATEGORY.decode(name)
    }
}

pub mod scroll_traces {
    use super::*;

    const CATEGORY: Category = Category::ScrollTraces;

    pub fn keys() -> Vec<String> {
        CATEGORY.names()
    }

    pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
        CATEGORY.decode(name)
    }
}
