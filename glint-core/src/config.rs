//! Runtime configuration.
//!
//! A runtime is usually built with [`RuntimeConfig::default`]. Embedders that
//! keep their settings in a JSON document can parse one with
//! [`RuntimeConfig::from_json`]; missing fields take their defaults.

use serde::Deserialize;

use crate::error::Result;

/// Settings for a [`Runtime`](crate::reactive::Runtime).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Enables checks that are only useful while developing, such as
    /// rejecting the removal of a destructor that was never registered.
    pub debug_checks: bool,

    /// Skip a consumed tag when it is the same tag as the one consumed
    /// immediately before it in the same frame.
    pub dedupe_consumed_tags: bool,

    /// Number of destroyable meta entries after which entries belonging to
    /// dropped objects are swept from the store.
    pub destroyable_sweep_threshold: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            debug_checks: cfg!(debug_assertions),
            dedupe_consumed_tags: true,
            destroyable_sweep_threshold: 64,
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }
}
