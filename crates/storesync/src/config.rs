use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

/// Top-level configuration for the dispatcher and publisher hub.
///
/// Every field has a default, so a config file only needs to name what it
/// overrides:
///
/// ```toml
/// [hub]
/// failure_policy = "fail_fast"
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub dispatcher: DispatcherConfig,
    pub hub: HubConfig,
}

impl SyncConfig {
    pub fn from_toml_str(text: &str) -> SyncResult<Self> {
        toml::from_str(text).map_err(|e| SyncError::Config(e.to_string()))
    }

    pub fn from_path(path: &Path) -> SyncResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

/// Dispatcher behaviour.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Contain panics raised by a store's hooks to that store.
    pub catch_panics: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self { catch_panics: true }
    }
}

/// Publisher hub behaviour.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub failure_policy: FailurePolicy,
}

/// What the hub does when one sink fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Record the failure and keep delivering to the remaining sinks.
    #[default]
    Isolate,
    /// Stop at the first failing sink and return its error.
    FailFast,
}
