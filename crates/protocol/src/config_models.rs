//! Global configuration models for `.qa-pipeline/config.toml`.
//!
//! This module defines the structure of the global configuration file that
//! controls retry policy and where run state and artifacts are kept.

use serde::Deserialize;
use serde::Serialize;
use std::path::PathBuf;
use ts_rs::TS;

/// Represents global settings from `.qa-pipeline/config.toml`.
///
/// Every key is optional; missing keys take the defaults below.
///
/// # Example
///
/// ```toml
/// # .qa-pipeline/config.toml
/// max-retries = 3
/// backoff-base-ms = 1000
/// state-dir = ".qa-pipeline/state"
/// artifacts-dir = ".qa-pipeline/artifacts"
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(rename_all = "kebab-case", default)]
pub struct GlobalConfig {
    /// Retries allowed for a transiently failing step before the run is
    /// torn down.
    pub max_retries: u32,

    /// Base unit of the exponential backoff, in milliseconds.
    ///
    /// The delay before retry `n` (counted from 0) is `base * 2^n`.
    #[ts(type = "number")]
    pub backoff_base_ms: u64,

    /// Directory holding persisted run contexts.
    ///
    /// Relative paths are resolved against the project root.
    pub state_dir: PathBuf,

    /// Directory artifact hooks write into.
    pub artifacts_dir: PathBuf,

    /// Capacity of the notification channel.
    pub event_buffer: usize,
}

impl GlobalConfig {
    pub const DEFAULT_MAX_RETRIES: u32 = 3;
    pub const DEFAULT_BACKOFF_BASE_MS: u64 = 1000;
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            max_retries: Self::DEFAULT_MAX_RETRIES,
            backoff_base_ms: Self::DEFAULT_BACKOFF_BASE_MS,
            state_dir: PathBuf::from(".qa-pipeline/state"),
            artifacts_dir: PathBuf::from(".qa-pipeline/artifacts"),
            event_buffer: 256,
        }
    }
}
