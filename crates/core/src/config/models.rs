//! Configuration models that aggregate all settings.
//!
//! This module provides the unified `AppConfig` structure that combines
//! global settings and pipeline definitions into a single configuration
//! object.

use qap_protocol::config_models::GlobalConfig;
use qap_protocol::pipeline_models::PipelineDefinition;
use std::path::{Path, PathBuf};

/// Unified application configuration loaded from `.qa-pipeline/` directory.
///
/// This structure aggregates all configuration sources:
/// - `config.toml`: Global settings
/// - `pipelines/*.yaml`: Pipeline definitions
///
/// # Example
///
/// ```rust,no_run
/// use qap_core::config::loader::load_config;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new(".")).await?;
/// println!("Loaded {} pipelines", config.pipelines.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Project root the configuration was loaded from.
    pub root: PathBuf,

    /// Global settings from `config.toml`.
    pub global: GlobalConfig,

    /// All pipeline definitions loaded from `pipelines/*.yaml`.
    pub pipelines: Vec<PipelineDefinition>,
}

impl AppConfig {
    /// Look up a pipeline by name.
    pub fn pipeline(&self, name: &str) -> Option<&PipelineDefinition> {
        self.pipelines.iter().find(|p| p.name == name)
    }

    /// Directory for persisted contexts, resolved against the project root.
    pub fn state_dir(&self) -> PathBuf {
        self.resolve(&self.global.state_dir)
    }

    /// Directory for published artifacts, resolved against the project root.
    pub fn artifacts_dir(&self) -> PathBuf {
        self.resolve(&self.global.artifacts_dir)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}
