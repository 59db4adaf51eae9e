//! Configuration file loader for `.qa-pipeline/` directory structure.
//!
//! This module provides functionality to load and parse all configuration files
//! from the `.qa-pipeline/` directory, including:
//! - `config.toml`: Global settings
//! - `pipelines/*.yaml`: Pipeline definitions

use crate::config::error::ConfigError;
use crate::config::error::ConfigResult;
use crate::config::models::AppConfig;
use qap_protocol::config_models::GlobalConfig;
use qap_protocol::pipeline_models::PipelineDefinition;
use std::collections::HashSet;
use std::path::Path;
use walkdir::WalkDir;

/// Name of the configuration directory under a project root.
pub const CONFIG_DIR: &str = ".qa-pipeline";

/// Loads all configuration from the `.qa-pipeline/` directory.
///
/// This function scans the `.qa-pipeline/` directory and loads:
/// - Global configuration from `config.toml`
/// - Pipeline definitions from `pipelines/*.yaml` files
///
/// # Arguments
///
/// * `root` - Root directory containing the `.qa-pipeline/` folder
///
/// # Returns
///
/// An `AppConfig` containing all loaded configuration. If directories or files
/// are missing, returns a default configuration rather than an error.
///
/// # Errors
///
/// Returns `ConfigError` if:
/// - Files exist but cannot be read
/// - Files have invalid TOML or YAML syntax
/// - Two pipelines share a name, or a pipeline repeats a step name
pub async fn load_config(root: &Path) -> ConfigResult<AppConfig> {
    let qa_dir = root.join(CONFIG_DIR);

    if !qa_dir.exists() {
        tracing::debug!(root = %root.display(), "no configuration directory, using defaults");
        return Ok(AppConfig {
            root: root.to_path_buf(),
            ..AppConfig::default()
        });
    }

    let global = load_global_config(&qa_dir)?;
    let pipelines = load_pipelines(&qa_dir)?;

    tracing::debug!(
        root = %root.display(),
        pipelines = pipelines.len(),
        "configuration loaded"
    );

    Ok(AppConfig {
        root: root.to_path_buf(),
        global,
        pipelines,
    })
}

/// Loads global configuration from `config.toml`.
fn load_global_config(qa_dir: &Path) -> ConfigResult<GlobalConfig> {
    let config_path = qa_dir.join("config.toml");

    if !config_path.exists() {
        return Ok(GlobalConfig::default());
    }

    let content =
        std::fs::read_to_string(&config_path).map_err(|source| ConfigError::FileRead {
            path: config_path.clone(),
            source,
        })?;

    let config: GlobalConfig =
        toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
            path: config_path.clone(),
            source,
        })?;

    if config.event_buffer == 0 {
        return Err(ConfigError::InvalidConfig {
            path: config_path,
            reason: "event-buffer must be greater than zero".to_string(),
        });
    }

    Ok(config)
}

/// Loads all pipeline definitions from `pipelines/*.yaml`.
fn load_pipelines(qa_dir: &Path) -> ConfigResult<Vec<PipelineDefinition>> {
    let pipelines_dir = qa_dir.join("pipelines");

    if !pipelines_dir.exists() {
        return Ok(Vec::new());
    }

    let mut pipelines: Vec<PipelineDefinition> = Vec::new();
    let mut names = HashSet::new();

    for entry in WalkDir::new(&pipelines_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
    {
        let entry = entry.map_err(|source| ConfigError::DirectoryWalk {
            path: pipelines_dir.clone(),
            source,
        })?;

        let path = entry.path();

        // Only process .yaml and .yml files
        let ext = path.extension().and_then(|s| s.to_str());
        if ext != Some("yaml") && ext != Some("yml") {
            continue;
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

        let pipeline: PipelineDefinition =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::YamlParse {
                path: path.to_path_buf(),
                source,
            })?;

        validate_pipeline(&pipeline, path)?;

        if !names.insert(pipeline.name.clone()) {
            return Err(ConfigError::InvalidConfig {
                path: path.to_path_buf(),
                reason: format!("pipeline '{}' is defined more than once", pipeline.name),
            });
        }

        pipelines.push(pipeline);
    }

    Ok(pipelines)
}

fn validate_pipeline(pipeline: &PipelineDefinition, path: &Path) -> ConfigResult<()> {
    let invalid = |reason: String| ConfigError::InvalidConfig {
        path: path.to_path_buf(),
        reason,
    };

    if pipeline.steps.is_empty() {
        return Err(invalid(format!("pipeline '{}' has no steps", pipeline.name)));
    }

    let mut seen = HashSet::new();
    for step in &pipeline.steps {
        if step.name.trim().is_empty() {
            return Err(invalid("step names must not be empty".to_string()));
        }
        if !seen.insert(step.name.as_str()) {
            return Err(invalid(format!("step '{}' appears more than once", step.name)));
        }
    }

    Ok(())
}
