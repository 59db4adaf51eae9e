//! Post-success artifact hooks.
//!
//! After a step succeeds and its context is saved, the runner looks up the
//! hook registered under that step's name and lets it extract whatever the
//! step produced. A hook failure is reported but never fails the step.

use async_trait::async_trait;
use qap_protocol::pipeline_models::{ArtifactSpec, PipelineDefinition};
use qap_protocol::run_models::RunContext;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Failed to write artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to render field '{field}': {source}")]
    Render {
        field: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Artifact file name '{0}' must be a relative path inside the run directory")]
    InvalidFileName(String),

    #[error("{0}")]
    Other(String),
}

pub type ArtifactResult<T> = Result<T, ArtifactError>;

/// Extracts artifacts from a context after a step succeeded.
#[async_trait]
pub trait ArtifactHook: Send + Sync {
    /// Publish artifacts for `step_name`, returning how many were published.
    async fn publish(&self, step_name: &str, ctx: &RunContext) -> ArtifactResult<usize>;
}

/// Step name to hook lookup table.
#[derive(Default, Clone)]
pub struct ArtifactHooks {
    hooks: HashMap<String, Arc<dyn ArtifactHook>>,
}

impl ArtifactHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `hook` for `step_name`, replacing any earlier hook.
    pub fn register(mut self, step_name: impl Into<String>, hook: impl ArtifactHook + 'static) -> Self {
        self.hooks.insert(step_name.into(), Arc::new(hook));
        self
    }

    /// One [`FieldArtifactHook`] per step that declares an artifact.
    pub fn from_pipeline(pipeline: &PipelineDefinition, artifacts_dir: &Path) -> Self {
        pipeline
            .steps
            .iter()
            .filter_map(|step| step.artifact.as_ref().map(|spec| (&step.name, spec)))
            .fold(Self::new(), |hooks, (name, spec)| {
                hooks.register(name.clone(), FieldArtifactHook::from_spec(spec, artifacts_dir))
            })
    }

    pub fn get(&self, step_name: &str) -> Option<Arc<dyn ArtifactHook>> {
        self.hooks.get(step_name).cloned()
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl std::fmt::Debug for ArtifactHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut steps: Vec<&str> = self.hooks.keys().map(String::as_str).collect();
        steps.sort_unstable();
        f.debug_struct("ArtifactHooks").field("steps", &steps).finish()
    }
}

/// Writes one context field to `<root>/<run_id>/<file_name>`.
///
/// String fields are written verbatim, any other value as pretty JSON.
/// A missing or null field publishes nothing.
#[derive(Debug, Clone)]
pub struct FieldArtifactHook {
    field: String,
    file_name: String,
    root: PathBuf,
}

impl FieldArtifactHook {
    pub fn new(field: impl Into<String>, file_name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            field: field.into(),
            file_name: file_name.into(),
            root: root.into(),
        }
    }

    pub fn from_spec(spec: &ArtifactSpec, root: &Path) -> Self {
        Self::new(spec.field.clone(), spec.file_name.clone(), root)
    }

    /// Where the artifact for `ctx` is written.
    pub fn target_path(&self, ctx: &RunContext) -> ArtifactResult<PathBuf> {
        let relative = Path::new(&self.file_name);
        let contained = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if self.file_name.is_empty() || !contained {
            return Err(ArtifactError::InvalidFileName(self.file_name.clone()));
        }
        Ok(self.root.join(ctx.run_id.to_string()).join(relative))
    }
}

#[async_trait]
impl ArtifactHook for FieldArtifactHook {
    async fn publish(&self, step_name: &str, ctx: &RunContext) -> ArtifactResult<usize> {
        let content = match ctx.fields.get(&self.field) {
            None | Some(serde_json::Value::Null) => return Ok(0),
            Some(serde_json::Value::String(text)) => text.clone(),
            Some(value) => serde_json::to_string_pretty(value).map_err(|source| {
                ArtifactError::Render {
                    field: self.field.clone(),
                    source,
                }
            })?,
        };

        let path = self.target_path(ctx)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ArtifactError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(|source| ArtifactError::Io {
                path: path.clone(),
                source,
            })?;

        tracing::debug!(
            run_id = %ctx.run_id,
            step = step_name,
            path = %path.display(),
            "artifact written"
        );
        Ok(1)
    }
}
