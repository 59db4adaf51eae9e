//! Immutable, ordered registry of named steps.
//!
//! The registry is assembled once at startup with [`StepRegistryBuilder`]
//! and never changes afterwards. Its order is part of every in-flight run's
//! persisted state, which is why contexts also record the name of the step
//! their cursor points at.

use super::command::CommandStep;
use super::{FnStep, Step, StepError};
use qap_protocol::pipeline_models::PipelineDefinition;
use qap_protocol::run_models::RunContext;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while assembling a registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Two steps were registered under the same name.
    #[error("Step '{0}' is registered more than once")]
    DuplicateStep(String),

    /// A step was registered with an empty name.
    #[error("Step names must not be empty")]
    EmptyName,
}

/// Collects steps in execution order.
#[derive(Default)]
pub struct StepRegistryBuilder {
    steps: Vec<(String, Arc<dyn Step>)>,
}

impl StepRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step to the end of the pipeline.
    pub fn register(mut self, name: impl Into<String>, step: impl Step + 'static) -> Self {
        self.steps.push((name.into(), Arc::new(step)));
        self
    }

    /// Append a synchronous function as a step.
    pub fn register_fn<F>(self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(RunContext) -> Result<RunContext, StepError> + Send + Sync + 'static,
    {
        self.register(name, FnStep::new(func))
    }

    /// Freeze the registry, rejecting empty or duplicate names.
    pub fn build(self) -> Result<StepRegistry, RegistryError> {
        let mut positions = HashMap::with_capacity(self.steps.len());
        for (index, (name, _)) in self.steps.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(RegistryError::EmptyName);
            }
            if positions.insert(name.clone(), index).is_some() {
                return Err(RegistryError::DuplicateStep(name.clone()));
            }
        }

        Ok(StepRegistry {
            steps: self.steps,
            positions,
        })
    }
}

/// Ordered, immutable list of named steps.
pub struct StepRegistry {
    steps: Vec<(String, Arc<dyn Step>)>,
    positions: HashMap<String, usize>,
}

impl StepRegistry {
    pub fn builder() -> StepRegistryBuilder {
        StepRegistryBuilder::new()
    }

    /// Build a registry of [`CommandStep`]s from a pipeline definition.
    ///
    /// Commands run with `working_dir` as their current directory.
    pub fn from_pipeline(
        pipeline: &PipelineDefinition,
        working_dir: &Path,
    ) -> Result<Self, RegistryError> {
        pipeline
            .steps
            .iter()
            .fold(StepRegistryBuilder::new(), |builder, def| {
                builder.register(
                    def.name.clone(),
                    CommandStep::from_definition(def, working_dir),
                )
            })
            .build()
    }

    /// The step at a zero-based position.
    pub fn get(&self, index: usize) -> Option<(&str, Arc<dyn Step>)> {
        self.steps
            .get(index)
            .map(|(name, step)| (name.as_str(), Arc::clone(step)))
    }

    /// Name of the step at a zero-based position.
    pub fn name_at(&self, index: usize) -> Option<&str> {
        self.steps.get(index).map(|(name, _)| name.as_str())
    }

    /// Position of the step with the given name.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Step names in execution order.
    pub fn names(&self) -> Vec<&str> {
        self.steps.iter().map(|(name, _)| name.as_str()).collect()
    }
}

impl std::fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepRegistry")
            .field("steps", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qap_protocol::pipeline_models::StepDefinition;

    fn noop(ctx: RunContext) -> Result<RunContext, StepError> {
        Ok(ctx)
    }

    #[test]
    fn test_registry_preserves_order() {
        let registry = StepRegistry::builder()
            .register_fn("PII Masking", noop)
            .register_fn("Generating Scenarios", noop)
            .register_fn("Generating Test Cases", noop)
            .build()
            .unwrap();

        assert_eq!(registry.len(), 3);
        assert_eq!(
            registry.names(),
            vec!["PII Masking", "Generating Scenarios", "Generating Test Cases"]
        );
        assert_eq!(registry.name_at(1), Some("Generating Scenarios"));
        assert_eq!(registry.position("Generating Test Cases"), Some(2));
        assert!(registry.get(0).is_some());
        assert!(registry.get(3).is_none());
        assert_eq!(registry.position("Uploading Artifacts"), None);
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let result = StepRegistry::builder()
            .register_fn("A", noop)
            .register_fn("B", noop)
            .register_fn("A", noop)
            .build();

        assert_eq!(
            result.unwrap_err(),
            RegistryError::DuplicateStep("A".to_string())
        );
    }

    #[test]
    fn test_registry_rejects_empty_name() {
        let result = StepRegistry::builder().register_fn("  ", noop).build();
        assert_eq!(result.unwrap_err(), RegistryError::EmptyName);
    }

    #[test]
    fn test_empty_registry_is_allowed() {
        let registry = StepRegistry::builder().build().unwrap();
        assert!(registry.is_empty());
        assert!(registry.get(0).is_none());
    }

    #[test]
    fn test_registry_from_pipeline() {
        let step = |name: &str| StepDefinition {
            name: name.to_string(),
            command: "true".to_string(),
            args: Vec::new(),
            transient_exit_codes: vec![75],
            timeout_secs: None,
            artifact: None,
        };
        let pipeline = PipelineDefinition {
            name: "login".to_string(),
            steps: vec![step("PII Masking"), step("Generating Scenarios")],
        };

        let registry = StepRegistry::from_pipeline(&pipeline, Path::new(".")).unwrap();
        assert_eq!(registry.names(), vec!["PII Masking", "Generating Scenarios"]);
        assert_eq!(format!("{registry:?}"), r#"StepRegistry { steps: ["PII Masking", "Generating Scenarios"] }"#);
    }
}
