//! Pipeline definition models for `.qa-pipeline/pipelines/*.yaml`.
//!
//! A pipeline definition names an ordered list of steps. Each step runs an
//! external command that reads the run context on stdin and reports new
//! fields on stdout.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Exit code conventionally used for "temporary failure, try again".
pub const EX_TEMPFAIL: i32 = 75;

fn default_transient_exit_codes() -> Vec<i32> {
    vec![EX_TEMPFAIL]
}

/// Which context field a step publishes as an artifact, and under what name.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(rename_all = "kebab-case")]
pub struct ArtifactSpec {
    /// Context field holding the artifact content.
    pub field: String,

    /// File name the content is written to inside the run's artifact folder.
    pub file_name: String,
}

/// One step of a pipeline.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(rename_all = "kebab-case")]
pub struct StepDefinition {
    /// Unique, human-readable step name.
    pub name: String,

    /// Program to execute.
    pub command: String,

    /// Arguments passed to the program.
    #[serde(default)]
    pub args: Vec<String>,

    /// Exit codes that mean the step may succeed if retried.
    #[serde(default = "default_transient_exit_codes")]
    pub transient_exit_codes: Vec<i32>,

    /// Upper bound on the step's run time. Exceeding it is a transient
    /// failure.
    #[serde(default)]
    #[ts(type = "number | null")]
    pub timeout_secs: Option<u64>,

    /// Artifact extracted after the step succeeds.
    #[serde(default)]
    pub artifact: Option<ArtifactSpec>,
}

/// Defines a full pipeline.
///
/// # Example
///
/// ```yaml
/// name: saucedemo-login
/// steps:
///   - name: "PII Masking"
///     command: "./steps/pii_scan.py"
///     artifact:
///       field: masked_txt
///       file-name: masked_checklist.txt
///   - name: "Generating Scenarios"
///     command: "./steps/generate_scenarios.py"
///     timeout-secs: 120
///     artifact:
///       field: scenarios
///       file-name: scenarios.txt
///   - name: "Running Autotests"
///     command: "pytest"
///     args: ["--json-report"]
///     transient-exit-codes: [75, 3]
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(rename_all = "kebab-case")]
pub struct PipelineDefinition {
    /// Unique name identifying this pipeline.
    pub name: String,

    /// Ordered steps. The order is part of every run's persisted state.
    pub steps: Vec<StepDefinition>,
}

impl PipelineDefinition {
    /// Names of all steps, in execution order.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }
}
