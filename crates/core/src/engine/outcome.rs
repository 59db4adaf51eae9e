//! Results reported by the runner.

use qap_protocol::run_models::{FailureKind, RunContext, RunPhase};
use std::time::Duration;

/// What a single advance call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// The step succeeded and the advanced context was saved.
    Succeeded {
        step: String,
        /// Cursor after the step.
        step_index: usize,
        /// Whether this was the last step.
        completed: bool,
    },

    /// The step failed transiently; the backoff has elapsed and the caller
    /// may retry.
    RetryScheduled {
        step: String,
        /// Failures recorded for this step, including this one.
        attempt: u32,
        delay: Duration,
    },

    /// The step failed for good and the run was torn down.
    Failed {
        step: String,
        kind: FailureKind,
        error: String,
    },

    /// No context exists for the run.
    NotFound,

    /// The run had already completed; it has now been torn down.
    AlreadyCompleted,
}

impl AdvanceOutcome {
    /// Whether the caller can keep advancing this run.
    pub fn is_live(&self) -> bool {
        match self {
            AdvanceOutcome::Succeeded { completed, .. } => !completed,
            AdvanceOutcome::RetryScheduled { .. } => true,
            AdvanceOutcome::Failed { .. }
            | AdvanceOutcome::NotFound
            | AdvanceOutcome::AlreadyCompleted => false,
        }
    }
}

/// Snapshot of a persisted run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunStatus {
    pub phase: RunPhase,
    pub total_steps: usize,
    /// Step the cursor points at, `None` once complete.
    pub next_step: Option<String>,
    pub context: RunContext,
}
