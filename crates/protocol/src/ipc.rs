//! Trigger and notification protocol.
//!
//! This module defines the message types exchanged between the runner and
//! the layer that drives it (a chat bot, a terminal session, a web UI).
//!
//! The protocol follows an Operation/Event pattern:
//! - `Op`: Commands sent by the operator to the runner
//! - `Event`: Progress notifications pushed by the runner
//!
//! Events are fire-and-forget: the runner never waits for them to be
//! consumed, so a UI may lag behind or drop them without affecting a run.

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;
use uuid::Uuid;

use crate::run_models::FailureKind;

/// Operations an operator can request for a run.
///
/// Uses tagged enum serialization for TypeScript compatibility:
/// ```json
/// {
///   "type": "advance",
///   "payload": {
///     "owner": "chat-42",
///     "run_id": "uuid-here"
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Op {
    /// Create a new run for an owner from an input document.
    StartRun {
        owner: String,
        /// Name of the input document.
        file_name: String,
        /// Text content of the input document.
        content: String,
    },

    /// Run the step the cursor currently points at.
    Advance {
        owner: String,
        #[ts(type = "string")]
        run_id: Uuid,
    },

    /// Re-run the step that last failed transiently.
    Retry {
        owner: String,
        #[ts(type = "string")]
        run_id: Uuid,
    },

    /// Stop a run immediately and discard its state.
    Cancel {
        owner: String,
        #[ts(type = "string")]
        run_id: Uuid,
    },

    /// Discard the state of a finished run.
    Close {
        owner: String,
        #[ts(type = "string")]
        run_id: Uuid,
    },

    /// Request the persisted state of a run.
    GetStatus {
        #[ts(type = "string")]
        run_id: Uuid,
    },
}

/// Notifications pushed by the runner while it drives a run.
///
/// Uses tagged enum serialization for TypeScript compatibility:
/// ```json
/// {
///   "type": "stepRetrying",
///   "payload": {
///     "run_id": "uuid-here",
///     "step_name": "Generating Scenarios",
///     "attempt": 1,
///     "max_retries": 3,
///     "delay_ms": 1000
///   }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Event {
    /// A new run has been created and bound to its owner.
    RunStarted {
        #[ts(type = "string")]
        run_id: Uuid,
        owner: String,
        total_steps: usize,
    },

    /// A step is about to be invoked.
    ///
    /// `attempt` is 0 for a first invocation and counts recorded failures
    /// otherwise.
    StepRunning {
        #[ts(type = "string")]
        run_id: Uuid,
        step_name: String,
        step_index: usize,
        attempt: u32,
        max_retries: u32,
    },

    /// A step failed transiently and may be retried after `delay_ms`.
    StepRetrying {
        #[ts(type = "string")]
        run_id: Uuid,
        step_name: String,
        attempt: u32,
        max_retries: u32,
        delay_ms: u64,
    },

    /// A step completed and its results were persisted.
    StepSucceeded {
        #[ts(type = "string")]
        run_id: Uuid,
        step_name: String,
        step_index: usize,
    },

    /// A step failed and the run was torn down.
    StepFailed {
        #[ts(type = "string")]
        run_id: Uuid,
        step_name: String,
        kind: FailureKind,
        error: String,
        attempt: u32,
    },

    /// Artifacts were extracted for a completed step.
    ArtifactsPublished {
        #[ts(type = "string")]
        run_id: Uuid,
        step_name: String,
        count: usize,
    },

    /// The last step completed; the run waits to be closed.
    RunCompleted {
        #[ts(type = "string")]
        run_id: Uuid,
    },

    /// A run was cancelled by its owner.
    RunCancelled {
        #[ts(type = "string")]
        run_id: Uuid,
    },

    /// A run was closed and its state discarded.
    RunClosed {
        #[ts(type = "string")]
        run_id: Uuid,
    },

    /// No persisted state exists for the run; it must be started again.
    RunNotFound {
        #[ts(type = "string")]
        run_id: Uuid,
    },

    /// An advance was requested for a run that had already completed.
    AlreadyCompleted {
        #[ts(type = "string")]
        run_id: Uuid,
    },
}

impl Event {
    /// The run this event refers to.
    pub fn run_id(&self) -> Uuid {
        match self {
            Event::RunStarted { run_id, .. }
            | Event::StepRunning { run_id, .. }
            | Event::StepRetrying { run_id, .. }
            | Event::StepSucceeded { run_id, .. }
            | Event::StepFailed { run_id, .. }
            | Event::ArtifactsPublished { run_id, .. }
            | Event::RunCompleted { run_id }
            | Event::RunCancelled { run_id }
            | Event::RunClosed { run_id }
            | Event::RunNotFound { run_id }
            | Event::AlreadyCompleted { run_id } => *run_id,
        }
    }

    /// Whether this event reports a failure the operator should see.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Event::StepFailed { .. } | Event::StepRetrying { .. } | Event::RunNotFound { .. }
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::RunStarted {
                run_id,
                owner,
                total_steps,
            } => write!(
                f,
                "Run {run_id} initialized for {owner} ({total_steps} steps)"
            ),
            Event::StepRunning {
                step_name,
                attempt: 0,
                ..
            } => write!(f, "Running step: {step_name}..."),
            Event::StepRunning {
                step_name,
                attempt,
                max_retries,
                ..
            } => write!(
                f,
                "Retrying {step_name} (attempt {attempt}/{max_retries})..."
            ),
            Event::StepRetrying {
                step_name,
                attempt,
                max_retries,
                delay_ms,
                ..
            } => write!(
                f,
                "Step {step_name} failed (transient, attempt {attempt}/{max_retries}). Retry available in {delay_ms} ms"
            ),
            Event::StepSucceeded { step_name, .. } => write!(f, "Step {step_name} completed."),
            Event::StepFailed {
                step_name,
                kind,
                error,
                attempt,
                ..
            } => match kind {
                FailureKind::Transient => write!(
                    f,
                    "Step {step_name} failed (transient) after {attempt} retries: {error}"
                ),
                FailureKind::Fatal => write!(f, "Step {step_name} failed (fatal): {error}"),
            },
            Event::ArtifactsPublished {
                step_name, count, ..
            } => write!(f, "Published {count} artifact(s) for {step_name}."),
            Event::RunCompleted { run_id } => write!(f, "Run {run_id} completed."),
            Event::RunCancelled { run_id } => write!(f, "Run {run_id} cancelled."),
            Event::RunClosed { run_id } => write!(f, "Run {run_id} closed."),
            Event::RunNotFound { run_id } => {
                write!(f, "State for run {run_id} not found. Start a new run.")
            }
            Event::AlreadyCompleted { run_id } => write!(f, "Run {run_id} already completed."),
        }
    }
}
