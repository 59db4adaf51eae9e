//! Error types for runner calls.
//!
//! Step failures are not errors here: they are outcomes of an advance and
//! are reported through [`AdvanceOutcome`](super::AdvanceOutcome). A
//! `RunnerError` means the call itself could not be carried out and the
//! run was left as it was.

use crate::store::StoreError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum RunnerError {
    /// The context store failed. The caller may re-issue the call.
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    /// The persisted cursor names a step the registry does not contain.
    #[error("Run {run_id} is positioned at step '{step_name}', which is not registered")]
    UnknownStep { run_id: Uuid, step_name: String },

    /// The owner is already driving another run.
    #[error("Owner '{owner}' already has an active run {run_id}")]
    RunInProgress { owner: String, run_id: Uuid },
}

impl RunnerError {
    pub fn is_storage(&self) -> bool {
        matches!(self, RunnerError::Storage(_))
    }
}

/// Type alias for Result with RunnerError.
pub type RunnerResult<T> = Result<T, RunnerError>;
