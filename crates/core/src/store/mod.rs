//! Durable persistence of run contexts.
//!
//! A [`ContextStore`] holds exactly one [`RunContext`] per run identifier.
//! It is the only durable resource the runner touches: the persisted cursor
//! is the recovery point after a restart.
//!
//! Backends:
//! - [`FileContextStore`]: one JSON document per run on the local filesystem
//! - [`MemoryContextStore`]: in-process map, for embedding and tests

pub mod file;
pub mod memory;

pub use file::FileContextStore;
pub use memory::MemoryContextStore;

use async_trait::async_trait;
use qap_protocol::run_models::RunContext;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised by a context store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No context exists for the run.
    #[error("No stored context for run {0}")]
    NotFound(Uuid),

    /// The backing storage could not be read or written.
    #[error("Storage I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A stored document could not be encoded or decoded.
    #[error("Failed to (de)serialize context for run {run_id}: {source}")]
    Serialization {
        run_id: Uuid,
        source: serde_json::Error,
    },

    /// Backend-specific failure that has no richer representation.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Type alias for Result with StoreError.
pub type StoreResult<T> = Result<T, StoreError>;

/// Key/value persistence of run contexts, keyed by run identifier.
///
/// Implementations must make `save` atomic from the point of view of a
/// concurrent `load`: either the previous or the new version is observed,
/// never a partial write. Writes for the same run are last-writer-wins.
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Write the full context, replacing any earlier version for its run.
    async fn save(&self, ctx: &RunContext) -> StoreResult<()>;

    /// Read the context for `run_id`, failing with [`StoreError::NotFound`]
    /// when none exists.
    async fn load(&self, run_id: Uuid) -> StoreResult<RunContext>;

    /// Remove the context for `run_id`. Deleting an absent run succeeds.
    async fn delete(&self, run_id: Uuid) -> StoreResult<()>;
}
