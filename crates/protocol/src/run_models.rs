//! Runtime run state models.
//!
//! This module defines the context threaded through the steps of a single
//! pipeline run, together with the coarse phase a run is observed to be in.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ts_rs::TS;
use uuid::Uuid;

/// Coarse lifecycle phase of a run, derived from its cursor.
///
/// A torn down run has no context at all, so it has no phase.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunPhase {
    /// Context exists and no step has completed yet.
    Initialized,

    /// At least one step has completed and at least one remains.
    InProgress,

    /// Every registered step has completed.
    ///
    /// The context is retained until the run is explicitly closed.
    Completed,
}

/// How a step failure is treated by the runner.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    /// Retried with exponential backoff up to the retry limit.
    Transient,

    /// Ends the run immediately.
    Fatal,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Transient => f.write_str("transient"),
            FailureKind::Fatal => f.write_str("fatal"),
        }
    }
}

/// The durable state of one pipeline run.
///
/// Persisted as a single JSON document per `run_id`. `step_index` and
/// `fields` are always written together, so a stored context never has a
/// cursor that disagrees with the step outputs it carries.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
pub struct RunContext {
    /// Unique identifier for this run, fixed at creation.
    #[ts(type = "string")]
    pub run_id: Uuid,

    /// Zero-based cursor into the step registry.
    ///
    /// Equal to the number of registered steps once the run is complete.
    pub step_index: usize,

    /// Name of the step the cursor points at, `None` once complete.
    ///
    /// Stored so the cursor can be re-resolved by name if the registry
    /// order changes between releases.
    #[serde(default)]
    pub current_step: Option<String>,

    /// Values produced by steps, keyed by field name.
    #[serde(default)]
    #[ts(type = "Record<string, unknown>")]
    pub fields: BTreeMap<String, serde_json::Value>,

    /// When the run was created.
    pub created_at: DateTime<Utc>,

    /// When the context was last written by the runner.
    pub updated_at: DateTime<Utc>,
}

impl RunContext {
    /// Create a fresh context at step 0 with a new run identifier.
    pub fn new(first_step: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            step_index: 0,
            current_step: first_step,
            fields: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Seed the context with an initial set of fields.
    pub fn with_fields(mut self, fields: BTreeMap<String, serde_json::Value>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Store a serializable value under `key`, replacing any previous value.
    pub fn set_field<T: Serialize>(
        &mut self,
        key: impl Into<String>,
        value: T,
    ) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(value)?;
        self.fields.insert(key.into(), value);
        Ok(())
    }

    /// Read the value under `key` as `T`.
    ///
    /// Returns `None` when the field is absent or has a different shape.
    pub fn get_field<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.fields
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Borrow a string field without cloning.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(serde_json::Value::as_str)
    }

    pub fn contains_field(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn remove_field(&mut self, key: &str) -> Option<serde_json::Value> {
        self.fields.remove(key)
    }

    /// Phase of this run for a registry holding `total_steps` steps.
    pub fn phase(&self, total_steps: usize) -> RunPhase {
        if self.step_index >= total_steps {
            RunPhase::Completed
        } else if self.step_index == 0 {
            RunPhase::Initialized
        } else {
            RunPhase::InProgress
        }
    }
}
