//! Process-local run state.
//!
//! This module provides:
//! - `RunRegistry`: which run each owner is driving
//! - `RetryTracker` and `RetryPolicy`: transient failure accounting
//! - cursor helpers shared by the runner
//!
//! None of this survives a restart. The durable state of a run is its
//! context in the `ContextStore`.

pub mod cursor;
pub mod registry;
pub mod retry;

pub use registry::RunRegistry;
pub use retry::{RetryPolicy, RetryTracker};
