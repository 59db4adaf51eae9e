//! # qap-core
//!
//! Step pipeline runner for the QA pipeline.
//!
//! This crate provides:
//! - Configuration loading from `.qa-pipeline/` directory
//! - An ordered, immutable registry of named steps
//! - Durable run contexts behind the `ContextStore` trait
//! - The `StepRunner` state machine with transient retry and teardown
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and management
//! - [`steps`]: Step trait, command-backed steps and the step registry
//! - [`store`]: Context persistence (filesystem and in-memory)
//! - [`state`]: Owner bindings, retry counters and cursor helpers
//! - [`engine`]: The step runner
//! - [`artifacts`]: Post-success artifact hooks

pub mod artifacts;
pub mod config;
pub mod engine;
pub mod state;
pub mod steps;
pub mod store;

pub use engine::{AdvanceOutcome, RunStatus, RunnerError, RunnerResult, StepRunner};
