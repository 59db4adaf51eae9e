//! # qap-protocol
//!
//! Core protocol definitions and data models for qa-pipeline.
//!
//! This crate defines all shared data structures used for:
//! - Configuration file parsing (TOML settings, YAML pipeline definitions)
//! - Persisted run state
//! - Notifications between the runner and whatever UI drives it
//!
//! ## Modules
//!
//! - [`config_models`]: Global configuration from config.toml
//! - [`pipeline_models`]: Pipeline and step definitions
//! - [`run_models`]: Persisted run context and run phase
//! - [`ipc`]: Operations and Events exchanged with the driving UI
//!
//! ## Design Principles
//!
//! - Minimal dependencies: Only serde, ts-rs, chrono and uuid
//! - TypeScript generation: All types derive `TS` for client compatibility
//! - Independent compilation: No dependencies on other qa-pipeline crates

pub mod config_models;
pub mod ipc;
pub mod pipeline_models;
pub mod run_models;

// Re-export all public types for convenience
pub use config_models::*;
pub use ipc::*;
pub use pipeline_models::*;
pub use run_models::*;
