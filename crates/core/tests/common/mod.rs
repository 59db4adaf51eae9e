//! Common test utilities shared by the runner integration tests.
//!
//! This module provides:
//! - Scripted steps that count invocations and replay failures
//! - A context store with injectable failures
//! - Runner fixtures and event assertions

pub mod assertions;
pub mod fixtures;
pub mod steps;
pub mod stores;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use steps::*;
#[allow(unused_imports)]
pub use stores::*;
