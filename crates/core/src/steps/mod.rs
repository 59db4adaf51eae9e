//! Step abstraction and the ordered step registry.
//!
//! A step is one named unit of pipeline work: it takes the run context and
//! returns the context with its own outputs added, or a classified error.
//! The runner never inspects what a step does.

pub mod command;
pub mod registry;

pub use command::CommandStep;
pub use registry::{RegistryError, StepRegistry, StepRegistryBuilder};

use async_trait::async_trait;
use qap_protocol::run_models::{FailureKind, RunContext};
use thiserror::Error;

/// Classified failure of a step.
///
/// Every step failure is either worth retrying or not; there is no third
/// kind. Steps pick the variant, the runner decides what to do with it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StepError {
    /// A collaborator is temporarily unavailable (rate limit, timeout,
    /// network hiccup). The step may succeed if invoked again.
    #[error("{0}")]
    Transient(String),

    /// The input or the step itself is broken. Retrying cannot help.
    #[error("{0}")]
    Fatal(String),
}

impl StepError {
    pub fn transient(message: impl Into<String>) -> Self {
        StepError::Transient(message.into())
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        StepError::Fatal(message.into())
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            StepError::Transient(_) => FailureKind::Transient,
            StepError::Fatal(_) => FailureKind::Fatal,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, StepError::Transient(_))
    }
}

/// One unit of pipeline work.
///
/// Steps may be invoked more than once for the same cursor position (after a
/// transient failure, or after a crash between the step finishing and the
/// context being saved), so they must tolerate re-execution.
#[async_trait]
pub trait Step: Send + Sync {
    async fn run(&self, ctx: RunContext) -> Result<RunContext, StepError>;
}

/// Adapts a synchronous closure into a [`Step`].
pub struct FnStep<F> {
    func: F,
}

impl<F> FnStep<F>
where
    F: Fn(RunContext) -> Result<RunContext, StepError> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F> Step for FnStep<F>
where
    F: Fn(RunContext) -> Result<RunContext, StepError> + Send + Sync,
{
    async fn run(&self, ctx: RunContext) -> Result<RunContext, StepError> {
        (self.func)(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_error_kind() {
        assert_eq!(StepError::transient("rate limited").kind(), FailureKind::Transient);
        assert_eq!(StepError::fatal("bad input").kind(), FailureKind::Fatal);
        assert!(StepError::transient("x").is_transient());
        assert!(!StepError::fatal("x").is_transient());
    }

    #[test]
    fn test_step_error_display_is_the_message() {
        assert_eq!(
            StepError::transient("LLM service temporarily unavailable").to_string(),
            "LLM service temporarily unavailable"
        );
    }

    #[tokio::test]
    async fn test_fn_step_runs_closure() {
        let step = FnStep::new(|mut ctx: RunContext| {
            ctx.set_field("scenarios", "1. valid login")
                .map_err(|e| StepError::fatal(e.to_string()))?;
            Ok(ctx)
        });

        let ctx = step.run(RunContext::new(None)).await.unwrap();
        assert_eq!(ctx.get_str("scenarios"), Some("1. valid login"));
    }

    #[tokio::test]
    async fn test_fn_step_propagates_error() {
        let step = FnStep::new(|_ctx: RunContext| Err(StepError::fatal("no checklist")));

        let err = step.run(RunContext::new(None)).await.unwrap_err();
        assert_eq!(err, StepError::fatal("no checklist"));
    }
}
