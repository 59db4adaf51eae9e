//! Step runner.
//!
//! The StepRunner drives a run one step per call. Each `advance` loads the
//! run context, resolves the step under its cursor, invokes it and then
//! either persists the advanced context, schedules a retry, or tears the
//! run down. There is no background execution: a call returns only once
//! the step and any backoff delay have finished.
//!
//! Calls for the same run must be serialized by the caller. Calls for
//! different runs are independent.

pub mod error;
pub mod outcome;

pub use error::{RunnerError, RunnerResult};
pub use outcome::{AdvanceOutcome, RunStatus};

use crate::artifacts::ArtifactHooks;
use crate::state::cursor::{advance_cursor, resolve_cursor, Cursor};
use crate::state::{RetryPolicy, RetryTracker, RunRegistry};
use crate::steps::StepRegistry;
use crate::store::ContextStore;
use qap_protocol::ipc::Event;
use qap_protocol::run_models::{RunContext, RunPhase};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::Sender;
use uuid::Uuid;

/// Drives runs through an ordered step registry.
///
/// Owns the process-local ownership and retry maps. Construct one per
/// process and share it behind an `Arc`.
pub struct StepRunner {
    registry: StepRegistry,
    store: Arc<dyn ContextStore>,
    runs: RunRegistry,
    retries: RetryTracker,
    policy: RetryPolicy,
    hooks: ArtifactHooks,
    events_tx: Sender<Event>,
}

impl StepRunner {
    /// Create a runner with the default retry policy and no artifact hooks.
    ///
    /// # Arguments
    ///
    /// * `registry` - The ordered steps every run goes through
    /// * `store` - Where run contexts are persisted
    /// * `events_tx` - Channel for progress notifications
    pub fn new(registry: StepRegistry, store: Arc<dyn ContextStore>, events_tx: Sender<Event>) -> Self {
        Self {
            registry,
            store,
            runs: RunRegistry::new(),
            retries: RetryTracker::new(),
            policy: RetryPolicy::default(),
            hooks: ArtifactHooks::new(),
            events_tx,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_hooks(mut self, hooks: ArtifactHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn runs(&self) -> &RunRegistry {
        &self.runs
    }

    pub fn retries(&self) -> &RetryTracker {
        &self.retries
    }

    /// Create a run for `owner`, seeded with `fields`.
    ///
    /// # Errors
    ///
    /// - `RunInProgress` if the owner is already bound to a run
    /// - `Storage` if the new context cannot be saved; the owner stays free
    pub async fn start_run(
        &self,
        owner: &str,
        fields: BTreeMap<String, serde_json::Value>,
    ) -> RunnerResult<RunContext> {
        let first_step = self.registry.name_at(0).map(str::to_string);
        let ctx = RunContext::new(first_step).with_fields(fields);

        if let Err(existing) = self.runs.claim(owner, ctx.run_id).await {
            return Err(RunnerError::RunInProgress {
                owner: owner.to_string(),
                run_id: existing,
            });
        }

        if let Err(e) = self.store.save(&ctx).await {
            self.runs.unbind_if(owner, ctx.run_id).await;
            return Err(e.into());
        }
        self.retries.clear(owner).await;

        tracing::info!(run_id = %ctx.run_id, owner, steps = self.registry.len(), "run started");
        self.emit(Event::RunStarted {
            run_id: ctx.run_id,
            owner: owner.to_string(),
            total_steps: self.registry.len(),
        });

        Ok(ctx)
    }

    /// Run the step under the cursor of `run_id` on behalf of `owner`.
    ///
    /// `is_retry` marks a caller-requested retry; it only affects logging,
    /// the retry budget is tracked independently.
    ///
    /// # Errors
    ///
    /// - `Storage` if loading or saving the context failed; the run is
    ///   left as it was
    /// - `UnknownStep` if the context points at a step that is no longer
    ///   registered
    pub async fn advance(&self, owner: &str, run_id: Uuid, is_retry: bool) -> RunnerResult<AdvanceOutcome> {
        if let Some(previous) = self.runs.bind(owner, run_id).await {
            tracing::debug!(owner, %run_id, %previous, "owner re-attached to a different run");
            self.retries.clear(owner).await;
        }

        let ctx = match self.store.load(run_id).await {
            Ok(ctx) => ctx,
            Err(e) if e.is_not_found() => {
                tracing::warn!(owner, %run_id, "no state for run");
                self.runs.unbind_if(owner, run_id).await;
                self.retries.clear(owner).await;
                self.emit(Event::RunNotFound { run_id });
                return Ok(AdvanceOutcome::NotFound);
            }
            Err(e) => return Err(e.into()),
        };

        let (index, step_name) = match resolve_cursor(&ctx, &self.registry) {
            Cursor::At { index, name } => (index, name),
            Cursor::Complete => {
                tracing::info!(owner, %run_id, "run already completed, tearing down");
                self.teardown(owner, run_id).await?;
                self.emit(Event::AlreadyCompleted { run_id });
                return Ok(AdvanceOutcome::AlreadyCompleted);
            }
            Cursor::Unknown(step_name) => {
                tracing::error!(owner, %run_id, step = %step_name, "context points at an unregistered step");
                return Err(RunnerError::UnknownStep { run_id, step_name });
            }
        };

        let Some((_, step)) = self.registry.get(index) else {
            return Err(RunnerError::UnknownStep { run_id, step_name });
        };

        let attempt = self.retries.attempts_so_far(owner, &step_name).await;
        if is_retry && attempt == 0 {
            tracing::debug!(owner, %run_id, step = %step_name, "retry requested without a recorded failure");
        }
        tracing::debug!(owner, %run_id, step = %step_name, step_index = index, attempt, "invoking step");
        self.emit(Event::StepRunning {
            run_id,
            step_name: step_name.clone(),
            step_index: index,
            attempt,
            max_retries: self.policy.max_retries,
        });

        let created_at = ctx.created_at;
        match step.run(ctx).await {
            Ok(mut next) => {
                next.run_id = run_id;
                next.created_at = created_at;
                let completed = advance_cursor(&mut next, index, &self.registry);
                self.store.save(&next).await?;
                self.retries.reset(owner, &step_name).await;

                tracing::info!(owner, %run_id, step = %step_name, step_index = next.step_index, "step succeeded");
                self.emit(Event::StepSucceeded {
                    run_id,
                    step_name: step_name.clone(),
                    step_index: index,
                });
                self.publish_artifacts(&step_name, &next).await;

                if completed {
                    tracing::info!(owner, %run_id, "run completed");
                    self.emit(Event::RunCompleted { run_id });
                }

                Ok(AdvanceOutcome::Succeeded {
                    step: step_name,
                    step_index: next.step_index,
                    completed,
                })
            }
            Err(err) if err.is_transient() && self.policy.can_retry(attempt) => {
                let failures = self.retries.record_failure(owner, &step_name).await;
                let delay = self.policy.next_backoff_delay(attempt);

                tracing::warn!(
                    owner,
                    %run_id,
                    step = %step_name,
                    attempt = failures,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "step failed transiently, retry scheduled"
                );
                self.emit(Event::StepRetrying {
                    run_id,
                    step_name: step_name.clone(),
                    attempt: failures,
                    max_retries: self.policy.max_retries,
                    delay_ms: delay.as_millis() as u64,
                });

                tokio::time::sleep(delay).await;

                Ok(AdvanceOutcome::RetryScheduled {
                    step: step_name,
                    attempt: failures,
                    delay,
                })
            }
            Err(err) => {
                let kind = err.kind();
                let error = err.to_string();

                tracing::error!(owner, %run_id, step = %step_name, %kind, attempt, error = %error, "step failed, tearing down run");
                self.teardown(owner, run_id).await?;
                self.emit(Event::StepFailed {
                    run_id,
                    step_name: step_name.clone(),
                    kind,
                    error: error.clone(),
                    attempt,
                });

                Ok(AdvanceOutcome::Failed {
                    step: step_name,
                    kind,
                    error,
                })
            }
        }
    }

    /// Stop a run unconditionally and discard its state.
    ///
    /// A step already executing for the run is not interrupted.
    pub async fn cancel(&self, owner: &str, run_id: Uuid) -> RunnerResult<()> {
        self.teardown(owner, run_id).await?;
        tracing::info!(owner, %run_id, "run cancelled");
        self.emit(Event::RunCancelled { run_id });
        Ok(())
    }

    /// Discard the state of a run, normally after it completed.
    pub async fn close(&self, owner: &str, run_id: Uuid) -> RunnerResult<()> {
        self.teardown(owner, run_id).await?;
        tracing::info!(owner, %run_id, "run closed");
        self.emit(Event::RunClosed { run_id });
        Ok(())
    }

    /// Load the persisted state of a run, `None` if it does not exist.
    pub async fn status(&self, run_id: Uuid) -> RunnerResult<Option<RunStatus>> {
        let context = match self.store.load(run_id).await {
            Ok(ctx) => ctx,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let total_steps = self.registry.len();
        let (phase, next_step) = match resolve_cursor(&context, &self.registry) {
            Cursor::At { index: 0, name } => (RunPhase::Initialized, Some(name)),
            Cursor::At { name, .. } => (RunPhase::InProgress, Some(name)),
            Cursor::Complete => (RunPhase::Completed, None),
            Cursor::Unknown(name) => (context.phase(total_steps), Some(name)),
        };

        Ok(Some(RunStatus {
            phase,
            total_steps,
            next_step,
            context,
        }))
    }

    /// Delete the context, then release the owner and its retry counters.
    ///
    /// Nothing is released if the delete fails.
    async fn teardown(&self, owner: &str, run_id: Uuid) -> RunnerResult<()> {
        self.store.delete(run_id).await?;
        self.runs.unbind_if(owner, run_id).await;
        self.retries.clear(owner).await;
        tracing::debug!(owner, %run_id, "run torn down");
        Ok(())
    }

    async fn publish_artifacts(&self, step_name: &str, ctx: &RunContext) {
        let Some(hook) = self.hooks.get(step_name) else {
            return;
        };

        match hook.publish(step_name, ctx).await {
            Ok(0) => tracing::debug!(run_id = %ctx.run_id, step = step_name, "no artifacts to publish"),
            Ok(count) => self.emit(Event::ArtifactsPublished {
                run_id: ctx.run_id,
                step_name: step_name.to_string(),
                count,
            }),
            Err(e) => tracing::warn!(run_id = %ctx.run_id, step = step_name, error = %e, "artifact hook failed"),
        }
    }

    fn emit(&self, event: Event) {
        match self.events_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                tracing::warn!(run_id = %event.run_id(), "notification channel full, dropping event");
            }
            Err(TrySendError::Closed(event)) => {
                tracing::warn!(run_id = %event.run_id(), "notification channel closed, dropping event");
            }
        }
    }
}

impl std::fmt::Debug for StepRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepRunner")
            .field("registry", &self.registry)
            .field("policy", &self.policy)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::StepError;
    use crate::store::MemoryContextStore;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn noop(ctx: RunContext) -> Result<RunContext, StepError> {
        Ok(ctx)
    }

    fn runner(registry: StepRegistry) -> (StepRunner, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(64);
        let runner = StepRunner::new(registry, Arc::new(MemoryContextStore::new()), tx)
            .with_policy(RetryPolicy::new(3, Duration::from_millis(1)));
        (runner, rx)
    }

    #[tokio::test]
    async fn test_start_run_seeds_context() {
        let registry = StepRegistry::builder().register_fn("A", noop).build().unwrap();
        let (runner, mut rx) = runner(registry);

        let mut fields = BTreeMap::new();
        fields.insert("file_name".to_string(), serde_json::json!("checklist.txt"));
        let ctx = runner.start_run("chat-1", fields).await.unwrap();

        assert_eq!(ctx.step_index, 0);
        assert_eq!(ctx.current_step.as_deref(), Some("A"));
        assert_eq!(ctx.get_str("file_name"), Some("checklist.txt"));
        assert_eq!(runner.runs().get("chat-1").await, Some(ctx.run_id));
        assert_eq!(
            rx.try_recv().unwrap(),
            Event::RunStarted {
                run_id: ctx.run_id,
                owner: "chat-1".to_string(),
                total_steps: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_full_channel_does_not_block() {
        let registry = StepRegistry::builder().register_fn("A", noop).build().unwrap();
        let (tx, _rx) = mpsc::channel(1);
        let runner = StepRunner::new(registry, Arc::new(MemoryContextStore::new()), tx);

        let ctx = runner.start_run("chat-1", BTreeMap::new()).await.unwrap();
        let outcome = runner.advance("chat-1", ctx.run_id, false).await.unwrap();

        assert!(matches!(outcome, AdvanceOutcome::Succeeded { completed: true, .. }));
    }

    #[tokio::test]
    async fn test_status_reports_phase() {
        let registry = StepRegistry::builder()
            .register_fn("A", noop)
            .register_fn("B", noop)
            .build()
            .unwrap();
        let (runner, _rx) = runner(registry);
        let ctx = runner.start_run("chat-1", BTreeMap::new()).await.unwrap();

        let status = runner.status(ctx.run_id).await.unwrap().unwrap();
        assert_eq!(status.phase, RunPhase::Initialized);
        assert_eq!(status.next_step.as_deref(), Some("A"));

        runner.advance("chat-1", ctx.run_id, false).await.unwrap();
        let status = runner.status(ctx.run_id).await.unwrap().unwrap();
        assert_eq!(status.phase, RunPhase::InProgress);
        assert_eq!(status.next_step.as_deref(), Some("B"));

        runner.advance("chat-1", ctx.run_id, false).await.unwrap();
        let status = runner.status(ctx.run_id).await.unwrap().unwrap();
        assert_eq!(status.phase, RunPhase::Completed);
        assert_eq!(status.next_step, None);
        assert_eq!(status.total_steps, 2);

        assert!(runner.status(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[test]
    fn test_outcome_liveness() {
        assert!(AdvanceOutcome::RetryScheduled {
            step: "A".to_string(),
            attempt: 1,
            delay: Duration::from_millis(1),
        }
        .is_live());
        assert!(!AdvanceOutcome::Succeeded {
            step: "C".to_string(),
            step_index: 3,
            completed: true,
        }
        .is_live());
        assert!(!AdvanceOutcome::NotFound.is_live());
    }
}
