//! Steps with scripted behaviour.

use async_trait::async_trait;
use qap_core::steps::{Step, StepError};
use qap_protocol::run_models::RunContext;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A step that counts its invocations and fails according to a script.
///
/// Queued errors are returned one per invocation; once the queue is empty
/// the step succeeds, appending its name to the `trail` field and writing
/// `"<name> output"` under its output key.
#[derive(Clone)]
pub struct ScriptedStep {
    inner: Arc<Inner>,
}

struct Inner {
    name: String,
    output_key: String,
    calls: AtomicUsize,
    script: Mutex<VecDeque<StepError>>,
}

#[allow(dead_code)]
impl ScriptedStep {
    pub fn new(name: &str) -> Self {
        Self::with_output(name, &output_key(name))
    }

    pub fn with_output(name: &str, output_key: &str) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.to_string(),
                output_key: output_key.to_string(),
                calls: AtomicUsize::new(0),
                script: Mutex::new(VecDeque::new()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Queue `count` transient failures.
    pub fn fail_transiently(self, count: usize) -> Self {
        {
            let mut script = self.inner.script.lock().unwrap();
            for n in 0..count {
                script.push_back(StepError::transient(format!(
                    "{} service unavailable ({})",
                    self.inner.name,
                    n + 1
                )));
            }
        }
        self
    }

    /// Queue one fatal failure.
    pub fn fail_fatally(self, message: &str) -> Self {
        self.inner
            .script
            .lock()
            .unwrap()
            .push_back(StepError::fatal(message));
        self
    }

    pub fn calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }
}

/// Field a [`ScriptedStep`] writes on success.
pub fn output_key(step_name: &str) -> String {
    format!("{}_output", step_name.to_lowercase().replace(' ', "_"))
}

#[async_trait]
impl Step for ScriptedStep {
    async fn run(&self, mut ctx: RunContext) -> Result<RunContext, StepError> {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);

        let scripted = self.inner.script.lock().unwrap().pop_front();
        if let Some(err) = scripted {
            return Err(err);
        }

        let mut trail: Vec<String> = ctx.get_field("trail").unwrap_or_default();
        trail.push(self.inner.name.clone());
        ctx.set_field("trail", trail)
            .map_err(|e| StepError::fatal(e.to_string()))?;
        ctx.set_field(
            self.inner.output_key.clone(),
            format!("{} output", self.inner.name),
        )
        .map_err(|e| StepError::fatal(e.to_string()))?;
        Ok(ctx)
    }
}
