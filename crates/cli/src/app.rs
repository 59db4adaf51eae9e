//! Wiring between configuration, the runner and the terminal.
//!
//! `App` builds a `StepRunner` for one pipeline and executes `Op`s against
//! it. Events are printed by a background task as the runner emits them.

use crate::render;
use color_eyre::eyre::{bail, eyre, Result, WrapErr};
use qap_core::artifacts::ArtifactHooks;
use qap_core::config::{load_config, AppConfig};
use qap_core::state::RetryPolicy;
use qap_core::steps::StepRegistry;
use qap_core::store::FileContextStore;
use qap_core::{AdvanceOutcome, RunStatus, StepRunner};
use qap_protocol::ipc::{Event, Op};
use qap_protocol::pipeline_models::PipelineDefinition;
use qap_protocol::run_models::RunContext;
use std::collections::BTreeMap;
use std::path::Path;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Result of executing one `Op`.
#[derive(Debug)]
pub enum Reply {
    Started(RunContext),
    Advanced(AdvanceOutcome),
    Stopped,
    Status(Option<RunStatus>),
}

pub struct App {
    runner: StepRunner,
    printer: JoinHandle<()>,
}

/// Pick the pipeline named `name`, or the only one configured.
pub fn select_pipeline<'a>(config: &'a AppConfig, name: Option<&str>) -> Result<&'a PipelineDefinition> {
    match name {
        Some(name) => config
            .pipeline(name)
            .ok_or_else(|| eyre!("Pipeline '{name}' is not defined in .qa-pipeline/pipelines")),
        None => match config.pipelines.as_slice() {
            [only] => Ok(only),
            [] => bail!("No pipelines found in {}", config.root.join(".qa-pipeline/pipelines").display()),
            _ => bail!("Several pipelines are configured; choose one with --pipeline"),
        },
    }
}

impl App {
    /// Load configuration under `project` and build a runner for `pipeline`.
    pub async fn load(project: &Path, pipeline: Option<&str>) -> Result<Self> {
        let config = load_config(project)
            .await
            .wrap_err_with(|| format!("Failed to load configuration from {}", project.display()))?;
        let definition = select_pipeline(&config, pipeline)?;

        let registry = StepRegistry::from_pipeline(definition, project)?;
        let hooks = ArtifactHooks::from_pipeline(definition, &config.artifacts_dir());
        let store = FileContextStore::new(config.state_dir());
        let (events_tx, events_rx) = mpsc::channel(config.global.event_buffer);

        tracing::debug!(
            pipeline = %definition.name,
            steps = registry.len(),
            state_dir = %store.root().display(),
            "runner configured"
        );

        let runner = StepRunner::new(registry, std::sync::Arc::new(store), events_tx)
            .with_policy(RetryPolicy::from_config(&config.global))
            .with_hooks(hooks);

        Ok(Self {
            runner,
            printer: spawn_printer(events_rx),
        })
    }

    /// Execute one operation against the runner.
    pub async fn execute(&self, op: Op) -> Result<Reply> {
        let reply = match op {
            Op::StartRun {
                owner,
                file_name,
                content,
            } => {
                let mut fields = BTreeMap::new();
                fields.insert("file_name".to_string(), serde_json::Value::String(file_name));
                fields.insert("txt".to_string(), serde_json::Value::String(content));
                Reply::Started(self.runner.start_run(&owner, fields).await?)
            }
            Op::Advance { owner, run_id } => {
                Reply::Advanced(self.runner.advance(&owner, run_id, false).await?)
            }
            Op::Retry { owner, run_id } => {
                Reply::Advanced(self.runner.advance(&owner, run_id, true).await?)
            }
            Op::Cancel { owner, run_id } => {
                self.runner.cancel(&owner, run_id).await?;
                Reply::Stopped
            }
            Op::Close { owner, run_id } => {
                self.runner.close(&owner, run_id).await?;
                Reply::Stopped
            }
            Op::GetStatus { run_id } => Reply::Status(self.runner.status(run_id).await?),
        };
        Ok(reply)
    }

    /// Drop the runner and wait until every emitted event has been printed.
    pub async fn shutdown(self) {
        let Self { runner, printer } = self;
        drop(runner);
        let _ = printer.await;
    }
}

fn spawn_printer(mut events_rx: mpsc::Receiver<Event>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            println!("{}", render::event_line(&event));
        }
    })
}
