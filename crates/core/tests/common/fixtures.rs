//! Runner fixtures.

use super::steps::ScriptedStep;
use super::stores::FlakyStore;
use qap_core::state::RetryPolicy;
use qap_core::steps::StepRegistry;
use qap_core::store::ContextStore;
use qap_core::StepRunner;
use qap_protocol::ipc::Event;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub const OWNER: &str = "chat-42";

/// Backoff base used by tests, small enough to keep the suite fast.
pub const TEST_BACKOFF: Duration = Duration::from_millis(5);

/// A runner wired to scripted steps, a flaky store and an event receiver.
#[allow(dead_code)]
pub struct Harness {
    pub runner: StepRunner,
    pub store: Arc<FlakyStore>,
    pub events: mpsc::Receiver<Event>,
    pub steps: Vec<ScriptedStep>,
}

#[allow(dead_code)]
impl Harness {
    /// Events received so far.
    pub fn drain_events(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    pub fn step(&self, name: &str) -> &ScriptedStep {
        self.steps
            .iter()
            .find(|s| s.name() == name)
            .unwrap_or_else(|| panic!("no step named {name}"))
    }
}

pub fn registry_of(steps: &[ScriptedStep]) -> StepRegistry {
    steps
        .iter()
        .fold(StepRegistry::builder(), |builder, step| {
            builder.register(step.name(), step.clone())
        })
        .build()
        .expect("valid registry")
}

/// Build a runner over `steps` backed by a fresh store.
pub fn harness(steps: Vec<ScriptedStep>) -> Harness {
    harness_with_store(steps, Arc::new(FlakyStore::new()))
}

/// Build a runner over `steps` backed by an existing store.
pub fn harness_with_store(steps: Vec<ScriptedStep>, store: Arc<FlakyStore>) -> Harness {
    let (tx, rx) = mpsc::channel(256);
    let shared: Arc<dyn ContextStore> = store.clone();
    let runner = StepRunner::new(registry_of(&steps), shared, tx)
        .with_policy(RetryPolicy::new(3, TEST_BACKOFF));

    Harness {
        runner,
        store,
        events: rx,
        steps,
    }
}

/// The A, B, C pipeline.
pub fn abc_steps() -> Vec<ScriptedStep> {
    vec![
        ScriptedStep::new("A"),
        ScriptedStep::new("B"),
        ScriptedStep::new("C"),
    ]
}

/// Fields a run is seeded with when a checklist is uploaded.
pub fn checklist_fields() -> BTreeMap<String, serde_json::Value> {
    let mut fields = BTreeMap::new();
    fields.insert(
        "file_name".to_string(),
        serde_json::json!("checklist_login.txt"),
    );
    fields.insert(
        "txt".to_string(),
        serde_json::json!("- user can log in\n- locked user sees an error"),
    );
    fields
}
