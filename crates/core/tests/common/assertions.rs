//! Event assertion helpers.

use qap_protocol::ipc::Event;
use qap_protocol::run_models::FailureKind;

/// Names of the events in order, for compact sequence assertions.
#[allow(dead_code)]
pub fn event_kinds(events: &[Event]) -> Vec<&'static str> {
    events
        .iter()
        .map(|event| match event {
            Event::RunStarted { .. } => "RunStarted",
            Event::StepRunning { .. } => "StepRunning",
            Event::StepRetrying { .. } => "StepRetrying",
            Event::StepSucceeded { .. } => "StepSucceeded",
            Event::StepFailed { .. } => "StepFailed",
            Event::ArtifactsPublished { .. } => "ArtifactsPublished",
            Event::RunCompleted { .. } => "RunCompleted",
            Event::RunCancelled { .. } => "RunCancelled",
            Event::RunClosed { .. } => "RunClosed",
            Event::RunNotFound { .. } => "RunNotFound",
            Event::AlreadyCompleted { .. } => "AlreadyCompleted",
        })
        .collect()
}

/// Backoff delays announced by `StepRetrying` events, in milliseconds.
#[allow(dead_code)]
pub fn retry_delays(events: &[Event]) -> Vec<u64> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::StepRetrying { delay_ms, .. } => Some(*delay_ms),
            _ => None,
        })
        .collect()
}

/// Assert that a `StepFailed` event with `kind` was emitted for `step`.
#[allow(dead_code)]
pub fn assert_step_failed(events: &[Event], step: &str, kind: FailureKind) {
    assert!(
        events.iter().any(|event| matches!(
            event,
            Event::StepFailed { step_name, kind: k, .. } if step_name == step && *k == kind
        )),
        "expected {kind} StepFailed for {step}, got: {events:?}"
    );
}
