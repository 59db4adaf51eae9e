//! Terminal rendering of runner events and run state.

use colored::Colorize;
use qap_core::RunStatus;
use qap_protocol::ipc::Event;
use qap_protocol::pipeline_models::PipelineDefinition;

/// One colored line for an event.
pub fn event_line(event: &Event) -> String {
    let text = event.to_string();
    match event {
        Event::StepRunning { .. } => text.cyan().to_string(),
        Event::StepRetrying { .. } => text.yellow().to_string(),
        Event::StepSucceeded { .. } | Event::ArtifactsPublished { .. } => text.green().to_string(),
        Event::RunCompleted { .. } => text.green().bold().to_string(),
        Event::StepFailed { .. } | Event::RunNotFound { .. } => text.red().bold().to_string(),
        Event::RunStarted { .. }
        | Event::RunCancelled { .. }
        | Event::RunClosed { .. }
        | Event::AlreadyCompleted { .. } => text.bold().to_string(),
    }
}

/// Numbered step list of a pipeline.
pub fn steps_list(pipeline: &PipelineDefinition) -> String {
    let mut out = format!("{}\n", pipeline.name.bold());
    for (index, step) in pipeline.steps.iter().enumerate() {
        let command = std::iter::once(step.command.as_str())
            .chain(step.args.iter().map(String::as_str).take(1))
            .collect::<Vec<_>>()
            .join(" ");
        out.push_str(&format!(
            "{:>3}. {} {}\n",
            index + 1,
            step.name,
            format!("({command})").dimmed()
        ));
    }
    out
}

/// Multi-line summary of a persisted run.
pub fn status_block(status: &RunStatus) -> String {
    let ctx = &status.context;
    let position = match &status.next_step {
        Some(step) => format!(
            "{}/{} ({step})",
            (ctx.step_index + 1).min(status.total_steps),
            status.total_steps
        ),
        None => format!("{}/{} (done)", ctx.step_index, status.total_steps),
    };
    let fields = ctx.fields.keys().map(String::as_str).collect::<Vec<_>>().join(", ");

    format!(
        "{} {}\n  phase:   {:?}\n  step:    {position}\n  fields:  {fields}\n  updated: {}\n",
        "Run".bold(),
        ctx.run_id,
        status.phase,
        ctx.updated_at.to_rfc3339(),
    )
}
