//! Cursor resolution and movement for run contexts.
//!
//! The persisted step name is authoritative; the index is used only for
//! contexts that do not record a name.

use crate::steps::StepRegistry;
use chrono::Utc;
use qap_protocol::run_models::RunContext;

/// Where a run's cursor points in the current registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    /// The step at `index` is next.
    At { index: usize, name: String },

    /// Every step has completed.
    Complete,

    /// The context names a step the registry does not contain.
    Unknown(String),
}

/// Resolve the context's cursor against `registry`.
pub fn resolve_cursor(ctx: &RunContext, registry: &StepRegistry) -> Cursor {
    match ctx.current_step.as_deref() {
        Some(name) => match registry.position(name) {
            Some(index) => {
                if index != ctx.step_index {
                    tracing::warn!(
                        run_id = %ctx.run_id,
                        step = name,
                        stored_index = ctx.step_index,
                        resolved_index = index,
                        "step moved in registry, following its name"
                    );
                }
                Cursor::At {
                    index,
                    name: name.to_string(),
                }
            }
            None => Cursor::Unknown(name.to_string()),
        },
        None => match registry.name_at(ctx.step_index) {
            Some(name) => Cursor::At {
                index: ctx.step_index,
                name: name.to_string(),
            },
            None => Cursor::Complete,
        },
    }
}

/// Move the cursor past the step at `completed_index`.
///
/// Returns `true` when no steps remain.
pub fn advance_cursor(ctx: &mut RunContext, completed_index: usize, registry: &StepRegistry) -> bool {
    let next = completed_index + 1;
    ctx.step_index = next;
    ctx.current_step = registry.name_at(next).map(str::to_string);
    ctx.updated_at = Utc::now();
    ctx.current_step.is_none()
}
