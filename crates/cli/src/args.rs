//! CLI argument definitions.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

/// Drive the QA step pipeline one step at a time.
#[derive(Debug, Parser)]
#[command(name = "qa-pipeline")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to project root (overrides current directory)
    #[arg(short, long, global = true)]
    pub project: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the steps of a pipeline in execution order
    Steps(PipelineArgs),

    /// Create a run from an input checklist
    Start(StartArgs),

    /// Run the next step of a run
    Advance(AdvanceArgs),

    /// Stop a run and discard its state
    Cancel(RunArgs),

    /// Discard the state of a finished run
    Close(RunArgs),

    /// Show the persisted state of a run
    Status(StatusArgs),

    /// Drive runs interactively from stdin
    Session(SessionArgs),
}

#[derive(Debug, Args)]
pub struct PipelineArgs {
    /// Pipeline name (optional when only one pipeline is configured)
    #[arg(long)]
    pub pipeline: Option<String>,
}

#[derive(Debug, Args)]
pub struct StartArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// Key identifying who drives the run
    #[arg(long, default_value = "cli")]
    pub owner: String,

    /// Checklist file the run starts from
    #[arg(long)]
    pub input: PathBuf,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,

    #[arg(long, default_value = "cli")]
    pub owner: String,

    #[arg(long)]
    pub run_id: Uuid,
}

#[derive(Debug, Args)]
pub struct AdvanceArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Mark this call as a retry of a failed step
    #[arg(long)]
    pub retry: bool,
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,

    #[arg(long)]
    pub run_id: Uuid,
}

#[derive(Debug, Args)]
pub struct SessionArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,

    #[arg(long, default_value = "cli")]
    pub owner: String,
}
