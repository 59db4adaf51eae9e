mod app;
mod args;
mod render;
mod session;

use app::{App, Reply};
use args::{Cli, Commands};
use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use qap_core::config::load_config;
use qap_core::AdvanceOutcome;
use qap_protocol::ipc::Op;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber for logging.
///
/// Log level is controlled by:
/// 1. `--debug` flag sets level to DEBUG
/// 2. `RUST_LOG` environment variable (if set)
/// 3. Default is INFO
///
/// Logs go to stderr; stdout carries run progress.
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("qap_core=debug,qa_pipeline=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("qap_core=info,qa_pipeline=info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.debug);
    tracing::debug!("qa-pipeline starting with args: {:?}", cli);

    let project = match cli.project {
        Some(path) => path,
        None => std::env::current_dir().wrap_err("Failed to determine current directory")?,
    };

    match cli.command {
        Commands::Steps(args) => {
            let config = load_config(&project).await?;
            let pipeline = app::select_pipeline(&config, args.pipeline.as_deref())?;
            print!("{}", render::steps_list(pipeline));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Start(args) => {
            let app = App::load(&project, args.pipeline.pipeline.as_deref()).await?;
            let op = start_op(args.owner, &args.input).await?;
            finish(app, op).await
        }
        Commands::Advance(args) => {
            let app = App::load(&project, args.run.pipeline.pipeline.as_deref()).await?;
            let op = if args.retry {
                Op::Retry {
                    owner: args.run.owner,
                    run_id: args.run.run_id,
                }
            } else {
                Op::Advance {
                    owner: args.run.owner,
                    run_id: args.run.run_id,
                }
            };
            finish(app, op).await
        }
        Commands::Cancel(args) => {
            let app = App::load(&project, args.pipeline.pipeline.as_deref()).await?;
            let op = Op::Cancel {
                owner: args.owner,
                run_id: args.run_id,
            };
            finish(app, op).await
        }
        Commands::Close(args) => {
            let app = App::load(&project, args.pipeline.pipeline.as_deref()).await?;
            let op = Op::Close {
                owner: args.owner,
                run_id: args.run_id,
            };
            finish(app, op).await
        }
        Commands::Status(args) => {
            let app = App::load(&project, args.pipeline.pipeline.as_deref()).await?;
            finish(app, Op::GetStatus { run_id: args.run_id }).await
        }
        Commands::Session(args) => {
            let app = App::load(&project, args.pipeline.pipeline.as_deref()).await?;
            session::Session::new(app, args.owner).run().await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn start_op(owner: String, input: &Path) -> Result<Op> {
    let content = tokio::fs::read_to_string(input)
        .await
        .wrap_err_with(|| format!("Failed to read {}", input.display()))?;
    let file_name = input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| PathBuf::from(input).display().to_string());
    Ok(Op::StartRun {
        owner,
        file_name,
        content,
    })
}

/// Execute a single operation, flush its events and map the reply to an exit code.
async fn finish(app: App, op: Op) -> Result<ExitCode> {
    let result = app.execute(op).await;
    app.shutdown().await;

    let code = match result? {
        Reply::Started(_) | Reply::Stopped => ExitCode::SUCCESS,
        Reply::Advanced(outcome) => match outcome {
            AdvanceOutcome::Succeeded { .. } | AdvanceOutcome::AlreadyCompleted => ExitCode::SUCCESS,
            AdvanceOutcome::RetryScheduled { .. } => ExitCode::from(75),
            AdvanceOutcome::Failed { .. } | AdvanceOutcome::NotFound => ExitCode::FAILURE,
        },
        Reply::Status(Some(status)) => {
            print!("{}", render::status_block(&status));
            ExitCode::SUCCESS
        }
        Reply::Status(None) => {
            println!("No state for that run.");
            ExitCode::FAILURE
        }
    };
    Ok(code)
}
