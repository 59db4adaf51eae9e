//! Interactive session over stdin.
//!
//! A session is one long-lived process driving runs for a single owner, so
//! ownership and retry counters persist between commands the way they do
//! for a chat bot. Commands are read line by line:
//!
//! ```text
//! start <file>   create a run from a checklist file
//! run            run the next step
//! retry          retry the step that failed
//! cancel         stop the run and discard its state
//! close          discard the state of a finished run
//! status         show the persisted state of the run
//! quit           leave the session
//! ```

use crate::app::{App, Reply};
use crate::render;
use color_eyre::eyre::{Result, WrapErr};
use colored::Colorize;
use qap_core::AdvanceOutcome;
use qap_protocol::ipc::Op;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start(PathBuf),
    Run,
    Retry,
    Cancel,
    Close,
    Status,
    Help,
    Quit,
}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = parts.collect();

    let command = match (verb.trim_start_matches('/'), rest.as_slice()) {
        ("start", []) => return Err("usage: start <file>".to_string()),
        ("start", path) => Command::Start(PathBuf::from(path.join(" "))),
        ("run" | "next", []) => Command::Run,
        ("retry", []) => Command::Retry,
        ("cancel", []) => Command::Cancel,
        ("close", []) => Command::Close,
        ("status", []) => Command::Status,
        ("help", []) => Command::Help,
        ("quit" | "exit", []) => Command::Quit,
        (verb, _) => return Err(format!("unknown command '{verb}', type 'help'")),
    };
    Ok(Some(command))
}

pub struct Session {
    app: App,
    owner: String,
    run_id: Option<Uuid>,
}

impl Session {
    pub fn new(app: App, owner: String) -> Self {
        Self {
            app,
            owner,
            run_id: None,
        }
    }

    /// Read commands from stdin until `quit` or end of input.
    pub async fn run(mut self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        while let Some(line) = lines.next_line().await.wrap_err("Failed to read stdin")? {
            let command = match parse_command(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(message) => {
                    eprintln!("{}", message.yellow());
                    continue;
                }
            };

            if command == Command::Quit {
                break;
            }
            if let Err(e) = self.handle(command).await {
                eprintln!("{} {e:#}", "error:".red().bold());
            }
        }

        self.app.shutdown().await;
        Ok(())
    }

    async fn handle(&mut self, command: Command) -> Result<()> {
        let owner = self.owner.clone();

        let op = match command {
            Command::Start(path) => {
                let content = tokio::fs::read_to_string(&path)
                    .await
                    .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
                let file_name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                Op::StartRun {
                    owner,
                    file_name,
                    content,
                }
            }
            Command::Run => Op::Advance {
                owner,
                run_id: self.current()?,
            },
            Command::Retry => Op::Retry {
                owner,
                run_id: self.current()?,
            },
            Command::Cancel => Op::Cancel {
                owner,
                run_id: self.current()?,
            },
            Command::Close => Op::Close {
                owner,
                run_id: self.current()?,
            },
            Command::Status => Op::GetStatus {
                run_id: self.current()?,
            },
            Command::Help => {
                println!("commands: start <file>, run, retry, cancel, close, status, quit");
                return Ok(());
            }
            Command::Quit => return Ok(()),
        };

        match self.app.execute(op).await? {
            Reply::Started(ctx) => self.run_id = Some(ctx.run_id),
            Reply::Advanced(outcome) => {
                if matches!(
                    outcome,
                    AdvanceOutcome::Failed { .. } | AdvanceOutcome::NotFound | AdvanceOutcome::AlreadyCompleted
                ) {
                    self.run_id = None;
                }
            }
            Reply::Stopped => self.run_id = None,
            Reply::Status(Some(status)) => print!("{}", render::status_block(&status)),
            Reply::Status(None) => println!("No state for the current run."),
        }
        Ok(())
    }

    fn current(&self) -> Result<Uuid> {
        self.run_id
            .ok_or_else(|| color_eyre::eyre::eyre!("No active run. Use 'start <file>' first."))
    }
}
