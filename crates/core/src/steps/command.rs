//! Steps backed by an external program.
//!
//! A command step hands the run context to a subprocess and reads new
//! fields back:
//! - stdin receives the full context as one JSON document
//! - stdout is parsed as JSON Lines; every object line is merged into
//!   the context fields, later keys overwriting earlier ones
//! - the exit status decides success, transient or fatal failure

use super::{Step, StepError};
use async_trait::async_trait;
use qap_protocol::pipeline_models::{StepDefinition, EX_TEMPFAIL};
use qap_protocol::run_models::RunContext;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio_stream::{Stream, StreamExt};

/// Runs an external program as a pipeline step.
#[derive(Debug, Clone)]
pub struct CommandStep {
    name: String,
    command: String,
    args: Vec<String>,
    working_dir: PathBuf,
    transient_exit_codes: Vec<i32>,
    timeout: Option<Duration>,
}

struct CommandOutput {
    status: ExitStatus,
    lines: Vec<Result<serde_json::Value, String>>,
    stderr: String,
}

impl CommandStep {
    /// Create a step running `command` in the current directory.
    ///
    /// Defaults:
    /// - args: empty
    /// - transient exit codes: `[75]` (EX_TEMPFAIL)
    /// - timeout: none
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            working_dir: PathBuf::from("."),
            transient_exit_codes: vec![EX_TEMPFAIL],
            timeout: None,
        }
    }

    /// Build a step from its pipeline definition.
    pub fn from_definition(def: &StepDefinition, working_dir: &Path) -> Self {
        let step = Self::new(def.name.clone(), def.command.clone())
            .with_args(def.args.clone())
            .with_working_dir(working_dir)
            .with_transient_exit_codes(def.transient_exit_codes.clone());
        match def.timeout_secs {
            Some(secs) => step.with_timeout(Duration::from_secs(secs)),
            None => step,
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    pub fn with_transient_exit_codes(mut self, codes: Vec<i32>) -> Self {
        self.transient_exit_codes = codes;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Whether the program can be found.
    ///
    /// Paths are checked relative to the working directory, bare names are
    /// looked up on `PATH`.
    pub fn is_available(&self) -> bool {
        let path = Path::new(&self.command);
        if path.components().count() > 1 {
            self.working_dir.join(path).is_file()
        } else {
            which::which(&self.command).is_ok()
        }
    }

    async fn execute(&self, input: Vec<u8>) -> Result<CommandOutput, StepError> {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args);
        cmd.current_dir(&self.working_dir);
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            StepError::fatal(format!("Failed to spawn command '{}': {e}", self.command))
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| StepError::fatal("Failed to capture stdout"))?;
        let stdin = child.stdin.take();
        let stderr = child.stderr.take();

        let write_input = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(&input).await?;
                stdin.shutdown().await?;
            }
            Ok::<(), std::io::Error>(())
        };
        let read_stderr = async move {
            let mut text = String::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_string(&mut text).await;
            }
            text
        };
        let read_stdout = json_lines(stdout).collect::<Vec<_>>();

        let (written, lines, stderr) = tokio::join!(write_input, read_stdout, read_stderr);

        // A program that exits without reading its input is not an error.
        if let Err(e) = written {
            if e.kind() != std::io::ErrorKind::BrokenPipe {
                return Err(StepError::fatal(format!(
                    "Failed to write context to '{}': {e}",
                    self.command
                )));
            }
        }

        let status = child.wait().await.map_err(|e| {
            StepError::fatal(format!("Failed to wait for '{}': {e}", self.command))
        })?;

        Ok(CommandOutput {
            status,
            lines,
            stderr,
        })
    }

    fn check_status(&self, status: ExitStatus, stderr: &str) -> Result<(), StepError> {
        let detail = last_line(stderr)
            .map(|line| format!(": {line}"))
            .unwrap_or_default();

        match status.code() {
            Some(0) => Ok(()),
            Some(code) if self.transient_exit_codes.contains(&code) => Err(StepError::transient(
                format!("'{}' exited with code {code}{detail}", self.command),
            )),
            Some(code) => Err(StepError::fatal(format!(
                "'{}' exited with code {code}{detail}",
                self.command
            ))),
            None => Err(StepError::transient(format!(
                "'{}' was terminated by a signal{detail}",
                self.command
            ))),
        }
    }
}

#[async_trait]
impl Step for CommandStep {
    async fn run(&self, mut ctx: RunContext) -> Result<RunContext, StepError> {
        let input = serde_json::to_vec(&ctx)
            .map_err(|e| StepError::fatal(format!("Failed to encode context: {e}")))?;

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.execute(input))
                .await
                .map_err(|_| {
                    StepError::transient(format!(
                        "Step '{}' timed out after {} ms",
                        self.name,
                        limit.as_millis()
                    ))
                })??,
            None => self.execute(input).await?,
        };

        // Output errors take precedence over the exit status.
        let mut updates = Vec::with_capacity(output.lines.len());
        for line in output.lines {
            match line {
                Ok(serde_json::Value::Object(object)) => updates.push(object),
                Ok(other) => {
                    return Err(StepError::fatal(format!(
                        "Step '{}' produced a non-object JSON line: {other}",
                        self.name
                    )))
                }
                Err(reason) => {
                    return Err(StepError::fatal(format!("Step '{}': {reason}", self.name)))
                }
            }
        }

        self.check_status(output.status, &output.stderr)?;

        for object in updates {
            ctx.fields.extend(object);
        }
        Ok(ctx)
    }
}

/// Parse a reader as JSON Lines, skipping blank lines.
fn json_lines<R>(reader: R) -> Pin<Box<dyn Stream<Item = Result<serde_json::Value, String>> + Send>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut lines = BufReader::new(reader).lines();

        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    yield Err(format!("Failed to read output: {e}"));
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<serde_json::Value>(&line) {
                Ok(value) => yield Ok(value),
                Err(e) => yield Err(format!("Failed to parse JSON: {e} (line: {line})")),
            }
        }
    };

    Box::pin(stream)
}

fn last_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).rev().find(|line| !line.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell_step(script: &str) -> CommandStep {
        CommandStep::new("scripted", "sh").with_args(vec!["-c".to_string(), script.to_string()])
    }

    fn checklist_context() -> RunContext {
        let mut ctx = RunContext::new(Some("scripted".to_string()));
        ctx.set_field("file_name", "checklist_login.txt").unwrap();
        ctx
    }

    #[tokio::test]
    async fn test_command_step_merges_json_lines() {
        let step = shell_step(
            r#"cat > /dev/null
echo '{"scenarios": "1. valid login"}'
echo
printf '%s\n' '{"scenario_count": 1, "scenarios": "1. valid login\n2. locked user"}'"#,
        );

        let ctx = step.run(checklist_context()).await.unwrap();

        assert_eq!(ctx.get_str("scenarios"), Some("1. valid login\n2. locked user"));
        assert_eq!(ctx.get_field::<u32>("scenario_count"), Some(1));
        assert_eq!(ctx.get_str("file_name"), Some("checklist_login.txt"));
    }

    #[tokio::test]
    async fn test_command_step_receives_context_on_stdin() {
        let step = shell_step(
            r#"input=$(cat)
case "$input" in
  *checklist_login.txt*) echo '{"seen": true}' ;;
  *) echo '{"seen": false}' ;;
esac"#,
        );

        let ctx = step.run(checklist_context()).await.unwrap();
        assert_eq!(ctx.get_field::<bool>("seen"), Some(true));
    }

    #[tokio::test]
    async fn test_command_step_ignores_unread_input() {
        let step = shell_step(r#"echo '{"done": true}'"#);

        let ctx = step.run(checklist_context()).await.unwrap();
        assert_eq!(ctx.get_field::<bool>("done"), Some(true));
    }

    #[tokio::test]
    async fn test_transient_exit_code() {
        let step = shell_step("echo 'LLM service unavailable' >&2; exit 75");

        let err = step.run(checklist_context()).await.unwrap_err();
        assert!(err.is_transient());
        assert!(err.to_string().contains("LLM service unavailable"));
    }

    #[tokio::test]
    async fn test_custom_transient_exit_codes() {
        let step = shell_step("exit 3").with_transient_exit_codes(vec![3]);

        let err = step.run(checklist_context()).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_other_exit_code_is_fatal() {
        let step = shell_step("exit 2");

        let err = step.run(checklist_context()).await.unwrap_err();
        assert!(matches!(err, StepError::Fatal(msg) if msg.contains("code 2")));
    }

    #[tokio::test]
    async fn test_invalid_output_is_fatal() {
        let step = shell_step("echo 'not json'");
        let err = step.run(checklist_context()).await.unwrap_err();
        assert!(matches!(err, StepError::Fatal(msg) if msg.contains("Failed to parse JSON")));

        let step = shell_step("echo 42");
        let err = step.run(checklist_context()).await.unwrap_err();
        assert!(matches!(err, StepError::Fatal(msg) if msg.contains("non-object")));
    }

    #[tokio::test]
    async fn test_invalid_utf8_last_line_is_fatal() {
        let step = shell_step(r#"cat > /dev/null
echo '{"scenarios": "1. valid login"}'
printf '\377\376\n'"#);

        let err = step.run(checklist_context()).await.unwrap_err();
        assert!(matches!(err, StepError::Fatal(msg) if msg.contains("Failed to read output")));
    }

    #[tokio::test]
    async fn test_invalid_utf8_before_more_output_is_fatal() {
        let step = shell_step(r#"cat > /dev/null
echo '{"scenarios": "1. valid login"}'
printf '\377\376\n'
i=0
while [ $i -lt 2000 ]; do
  echo '{"testcases_json": "padding line to fill the pipe buffer"}'
  i=$((i + 1))
done"#);

        let err = step.run(checklist_context()).await.unwrap_err();
        assert!(!err.is_transient());
        assert!(err.to_string().contains("Failed to read output"));
    }

    #[tokio::test]
    async fn test_bad_output_wins_over_transient_exit() {
        let step = shell_step("echo 'rate limited'; exit 75");

        let err = step.run(checklist_context()).await.unwrap_err();
        assert!(matches!(err, StepError::Fatal(msg) if msg.contains("Failed to parse JSON")));
    }

    #[tokio::test]
    async fn test_missing_command_is_fatal() {
        let step = CommandStep::new("missing", "nonexistent-command-xyz");

        assert!(!step.is_available());
        let err = step.run(checklist_context()).await.unwrap_err();
        assert!(matches!(err, StepError::Fatal(msg) if msg.contains("Failed to spawn command")));
    }

    #[tokio::test]
    async fn test_timeout_is_transient() {
        let step = shell_step("sleep 5").with_timeout(Duration::from_millis(200));

        let err = step.run(checklist_context()).await.unwrap_err();
        assert!(err.is_transient());
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_from_definition() {
        let def = StepDefinition {
            name: "Running Autotests".to_string(),
            command: "pytest".to_string(),
            args: vec!["-q".to_string()],
            transient_exit_codes: vec![75, 3],
            timeout_secs: Some(600),
            artifact: None,
        };

        let step = CommandStep::from_definition(&def, Path::new("/tmp"));
        assert_eq!(step.name(), "Running Autotests");
        assert_eq!(step.command(), "pytest");
        assert_eq!(step.args, vec!["-q".to_string()]);
        assert_eq!(step.working_dir, PathBuf::from("/tmp"));
        assert_eq!(step.transient_exit_codes, vec![75, 3]);
        assert_eq!(step.timeout, Some(Duration::from_secs(600)));
    }

    #[test]
    fn test_is_available_for_shell() {
        assert!(CommandStep::new("shell", "sh").is_available());
    }

    #[test]
    fn test_last_line() {
        assert_eq!(last_line("first\nsecond\n\n"), Some("second"));
        assert_eq!(last_line("   \n"), None);
    }
}
