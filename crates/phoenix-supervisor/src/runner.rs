//! Ad-hoc command runner.
//!
//! Fire-and-forget shell invocations, independent of the managed process
//! lifecycle. Every run writes a command echo, its merged output and then
//! either a completion marker or an error line into one shared sink. Runs may
//! overlap; their groups of lines interleave in arrival order.

use std::fmt;
use std::future::Future;
use std::io;
use std::process::{ExitStatus, Stdio};

use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::SupervisorConfig;
use crate::error::{SupervisorError, SupervisorResult};
use crate::pump::pump_lines;
use crate::sink::{Origin, OutputLine, OutputSink, SinkWriter};

/// Identifier handed back for every ad-hoc run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How an ad-hoc run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The shell ran and exited; a signal death reports `-signal`.
    Completed { exit_code: i32 },
    /// The shell could not be launched or waited on.
    Failed { message: String },
}

/// Acknowledgement of a started run.
///
/// Dropping the handle does not cancel the run.
#[derive(Debug)]
pub struct RunHandle {
    pub id: RunId,
    pub command: String,
    task: JoinHandle<RunOutcome>,
}

impl RunHandle {
    /// Wait for the run to finish.
    pub async fn finished(self) -> RunOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => RunOutcome::Failed {
                message: format!("run task failed: {}", e),
            },
        }
    }
}

/// Runs shell commands and collects their classified output.
#[derive(Debug, Clone)]
pub struct AdHocRunner {
    output: OutputSink,
    shell: String,
    shell_flag: String,
}

impl Default for AdHocRunner {
    fn default() -> Self {
        Self::new(&SupervisorConfig::default())
    }
}

impl AdHocRunner {
    pub fn new(config: &SupervisorConfig) -> Self {
        Self {
            output: OutputSink::new(),
            shell: config.shell.clone(),
            shell_flag: config.shell_flag.clone(),
        }
    }

    /// Start `command` in the background and return immediately.
    ///
    /// Failures never surface here; they show up as an error line in the
    /// output. Must be called from within a tokio runtime.
    pub fn run(&self, command: impl Into<String>) -> RunHandle {
        let command = command.into();
        let id = RunId::new();
        info!(run = %id, command = %command, "Running ad-hoc command");

        let task = tokio::spawn(execute(self.clone(), id, command.clone()));
        RunHandle { id, command, task }
    }

    /// Take every buffered line from all runs.
    pub fn drain_output(&self) -> Vec<OutputLine> {
        self.output.drain_all()
    }

    /// Spawn the shell with stderr folded into stdout and pump until the
    /// streams close.
    async fn run_to_completion(&self, command: &str) -> SupervisorResult<i32> {
        let mut child = Command::new(&self.shell)
            .arg(&self.shell_flag)
            .arg(merged_script(command))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SupervisorError::spawn_failure(&self.shell, source))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let writer = self.output.writer();
        let status = collect(child.wait(), stdout, stderr, &writer).await?;
        Ok(exit_code(status))
    }
}

/// Redirect the shell's stderr into its stdout before `command` runs, so one
/// pipe carries the run's output in the order it was written.
fn merged_script(command: &str) -> String {
    format!("exec 2>&1\n{}", command)
}

/// Await `wait` and both pumps. The result is only reported once every line
/// of the run is in the sink; a failed pump fails the run.
async fn collect<W, T, O, E>(
    wait: W,
    stdout: Option<O>,
    stderr: Option<E>,
    sink: &SinkWriter,
) -> SupervisorResult<T>
where
    W: Future<Output = io::Result<T>>,
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    let pump_stdout = async {
        match stdout {
            Some(reader) => pump_lines(reader, Origin::Stdout, sink).await,
            None => Ok(()),
        }
    };
    let pump_stderr = async {
        match stderr {
            Some(reader) => pump_lines(reader, Origin::Stderr, sink).await,
            None => Ok(()),
        }
    };

    let (status, stdout, stderr) = tokio::join!(wait, pump_stdout, pump_stderr);
    stdout?;
    stderr?;
    status.map_err(SupervisorError::Wait)
}

/// Exit code of the shell; a signal death is reported as the negated signal.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}

async fn execute(runner: AdHocRunner, id: RunId, command: String) -> RunOutcome {
    runner.output.append(OutputLine::command_echo(&command));
    let result = runner.run_to_completion(&command).await;
    record_outcome(&runner.output, id, result)
}

/// Close a run with a completion line, or an error line in its place.
fn record_outcome(output: &OutputSink, id: RunId, result: SupervisorResult<i32>) -> RunOutcome {
    match result {
        Ok(exit_code) => {
            output.append(OutputLine::completion(exit_code));
            info!(run = %id, exit_code, "Ad-hoc command finished");
            RunOutcome::Completed { exit_code }
        }
        Err(err) => {
            let message = format!("command execution failed: {}", err);
            warn!(run = %id, error = %err, "Ad-hoc command failed");
            output.append(OutputLine::error(Origin::System, message.clone()));
            RunOutcome::Failed { message }
        }
    }
}
