//! Process supervisor - starts, observes and stops the single managed process.
//!
//! The supervisor hands the child to a reaper task as soon as it is spawned.
//! The reaper is the only code that waits on the child, delivers termination
//! signals to it, and moves the lifecycle back to `NotRunning` once it exits.
//! `stop()` asks the reaper for a graceful then a forced termination and waits
//! for its exit report; it never sets the final state itself.

use std::ffi::OsStr;
use std::fmt;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant, SystemTime};

use serde::Serialize;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::SupervisorConfig;
use crate::error::{SupervisorError, SupervisorResult};
use crate::pump::pump_logged;
use crate::sink::{LineKind, Origin, OutputLine, OutputSink, SinkWriter};
use crate::state::LifecycleState;

/// Returned by a successful [`Supervisor::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Started {
    pub pid: u32,
    pub started_at: SystemTime,
}

/// How the managed process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProcessExit {
    /// Exit code, absent when the process was killed by a signal.
    pub code: Option<i32>,
    /// Terminating signal on unix.
    pub signal: Option<i32>,
}

impl ProcessExit {
    fn from_status(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }

    fn unknown() -> Self {
        Self {
            code: None,
            signal: None,
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl fmt::Display for ProcessExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {}", code),
            (None, Some(signal)) => write!(f, "signal {}", signal),
            (None, None) => write!(f, "unknown status"),
        }
    }
}

/// Result of [`Supervisor::stop`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// Nothing was running; no signal was sent.
    NotRunning { state: LifecycleState },
    /// The process exited and the reaper has recorded it.
    Stopped { exit: ProcessExit, forced: bool },
}

/// Point-in-time view of the supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupervisorStatus {
    #[serde(flatten)]
    pub state: LifecycleState,
    pub pid: Option<u32>,
    pub uptime_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Termination {
    Graceful,
    Forced,
}

/// Handles to the live process. Present exactly while the state is
/// `Running` or `Stopping`.
#[derive(Debug)]
struct ActiveProcess {
    pid: u32,
    started: Instant,
    control: mpsc::UnboundedSender<Termination>,
    exited: watch::Receiver<Option<ProcessExit>>,
}

/// How long the reaper waits for the pumps to reach end-of-stream before it
/// records the exit. A grandchild holding the pipes open can delay them forever.
const PUMP_SETTLE: Duration = Duration::from_millis(500);

#[derive(Debug, Default)]
struct Slot {
    state: LifecycleState,
    process: Option<ActiveProcess>,
}

#[derive(Debug)]
struct Shared {
    slot: Mutex<Slot>,
    logs: OutputSink,
    config: SupervisorConfig,
}

impl Shared {
    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        self.slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Owner of the single managed process.
///
/// Cheap to clone; clones control the same process.
#[derive(Debug, Clone)]
pub struct Supervisor {
    shared: Arc<Shared>,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new(SupervisorConfig::default())
    }
}

impl Supervisor {
    /// Create an idle supervisor.
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot::default()),
                logs: OutputSink::new(),
                config,
            }),
        }
    }

    /// Launch `program` with `args` as the managed process.
    ///
    /// Rejected with [`SupervisorError::AlreadyActive`] while another
    /// lifecycle is starting, running or stopping. A launch failure leaves
    /// the supervisor in `Error`, from which a new start is allowed.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<I, A>(&self, program: impl AsRef<OsStr>, args: I) -> SupervisorResult<Started>
    where
        I: IntoIterator<Item = A>,
        A: AsRef<OsStr>,
    {
        let program = program.as_ref();
        let program_name = program.to_string_lossy().into_owned();

        let logs = {
            let mut slot = self.shared.lock_slot();
            if !slot.state.may_start() {
                debug!(state = %slot.state, "start rejected");
                return Err(SupervisorError::AlreadyActive {
                    state: slot.state.clone(),
                });
            }
            slot.state = LifecycleState::Starting;
            // Pumps still attached to an earlier lifetime lose their writer here.
            self.shared.logs.clear()
        };

        info!(program = %program_name, "Starting managed process");

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(source) => {
                let err = SupervisorError::spawn_failure(&program_name, source);
                error!(error = %err, "Managed process failed to launch");
                self.shared.lock_slot().state = LifecycleState::Error(err.to_string());
                logs.append(OutputLine::error(Origin::System, err.to_string()));
                return Err(err);
            }
        };

        let pid = child.id().unwrap_or_default();

        let mut pumps = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            pumps.push(tokio::spawn(pump_logged(stdout, Origin::Stdout, logs.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            pumps.push(tokio::spawn(pump_logged(stderr, Origin::Stderr, logs.clone())));
        }

        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (exit_tx, exit_rx) = watch::channel(None);
        let started_at = SystemTime::now();

        {
            let mut slot = self.shared.lock_slot();
            slot.state = LifecycleState::Running;
            slot.process = Some(ActiveProcess {
                pid,
                started: Instant::now(),
                control: control_tx,
                exited: exit_rx,
            });
        }

        // Spawned only after Running is recorded, so its transition comes last.
        tokio::spawn(reap(
            Arc::clone(&self.shared),
            child,
            Lifetime { logs, pumps },
            control_rx,
            exit_tx,
        ));

        info!(pid, program = %program_name, "Managed process running");
        Ok(Started { pid, started_at })
    }

    /// Stop the managed process: graceful signal, then a forced kill once
    /// the grace period runs out.
    ///
    /// Returns [`StopOutcome::NotRunning`] without signalling anything when
    /// the state is not `Running`. Otherwise returns only after the reaper
    /// has observed the exit and moved the state to `NotRunning`.
    pub async fn stop(&self) -> SupervisorResult<StopOutcome> {
        let (pid, control, exited) = {
            let mut slot = self.shared.lock_slot();
            let handles = match (&slot.state, slot.process.as_ref()) {
                (LifecycleState::Running, Some(process)) => (
                    process.pid,
                    process.control.clone(),
                    process.exited.clone(),
                ),
                _ => {
                    info!(state = %slot.state, "Stop requested but nothing is running");
                    return Ok(StopOutcome::NotRunning {
                        state: slot.state.clone(),
                    });
                }
            };
            slot.state = LifecycleState::Stopping;
            handles
        };

        info!(pid, "Stopping managed process");
        let grace = self.shared.config.grace_period();

        // Escalation runs detached so a dropped caller cannot abandon it halfway.
        let escalation = tokio::spawn(terminate(pid, control, exited, grace));
        let (exit, forced) = escalation.await??;

        info!(pid, %exit, forced, "Managed process stopped");
        Ok(StopOutcome::Stopped { exit, forced })
    }

    /// Current lifecycle state.
    pub fn status(&self) -> LifecycleState {
        self.shared.lock_slot().state.clone()
    }

    /// Lifecycle state together with pid and uptime, read atomically.
    pub fn snapshot(&self) -> SupervisorStatus {
        let slot = self.shared.lock_slot();
        SupervisorStatus {
            state: slot.state.clone(),
            pid: slot.process.as_ref().map(|p| p.pid),
            uptime_secs: slot.process.as_ref().map(|p| p.started.elapsed().as_secs()),
        }
    }

    /// Take every buffered output line of the managed process.
    pub fn drain_logs(&self) -> Vec<OutputLine> {
        self.shared.logs.drain_all()
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.shared.config
    }
}

/// Graceful signal, bounded wait, then forced kill and unbounded wait.
async fn terminate(
    pid: u32,
    control: mpsc::UnboundedSender<Termination>,
    mut exited: watch::Receiver<Option<ProcessExit>>,
    grace: Duration,
) -> SupervisorResult<(ProcessExit, bool)> {
    // A closed channel means the reaper already finished; its report is waiting.
    let _ = control.send(Termination::Graceful);

    match tokio::time::timeout(grace, wait_for_exit(&mut exited)).await {
        Ok(exit) => Ok((exit?, false)),
        Err(_) => {
            let err = SupervisorError::TerminationTimeout { grace };
            warn!(pid, error = %err, "Escalating to forced termination");
            let _ = control.send(Termination::Forced);
            Ok((wait_for_exit(&mut exited).await?, true))
        }
    }
}

async fn wait_for_exit(
    exited: &mut watch::Receiver<Option<ProcessExit>>,
) -> SupervisorResult<ProcessExit> {
    let report = exited
        .wait_for(Option::is_some)
        .await
        .map_err(|_| SupervisorError::ReaperLost)?;
    (*report).ok_or(SupervisorError::ReaperLost)
}

/// Output plumbing of one lifetime, handed to its reaper.
struct Lifetime {
    logs: SinkWriter,
    pumps: Vec<JoinHandle<()>>,
}

/// Wait for the child to exit, delivering termination requests meanwhile,
/// then perform the one terminal transition of this lifetime.
async fn reap(
    shared: Arc<Shared>,
    mut child: Child,
    lifetime: Lifetime,
    mut control: mpsc::UnboundedReceiver<Termination>,
    exited: watch::Sender<Option<ProcessExit>>,
) {
    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            Some(termination) = control.recv() => deliver(&mut child, termination),
        }
    };

    let exit = match status {
        Ok(status) => ProcessExit::from_status(status),
        Err(err) => {
            warn!(error = %err, "Failed to wait for managed process");
            let _ = child.start_kill();
            ProcessExit::unknown()
        }
    };

    let Lifetime { logs, pumps } = lifetime;
    let settled = tokio::time::timeout(PUMP_SETTLE, async {
        for pump in pumps {
            let _ = pump.await;
        }
    })
    .await;
    if settled.is_err() {
        debug!(%exit, "Output streams still open after exit");
    }

    let pid = {
        let mut slot = shared.lock_slot();
        slot.state = LifecycleState::NotRunning;
        slot.process.take().map(|p| p.pid)
    };
    info!(pid = ?pid, %exit, "Managed process exited");

    logs.append(OutputLine {
        text: format!("[Process exited with {}]", exit),
        origin: Origin::System,
        kind: LineKind::Completion,
        exit_code: exit.code,
    });

    let _ = exited.send(Some(exit));
}

/// Signal the child. Runs inside the reaper, so the pid cannot have been
/// reaped and recycled yet.
fn deliver(child: &mut Child, termination: Termination) {
    match termination {
        Termination::Graceful => {
            #[cfg(unix)]
            if let Some(pid) = child.id() {
                debug!(pid, "Sending SIGTERM to managed process");
                let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
                if rc != 0 {
                    warn!(pid, error = %std::io::Error::last_os_error(), "SIGTERM failed");
                }
                return;
            }
            if let Err(err) = child.start_kill() {
                warn!(error = %err, "Failed to terminate managed process");
            }
        }
        Termination::Forced => {
            debug!(pid = ?child.id(), "Grace period expired, sending SIGKILL");
            if let Err(err) = child.start_kill() {
                warn!(error = %err, "Failed to kill managed process");
            }
        }
    }
}
