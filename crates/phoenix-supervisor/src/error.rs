//! Error types for the supervision core.

use std::time::Duration;

use thiserror::Error;

use crate::sink::Origin;
use crate::state::LifecycleState;

/// Result type for supervisor operations.
pub type SupervisorResult<T> = Result<T, SupervisorError>;

/// Errors that can occur while supervising processes.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// A start was requested while another lifecycle is in flight.
    #[error("a managed process is already active ({state})")]
    AlreadyActive { state: LifecycleState },

    /// The OS refused to launch the program.
    #[error("failed to launch {program}: {source}")]
    SpawnFailure {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Graceful termination did not finish within the grace period.
    /// Logged only; the stop escalates to a forced kill.
    #[error("process did not exit within {grace:?} of the termination signal")]
    TerminationTimeout { grace: Duration },

    /// Reading a child output stream failed; the pump for it stops.
    #[error("failed to read {origin}: {source}")]
    StreamRead {
        origin: Origin,
        #[source]
        source: std::io::Error,
    },

    /// Waiting on a launched process failed.
    #[error("failed to wait for process: {0}")]
    Wait(#[source] std::io::Error),

    /// The reaper went away without reporting an exit.
    #[error("reaper task ended without reporting process exit")]
    ReaperLost,

    /// The termination task panicked or was cancelled.
    #[error("termination task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl SupervisorError {
    /// Create a spawn failure for `program`.
    pub fn spawn_failure(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::SpawnFailure {
            program: program.into(),
            source,
        }
    }
}
