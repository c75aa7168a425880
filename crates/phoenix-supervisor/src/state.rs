//! Lifecycle state of the managed process.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Externally observable status of the managed process.
///
/// Only the supervisor's start/stop entry points and its reaper move between
/// these states. A single lifetime always runs
/// `NotRunning|Error -> Starting -> Running -> (Stopping ->) NotRunning`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum LifecycleState {
    #[default]
    NotRunning,
    Starting,
    Running,
    Stopping,
    /// The last start attempt failed; carries a human readable cause.
    Error(String),
}

impl LifecycleState {
    /// Whether a lifecycle is in flight (starting, running or stopping).
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            LifecycleState::Starting | LifecycleState::Running | LifecycleState::Stopping
        )
    }

    /// `Error` counts as idle for the purpose of starting again.
    pub fn may_start(&self) -> bool {
        !self.is_active()
    }

    pub fn is_running(&self) -> bool {
        matches!(self, LifecycleState::Running)
    }

    /// Short lowercase label, used in logs and API payloads.
    pub fn label(&self) -> &'static str {
        match self {
            LifecycleState::NotRunning => "not_running",
            LifecycleState::Starting => "starting",
            LifecycleState::Running => "running",
            LifecycleState::Stopping => "stopping",
            LifecycleState::Error(_) => "error",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Error(reason) => write!(f, "error: {}", reason),
            other => write!(f, "{}", other.label()),
        }
    }
}
