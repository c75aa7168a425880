//! API types and DTOs.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use phoenix_supervisor::{
    AdHocRunner, LineKind, OutputLine, RunId, Supervisor, SupervisorConfig, SupervisorStatus,
};
use serde::{Deserialize, Serialize};

use crate::vm::VmDefaults;

/// Shared application state for the API.
#[derive(Debug)]
pub struct AppState {
    /// Owner of the VM process.
    pub supervisor: Supervisor,
    /// Runner behind the terminal endpoints.
    pub terminal: AdHocRunner,
    /// QEMU executable used for every start.
    pub qemu_binary: PathBuf,
    /// Values used for fields a start request leaves out.
    pub defaults: VmDefaults,
}

impl AppState {
    /// Create the state with an idle supervisor and an empty terminal.
    pub fn new(
        config: SupervisorConfig,
        qemu_binary: impl Into<PathBuf>,
        defaults: VmDefaults,
    ) -> Arc<Self> {
        Arc::new(Self {
            terminal: AdHocRunner::new(&config),
            supervisor: Supervisor::new(config),
            qemu_binary: qemu_binary.into(),
            defaults,
        })
    }
}

/// Response wrapper with timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Response data.
    pub data: T,
    /// Unix timestamp in milliseconds.
    pub timestamp: u64,
}

impl<T> ApiResponse<T> {
    /// Create a new API response with current timestamp.
    pub fn new(data: T) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self { data, timestamp }
    }
}

/// Outcome class of a control action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Success,
    /// Nothing to do (already running, not running).
    Info,
    /// Accepted; the result arrives through an output stream.
    Processing,
}

/// Response to start/stop/run requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse {
    pub status: ActionStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,
    /// Set when a stop had to fall back to a forced kill.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forced: Option<bool>,
}

impl ActionResponse {
    fn with_status(status: ActionStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            pid: None,
            run_id: None,
            forced: None,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::with_status(ActionStatus::Success, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::with_status(ActionStatus::Info, message)
    }

    pub fn processing(message: impl Into<String>) -> Self {
        Self::with_status(ActionStatus::Processing, message)
    }
}

/// Error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code.
    pub code: String,
    /// Error message.
    pub message: String,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Whether the VM process is running.
    pub vm_running: bool,
}

/// VM status response.
#[derive(Debug, Clone, Serialize)]
pub struct VmStatusResponse {
    pub running: bool,
    #[serde(flatten)]
    pub status: SupervisorStatus,
}

/// Drained VM output.
#[derive(Debug, Clone, Serialize)]
pub struct LogsResponse {
    /// Line texts, or a single placeholder when nothing arrived.
    pub logs: Vec<String>,
    /// The drained lines with their origin; empty when the placeholder is used.
    pub lines: Vec<OutputLine>,
}

/// Placeholder returned when no VM output is buffered.
pub const NO_LOGS_PLACEHOLDER: &str = "No recent logs available";

/// Body of a terminal command request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunCommandRequest {
    #[serde(default)]
    pub command: String,
}

/// How a terminal line should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalLineType {
    Command,
    Info,
    Status,
    Error,
}

/// One rendered terminal line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalLine {
    pub message: String,
    #[serde(rename = "type")]
    pub line_type: TerminalLineType,
}

impl From<OutputLine> for TerminalLine {
    fn from(line: OutputLine) -> Self {
        let (message, line_type) = match line.kind {
            LineKind::CommandEcho => (format!("$ {}", line.text), TerminalLineType::Command),
            LineKind::Content => (line.text, TerminalLineType::Info),
            LineKind::Completion => (line.text, TerminalLineType::Status),
            LineKind::Error => (line.text, TerminalLineType::Error),
        };
        Self { message, line_type }
    }
}

/// Drained terminal output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalOutputResponse {
    pub output: Vec<TerminalLine>,
}
