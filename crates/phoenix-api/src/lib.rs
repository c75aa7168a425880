//! REST API for Project Phoenix.
//!
//! The boundary layer in front of the supervision core: it validates VM
//! configurations, turns them into QEMU invocations and exposes the
//! supervisor and terminal runner as JSON endpoints.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check with VM running flag
//! - `GET /vm_status` - Lifecycle state, pid and uptime
//! - `POST /start_vm` - Validate a VM configuration and start QEMU
//! - `POST /stop_vm` - Stop the VM (graceful, then forced)
//! - `GET /get_defaults` - Configured VM defaults
//! - `GET /qemu_logs` - Drain buffered VM output
//! - `POST /run_terminal_command` - Run a shell command in the background
//! - `GET /get_terminal_output` - Drain classified terminal output
//!
//! ## Usage
//!
//! ```rust,no_run
//! use phoenix_api::{create_api_router, AppState, VmDefaults};
//! use phoenix_supervisor::SupervisorConfig;
//!
//! let state = AppState::new(
//!     SupervisorConfig::default(),
//!     "qemu-system-x86_64",
//!     VmDefaults::default(),
//! );
//! let router = create_api_router(state);
//! ```

mod routes;
mod types;
mod vm;

pub use routes::create_api_router;
pub use types::{
    ActionResponse, ActionStatus, ApiResponse, AppState, ErrorResponse, HealthResponse,
    LogsResponse, RunCommandRequest, TerminalLine, TerminalLineType, TerminalOutputResponse,
    VmStatusResponse, NO_LOGS_PLACEHOLDER,
};
pub use vm::{ValidatedVm, VmCommand, VmConfig, VmConfigError, VmDefaults};
