//! VM lifecycle endpoints.
//!
//! Validation and command construction happen here; the supervisor only
//! sees the finished program and argument list.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use phoenix_supervisor::{StopOutcome, SupervisorError};
use tracing::{error, info, warn};

use super::error_response;
use crate::types::{
    ActionResponse, ApiResponse, AppState, LogsResponse, VmStatusResponse, NO_LOGS_PLACEHOLDER,
};
use crate::vm::{VmConfig, VmDefaults};

/// GET /vm_status - Lifecycle snapshot.
pub async fn status_handler(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<VmStatusResponse>> {
    let status = state.supervisor.snapshot();
    Json(ApiResponse::new(VmStatusResponse {
        running: status.state.is_running(),
        status,
    }))
}

/// POST /start_vm - Validate the configuration and launch QEMU.
pub async fn start_handler(
    State(state): State<Arc<AppState>>,
    Json(config): Json<VmConfig>,
) -> Response {
    if state.supervisor.status().is_active() {
        return already_running();
    }

    let vm = match config.validate(&state.defaults) {
        Ok(vm) => vm,
        Err(e) => {
            warn!(error = %e, "Rejected VM configuration");
            return error_response(StatusCode::BAD_REQUEST, "INVALID_CONFIG", e.to_string());
        }
    };

    let command = vm.to_command(&state.qemu_binary);
    info!(
        program = %command.program.display(),
        args = ?command.args,
        "Start VM request"
    );

    match state.supervisor.start(&command.program, &command.args) {
        Ok(started) => {
            let mut response = ActionResponse::success("VM started successfully");
            response.pid = Some(started.pid);
            (StatusCode::OK, Json(ApiResponse::new(response))).into_response()
        }
        Err(SupervisorError::AlreadyActive { .. }) => already_running(),
        Err(e) => {
            error!("VM start failed: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "SPAWN_FAILED",
                format!("VM failed to start: {}", e),
            )
        }
    }
}

/// POST /stop_vm - Graceful stop with forced fallback.
pub async fn stop_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.supervisor.stop().await {
        Ok(StopOutcome::NotRunning { .. }) => (
            StatusCode::OK,
            Json(ApiResponse::new(ActionResponse::info("VM is not running"))),
        )
            .into_response(),
        Ok(StopOutcome::Stopped { exit, forced }) => {
            info!(%exit, forced, "VM stopped");
            let mut response = ActionResponse::success("VM stopped successfully");
            response.forced = Some(forced);
            (StatusCode::OK, Json(ApiResponse::new(response))).into_response()
        }
        Err(e) => {
            error!("VM stop failed: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "STOP_FAILED",
                format!("Failed to stop VM: {}", e),
            )
        }
    }
}

/// GET /get_defaults - Configured VM defaults.
pub async fn defaults_handler(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<VmDefaults>> {
    Json(ApiResponse::new(state.defaults.clone()))
}

/// GET /qemu_logs - Drain buffered VM output.
pub async fn logs_handler(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<LogsResponse>> {
    let lines = state.supervisor.drain_logs();
    let logs = if lines.is_empty() {
        vec![NO_LOGS_PLACEHOLDER.to_string()]
    } else {
        lines.iter().map(|l| l.text.clone()).collect()
    };
    Json(ApiResponse::new(LogsResponse { logs, lines }))
}

fn already_running() -> Response {
    (
        StatusCode::OK,
        Json(ApiResponse::new(ActionResponse::info("VM is already running"))),
    )
        .into_response()
}
