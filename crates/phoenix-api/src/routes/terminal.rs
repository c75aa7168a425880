//! Ad-hoc terminal endpoints.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use super::error_response;
use crate::types::{
    ActionResponse, ApiResponse, AppState, RunCommandRequest, TerminalLine,
    TerminalOutputResponse,
};

/// POST /run_terminal_command - Start a shell command in the background.
pub async fn run_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RunCommandRequest>,
) -> Response {
    let command = request.command.trim();
    if command.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "NO_COMMAND", "No command provided");
    }

    let handle = state.terminal.run(command);
    let mut response = ActionResponse::processing("Command sent to terminal");
    response.run_id = Some(handle.id);
    (StatusCode::ACCEPTED, Json(ApiResponse::new(response))).into_response()
}

/// GET /get_terminal_output - Drain classified terminal output.
pub async fn output_handler(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<TerminalOutputResponse>> {
    let output = state
        .terminal
        .drain_output()
        .into_iter()
        .map(TerminalLine::from)
        .collect();
    Json(ApiResponse::new(TerminalOutputResponse { output }))
}
