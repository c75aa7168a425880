//! API route handlers.

mod health;
mod terminal;
mod vm;

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::types::{ApiResponse, AppState, ErrorResponse};

/// Create the API router with all endpoints.
pub fn create_api_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", get(health::health_handler))
        // VM lifecycle
        .route("/vm_status", get(vm::status_handler))
        .route("/start_vm", post(vm::start_handler))
        .route("/stop_vm", post(vm::stop_handler))
        .route("/get_defaults", get(vm::defaults_handler))
        .route("/qemu_logs", get(vm::logs_handler))
        // Ad-hoc terminal
        .route("/run_terminal_command", post(terminal::run_handler))
        .route("/get_terminal_output", get(terminal::output_handler))
        // Request tracing (enable with RUST_LOG=tower_http=info or higher)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(
                    DefaultMakeSpan::new()
                        .level(Level::INFO)
                        .include_headers(false),
                )
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .with_state(state)
}

fn error_response(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    (
        status,
        Json(ApiResponse::new(ErrorResponse {
            code: code.to_string(),
            message: message.into(),
        })),
    )
        .into_response()
}
