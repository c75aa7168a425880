//! Health check endpoint.

use std::sync::Arc;

use axum::{extract::State, Json};

use crate::types::{ApiResponse, AppState, HealthResponse};

/// Handler for GET /health
pub async fn health_handler(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<HealthResponse>> {
    let response = HealthResponse {
        status: "ok".to_string(),
        vm_running: state.supervisor.status().is_running(),
    };
    Json(ApiResponse::new(response))
}
