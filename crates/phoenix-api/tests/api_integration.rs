//! Integration tests for the Project Phoenix REST API.
//!
//! These drive the router in-process and launch real (harmless) programs in
//! place of QEMU.
//!
//! Run with: `cargo test --package phoenix-api --test api_integration`

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use phoenix_api::{create_api_router, AppState, VmDefaults, NO_LOGS_PLACEHOLDER};
use phoenix_supervisor::{LifecycleState, SupervisorConfig};
use serde_json::{json, Value};
use tempfile::NamedTempFile;
use tower::ServiceExt;

/// Create a test router whose "QEMU" is `qemu_binary`.
fn create_test_router(qemu_binary: &str) -> (Router, Arc<AppState>) {
    let state = AppState::new(
        SupervisorConfig::default(),
        qemu_binary,
        VmDefaults::default(),
    );
    (create_api_router(state.clone()), state)
}

/// Helper to make a GET request.
async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap_or(json!(null));

    (status, json)
}

/// Helper to make a POST request with JSON body.
async fn post(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap_or(json!(null));

    (status, json)
}

fn start_body(disk: &NamedTempFile) -> Value {
    json!({
        "ram_mb": 1024,
        "cores": 2,
        "primary_disk_path": disk.path().to_str().unwrap(),
    })
}

/// Drain /qemu_logs until a line containing `needle` shows up.
async fn wait_for_log(router: &Router, needle: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for _ in 0..100 {
        let (_, json) = get(router, "/qemu_logs").await;
        let logs = json["data"]["logs"].as_array().cloned().unwrap_or_default();
        seen.extend(
            logs.iter()
                .filter_map(|l| l.as_str().map(str::to_string))
                .filter(|l| l != NO_LOGS_PLACEHOLDER),
        );
        if seen.iter().any(|l| l.contains(needle)) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    seen
}

// =============================================================================
// Health & Defaults
// =============================================================================

#[tokio::test]
async fn test_health() {
    let (router, _) = create_test_router("qemu-system-x86_64");

    let (status, json) = get(&router, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "ok");
    assert_eq!(json["data"]["vm_running"], false);
    assert!(json["timestamp"].as_u64().is_some());
}

#[tokio::test]
async fn test_get_defaults() {
    let (router, _) = create_test_router("qemu-system-x86_64");

    let (status, json) = get(&router, "/get_defaults").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["ram_mb"], 8192);
    assert_eq!(json["data"]["cores"], 6);
    assert_eq!(json["data"]["cpu_model"], "max");
    assert_eq!(json["data"]["net_device"], "virtio-net-pci");
}

// =============================================================================
// Start
// =============================================================================

#[tokio::test]
async fn test_start_rejects_invalid_config() {
    let (router, state) = create_test_router("qemu-system-x86_64");
    let disk = NamedTempFile::new().unwrap();

    let mut body = start_body(&disk);
    body["ram_mb"] = json!(100);
    let (status, json) = post(&router, "/start_vm", body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["data"]["code"], "INVALID_CONFIG");
    assert_eq!(
        json["data"]["message"],
        "RAM must be between 512 MB and 32768 MB"
    );
    assert_eq!(state.supervisor.status(), LifecycleState::NotRunning);
}

#[tokio::test]
async fn test_start_requires_primary_disk() {
    let (router, _) = create_test_router("qemu-system-x86_64");

    let (status, json) = post(&router, "/start_vm", json!({})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["data"]["message"], "Primary disk path is required");
}

#[tokio::test]
async fn test_start_with_missing_binary_reports_error_state() {
    let (router, _) = create_test_router("/nonexistent/qemu-system-x86_64");
    let disk = NamedTempFile::new().unwrap();

    let (status, json) = post(&router, "/start_vm", start_body(&disk)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["data"]["code"], "SPAWN_FAILED");

    let (_, json) = get(&router, "/vm_status").await;
    assert_eq!(json["data"]["state"], "error");
    assert_eq!(json["data"]["running"], false);

    let logs = wait_for_log(&router, "failed to launch").await;
    assert!(logs.iter().any(|l| l.contains("failed to launch")));
}

#[tokio::test]
async fn test_start_passes_built_arguments() {
    // `echo` prints the argument list it was given and exits.
    let (router, state) = create_test_router("echo");
    let disk = NamedTempFile::new().unwrap();

    let (status, json) = post(&router, "/start_vm", start_body(&disk)).await;
    assert_eq!(status, StatusCode::OK, "start should succeed: {:?}", json);
    assert_eq!(json["data"]["status"], "success");
    assert!(json["data"]["pid"].as_u64().is_some());

    let logs = wait_for_log(&router, "-accel tcg,thread=multi").await;
    let line = logs
        .iter()
        .find(|l| l.contains("-accel"))
        .expect("echoed arguments");
    assert!(line.contains("-smp 2 -m 1024"));
    assert!(line.contains(&format!("file={}", disk.path().display())));

    for _ in 0..100 {
        if !state.supervisor.status().is_active() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(state.supervisor.status(), LifecycleState::NotRunning);
}

#[tokio::test]
async fn test_start_while_running_is_informational() {
    let (router, state) = create_test_router("qemu-system-x86_64");
    let disk = NamedTempFile::new().unwrap();
    state.supervisor.start("sleep", ["30"]).unwrap();

    let (status, json) = post(&router, "/start_vm", start_body(&disk)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "info");
    assert_eq!(json["data"]["message"], "VM is already running");

    state.supervisor.stop().await.unwrap();
}

// =============================================================================
// Stop & Status
// =============================================================================

#[tokio::test]
async fn test_stop_when_not_running() {
    let (router, _) = create_test_router("qemu-system-x86_64");

    let (status, json) = post(&router, "/stop_vm", json!({})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "info");
    assert_eq!(json["data"]["message"], "VM is not running");
}

#[tokio::test]
async fn test_stop_running_vm() {
    let (router, state) = create_test_router("qemu-system-x86_64");
    let started = state.supervisor.start("sleep", ["30"]).unwrap();

    let (_, json) = get(&router, "/vm_status").await;
    assert_eq!(json["data"]["running"], true);
    assert_eq!(json["data"]["state"], "running");
    assert_eq!(json["data"]["pid"], started.pid);

    let (status, json) = post(&router, "/stop_vm", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "success");
    assert_eq!(json["data"]["forced"], false);

    let (_, json) = get(&router, "/vm_status").await;
    assert_eq!(json["data"]["running"], false);
    assert_eq!(json["data"]["state"], "not_running");
    assert!(json["data"]["pid"].is_null());
}

// =============================================================================
// Logs
// =============================================================================

#[tokio::test]
async fn test_logs_placeholder_when_empty() {
    let (router, _) = create_test_router("qemu-system-x86_64");

    let (status, json) = get(&router, "/qemu_logs").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["logs"], json!([NO_LOGS_PLACEHOLDER]));
    assert_eq!(json["data"]["lines"], json!([]));
}

// =============================================================================
// Terminal
// =============================================================================

#[tokio::test]
async fn test_terminal_rejects_blank_command() {
    let (router, _) = create_test_router("qemu-system-x86_64");

    let (status, json) = post(&router, "/run_terminal_command", json!({"command": "   "})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["data"]["code"], "NO_COMMAND");
}

#[tokio::test]
async fn test_terminal_round_trip() {
    let (router, _) = create_test_router("qemu-system-x86_64");

    let (status, json) = post(
        &router,
        "/run_terminal_command",
        json!({"command": "printf hi"}),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["data"]["status"], "processing");
    assert!(json["data"]["run_id"].is_string());

    let mut output = Vec::new();
    for _ in 0..100 {
        let (_, json) = get(&router, "/get_terminal_output").await;
        output.extend(json["data"]["output"].as_array().cloned().unwrap_or_default());
        if output.iter().any(|l| l["type"] == "status") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(
        output,
        vec![
            json!({"message": "$ printf hi", "type": "command"}),
            json!({"message": "hi", "type": "info"}),
            json!({"message": "[Command finished with exit code 0]", "type": "status"}),
        ]
    );

    let (_, json) = get(&router, "/get_terminal_output").await;
    assert_eq!(json["data"]["output"], json!([]));
}
