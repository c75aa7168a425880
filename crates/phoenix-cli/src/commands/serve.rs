//! Serve command implementation.
//!
//! Binds the control-plane router and runs until Ctrl+C (or SIGTERM on
//! unix). A VM still running at shutdown is stopped before the process exits.

use anyhow::{Context, Result};
use phoenix_api::{create_api_router, AppState};
use phoenix_supervisor::StopOutcome;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::Config;

/// Execute the serve command.
pub async fn execute(config: &Config) -> Result<()> {
    let state = AppState::new(
        config.supervisor.clone(),
        config.qemu_binary.clone(),
        config.vm.clone(),
    );
    let app = create_api_router(state.clone());

    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", config.host, config.port))?;
    let addr = listener.local_addr()?;
    info!(%addr, "Listening");

    println!();
    println!("Project Phoenix Control Plane");
    println!("   URL:  http://{}", addr);
    println!("   QEMU: {}", config.qemu_binary.display());
    println!();
    println!("   Press Ctrl+C to stop");
    println!();

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    match state.supervisor.stop().await {
        Ok(StopOutcome::Stopped { exit, forced }) => {
            info!(%exit, forced, "Stopped VM on shutdown");
        }
        Ok(StopOutcome::NotRunning { .. }) => {}
        Err(e) => warn!("Failed to stop VM on shutdown: {}", e),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
