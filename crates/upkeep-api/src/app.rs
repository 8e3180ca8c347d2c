//! Application builder and server entry point.

use std::time::Duration;

use axum::Router;
use tower_http::trace::TraceLayer;

use upkeep_core::config::AppConfig;
use upkeep_core::error::AppError;
use upkeep_database::DatabasePool;
use upkeep_worker::{SchedulerRunner, build_worker};

use crate::router::build_router;
use crate::state::AppState;

/// Builds the Axum application with routes and the trace layer.
pub fn build_app(state: AppState) -> Router {
    build_router(state).layer(TraceLayer::new_for_http())
}

/// Runs the scheduler and the health server until a shutdown signal.
pub async fn run_server(config: AppConfig, db: DatabasePool) -> Result<(), AppError> {
    tracing::info!("Starting Upkeep server...");

    // ── Step 1: Storage, lock backend and job table ──────────────
    let parts = build_worker(&config, &db).await?;

    // ── Step 2: Scheduler ────────────────────────────────────────
    let mut scheduler = if config.worker.enabled {
        let mut scheduler =
            SchedulerRunner::new(parts.table.clone(), parts.runner.clone()).await?;
        scheduler.start().await?;
        Some(scheduler)
    } else {
        tracing::info!("Background worker disabled");
        None
    };

    // ── Step 3: Health server ────────────────────────────────────
    let app_state = AppState::new(config.clone(), db.clone(), parts.health.clone());
    let app = build_app(app_state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;

    tracing::info!("Upkeep health server listening on {}", addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received, starting graceful shutdown...");
        })
        .await
        .map_err(|e| AppError::internal(format!("Server error: {e}")));

    // ── Step 4: Drain in-flight runs ─────────────────────────────
    if let Some(scheduler) = scheduler.as_mut() {
        let grace = Duration::from_secs(config.worker.shutdown_grace_seconds);
        if let Err(e) = scheduler.shutdown(grace).await {
            tracing::warn!(error = %e, "Scheduler shutdown failed");
        }
    }
    db.close().await;

    served?;
    tracing::info!("Upkeep server shut down gracefully");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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
}
