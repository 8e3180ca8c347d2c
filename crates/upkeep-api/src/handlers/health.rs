//! Health check handlers.

use axum::Json;
use axum::extract::{Path, State};

use upkeep_core::error::AppError;

use crate::dto::response::{ApiResponse, HealthResponse, JobHealthResponse};
use crate::error::ApiError;
use crate::state::AppState;

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    let database = match state.db.health_check().await {
        Ok(true) => "connected",
        Ok(false) | Err(_) => "unavailable",
    };

    Json(ApiResponse::ok(HealthResponse {
        status: if database == "connected" { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        database: database.to_string(),
    }))
}

/// GET /health/jobs
pub async fn jobs(State(state): State<AppState>) -> Json<ApiResponse<Vec<JobHealthResponse>>> {
    let jobs = state
        .health
        .snapshot()
        .await
        .into_iter()
        .map(JobHealthResponse::from)
        .collect();
    Json(ApiResponse::ok(jobs))
}

/// GET /health/jobs/{name}
pub async fn job(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<JobHealthResponse>>, ApiError> {
    let health = state
        .health
        .get(&name)
        .await
        .ok_or_else(|| AppError::not_found(format!("Job '{name}' not found")))?;
    Ok(Json(ApiResponse::ok(health.into())))
}
