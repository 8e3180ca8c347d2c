//! Route definitions for the health boundary.

use axum::{Router, routing::get};

use crate::handlers;
use crate::state::AppState;

/// Build the router and thread `state` through every route.
pub fn build_router(state: AppState) -> Router {
    Router::new().merge(health_routes()).with_state(state)
}

fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/health/jobs", get(handlers::health::jobs))
        .route("/health/jobs/{name}", get(handlers::health::job))
}
