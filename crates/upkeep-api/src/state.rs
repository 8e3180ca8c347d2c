//! Application state shared across all handlers.

use std::sync::Arc;
use std::time::Instant;

use upkeep_core::config::AppConfig;
use upkeep_database::DatabasePool;
use upkeep_worker::JobHealthRegistry;

/// Application state passed to every handler via `State<AppState>`.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,
    /// Database pool
    pub db: DatabasePool,
    /// Per-job health published by the scheduler
    pub health: JobHealthRegistry,
    /// Process start, for uptime
    pub started_at: Instant,
}

impl AppState {
    /// Create state for a process starting now.
    pub fn new(config: AppConfig, db: DatabasePool, health: JobHealthRegistry) -> Self {
        Self {
            config: Arc::new(config),
            db,
            health,
            started_at: Instant::now(),
        }
    }
}
