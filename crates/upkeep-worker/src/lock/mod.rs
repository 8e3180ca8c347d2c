//! Job lock backends and the scoped lease guard.

pub mod guard;
pub mod memory;
pub mod redis;

use std::sync::Arc;

use sqlx::PgPool;
use tracing::info;

use upkeep_core::config::WorkerConfig;
use upkeep_core::error::AppError;
use upkeep_core::result::AppResult;
use upkeep_core::traits::lock::JobLock;
use upkeep_database::repositories::PgJobLock;

pub use guard::LeaseGuard;
pub use memory::MemoryJobLock;

/// Build the lock backend selected by `worker.lock_backend`.
pub async fn build_job_lock(config: &WorkerConfig, pool: &PgPool) -> AppResult<Arc<dyn JobLock>> {
    let lock: Arc<dyn JobLock> = match config.lock_backend.as_str() {
        "postgres" => Arc::new(PgJobLock::new(pool.clone())),
        "memory" => Arc::new(MemoryJobLock::new()),
        #[cfg(feature = "redis-lock")]
        "redis" => Arc::new(self::redis::RedisJobLock::connect(&config.redis_url).await?),
        other => {
            return Err(AppError::configuration(format!(
                "Lock backend '{other}' is not available in this build"
            )));
        }
    };
    info!(backend = lock.backend(), "Job lock backend ready");
    Ok(lock)
}
