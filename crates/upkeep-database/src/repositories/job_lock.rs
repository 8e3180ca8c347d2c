//! Lease table backed job lock.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;

use upkeep_core::error::{AppError, ErrorKind};
use upkeep_core::result::AppResult;
use upkeep_core::traits::lock::{JobLock, LockLease};
use upkeep_entity::lock::JobLockRow;

/// [`JobLock`] over the `job_locks` table.
///
/// Expiry is judged by the database clock (`NOW()`), so replicas with
/// skewed clocks still agree on when a lease lapses.
#[derive(Debug, Clone)]
pub struct PgJobLock {
    pool: PgPool,
}

impl PgJobLock {
    /// Create a new lease-table lock.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Current holder of a job's lease, expired or not.
    pub async fn current(&self, job_name: &str) -> AppResult<Option<JobLockRow>> {
        sqlx::query_as::<_, JobLockRow>("SELECT * FROM job_locks WHERE job_name = $1")
            .bind(job_name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to read job lock", e))
    }
}

#[async_trait]
impl JobLock for PgJobLock {
    fn backend(&self) -> &str {
        "postgres"
    }

    async fn try_acquire(
        &self,
        job_name: &str,
        holder_id: &str,
        lease: Duration,
    ) -> AppResult<Option<LockLease>> {
        // Inserts a fresh lease or takes over an expired one in one statement.
        let row = sqlx::query_as::<_, JobLockRow>(
            "INSERT INTO job_locks (job_name, holder_id, token, acquired_at, expires_at) \
             VALUES ($1, $2, $3, NOW(), NOW() + make_interval(secs => $4)) \
             ON CONFLICT (job_name) DO UPDATE SET \
                holder_id = EXCLUDED.holder_id, \
                token = EXCLUDED.token, \
                acquired_at = EXCLUDED.acquired_at, \
                expires_at = EXCLUDED.expires_at \
             WHERE job_locks.expires_at <= NOW() \
             RETURNING job_name, holder_id, token, acquired_at, expires_at",
        )
        .bind(job_name)
        .bind(holder_id)
        .bind(uuid::Uuid::new_v4())
        .bind(lease.as_secs_f64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Lock, "Failed to acquire job lock", e))?;

        Ok(row.map(LockLease::from))
    }

    async fn release(&self, lease: &LockLease) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM job_locks WHERE job_name = $1 AND token = $2")
            .bind(&lease.job_name)
            .bind(lease.token)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Lock, "Failed to release job lock", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn renew(&self, lease: &LockLease, duration: Duration) -> AppResult<Option<LockLease>> {
        let row = sqlx::query_as::<_, JobLockRow>(
            "UPDATE job_locks SET expires_at = NOW() + make_interval(secs => $3) \
             WHERE job_name = $1 AND token = $2 AND expires_at > NOW() \
             RETURNING job_name, holder_id, token, acquired_at, expires_at",
        )
        .bind(&lease.job_name)
        .bind(lease.token)
        .bind(duration.as_secs_f64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Lock, "Failed to renew job lock", e))?;

        Ok(row.map(LockLease::from))
    }
}
