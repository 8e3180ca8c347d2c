//! Row model for the `job_locks` table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use upkeep_core::traits::lock::LockLease;

/// A lease row as stored in PostgreSQL.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobLockRow {
    /// Job name (primary key).
    pub job_name: String,
    /// Process that holds the lease.
    pub holder_id: String,
    /// Acquisition token.
    pub token: Uuid,
    /// When the lease was granted.
    pub acquired_at: DateTime<Utc>,
    /// When the lease lapses.
    pub expires_at: DateTime<Utc>,
}

impl From<JobLockRow> for LockLease {
    fn from(row: JobLockRow) -> Self {
        Self {
            job_name: row.job_name,
            holder_id: row.holder_id,
            token: row.token,
            acquired_at: row.acquired_at,
            expires_at: row.expires_at,
        }
    }
}
