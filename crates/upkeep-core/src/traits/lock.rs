//! Distributed job lock trait.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::result::AppResult;

/// Proof of exclusive ownership of a named job until `expires_at`.
///
/// Only the holder of the matching `token` can release the lease. Once
/// `expires_at` passes, another process may take the job over.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LockLease {
    /// Job name the lease is keyed by.
    pub job_name: String,
    /// Identity of the owning process.
    pub holder_id: String,
    /// Unique token for this acquisition.
    pub token: Uuid,
    /// When the lease was granted.
    pub acquired_at: DateTime<Utc>,
    /// When the lease stops being valid.
    pub expires_at: DateTime<Utc>,
}

impl LockLease {
    /// Build a lease granted at `acquired_at` for `duration`.
    pub fn grant(
        job_name: &str,
        holder_id: &str,
        acquired_at: DateTime<Utc>,
        duration: Duration,
    ) -> AppResult<Self> {
        Ok(Self {
            job_name: job_name.to_string(),
            holder_id: holder_id.to_string(),
            token: Uuid::new_v4(),
            acquired_at,
            expires_at: acquired_at + lease_delta(duration)?,
        })
    }

    /// Whether the lease has lapsed at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Time left on the lease at `now`, zero once expired.
    pub fn remaining_at(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).to_std().unwrap_or(Duration::ZERO)
    }

    /// The same lease with its deadline moved to `now + duration`.
    pub fn extended(&self, now: DateTime<Utc>, duration: Duration) -> AppResult<Self> {
        Ok(Self {
            expires_at: now + lease_delta(duration)?,
            ..self.clone()
        })
    }
}

/// Convert a lease duration into a chrono delta.
pub fn lease_delta(duration: Duration) -> AppResult<chrono::Duration> {
    chrono::Duration::from_std(duration)
        .map_err(|e| AppError::configuration(format!("Lease duration out of range: {e}")))
}

/// Trait for process-external mutual exclusion keyed by job name.
///
/// Implementations must guarantee at most one valid lease per job name
/// across every process sharing the backend. Acquisition never waits.
#[async_trait]
pub trait JobLock: Send + Sync + std::fmt::Debug + 'static {
    /// Return the backend name (e.g., "postgres", "redis", "memory").
    fn backend(&self) -> &str;

    /// Try to take the lease for `job_name`.
    ///
    /// Returns `Ok(None)` when another holder owns an unexpired lease.
    async fn try_acquire(
        &self,
        job_name: &str,
        holder_id: &str,
        lease: Duration,
    ) -> AppResult<Option<LockLease>>;

    /// Release a lease. Returns `false` if the lease was no longer held
    /// (expired and taken over, or already released).
    async fn release(&self, lease: &LockLease) -> AppResult<bool>;

    /// Extend a held lease to `duration` from now.
    ///
    /// Returns `Ok(None)` if the token no longer owns the job.
    async fn renew(&self, lease: &LockLease, duration: Duration) -> AppResult<Option<LockLease>>;
}
