//! In-memory job lock for single-node deployments and tests.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use upkeep_core::result::AppResult;
use upkeep_core::traits::lock::{JobLock, LockLease};

/// Process-local [`JobLock`]. Only excludes runs inside one process.
#[derive(Debug, Default)]
pub struct MemoryJobLock {
    leases: Mutex<HashMap<String, LockLease>>,
}

impl MemoryJobLock {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobLock for MemoryJobLock {
    fn backend(&self) -> &str {
        "memory"
    }

    async fn try_acquire(
        &self,
        job_name: &str,
        holder_id: &str,
        lease: Duration,
    ) -> AppResult<Option<LockLease>> {
        let mut leases = self.leases.lock().await;
        let now = Utc::now();

        if leases
            .get(job_name)
            .is_some_and(|held| !held.is_expired_at(now))
        {
            return Ok(None);
        }

        let granted = LockLease::grant(job_name, holder_id, now, lease)?;
        leases.insert(job_name.to_string(), granted.clone());
        Ok(Some(granted))
    }

    async fn release(&self, lease: &LockLease) -> AppResult<bool> {
        let mut leases = self.leases.lock().await;
        match leases.get(&lease.job_name) {
            Some(held) if held.token == lease.token => {
                leases.remove(&lease.job_name);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn renew(&self, lease: &LockLease, duration: Duration) -> AppResult<Option<LockLease>> {
        let mut leases = self.leases.lock().await;
        let now = Utc::now();
        match leases.get_mut(&lease.job_name) {
            Some(held) if held.token == lease.token && !held.is_expired_at(now) => {
                *held = held.extended(now, duration)?;
                Ok(Some(held.clone()))
            }
            _ => Ok(None),
        }
    }
}
