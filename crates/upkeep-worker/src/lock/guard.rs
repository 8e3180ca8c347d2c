//! Scoped ownership of a job lease.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use upkeep_core::result::AppResult;
use upkeep_core::traits::lock::{JobLock, LockLease};

/// Holds a [`LockLease`] for the duration of one job run.
///
/// Call [`LeaseGuard::release`] on the normal path. If the guard is
/// dropped without it (the run future was cancelled or panicked), a
/// release is spawned on the current runtime; failing that, the lease
/// simply lapses at `expires_at`.
#[derive(Debug)]
pub struct LeaseGuard {
    lock: Arc<dyn JobLock>,
    lease: Mutex<LockLease>,
    duration: Duration,
    released: bool,
}

impl LeaseGuard {
    /// Try to take the lease for `job_name`. `Ok(None)` when another
    /// holder owns it.
    pub async fn acquire(
        lock: Arc<dyn JobLock>,
        job_name: &str,
        holder_id: &str,
        duration: Duration,
    ) -> AppResult<Option<Self>> {
        let Some(lease) = lock.try_acquire(job_name, holder_id, duration).await? else {
            return Ok(None);
        };
        debug!(
            job = job_name,
            token = %lease.token,
            expires_at = %lease.expires_at,
            "Lease acquired"
        );
        Ok(Some(Self {
            lock,
            lease: Mutex::new(lease),
            duration,
            released: false,
        }))
    }

    /// Snapshot of the current lease.
    pub async fn lease(&self) -> LockLease {
        self.lease.lock().await.clone()
    }

    /// Confirm the lease with the lock backend and extend it.
    ///
    /// Expiry is judged by the backend, never by the local clock. Returns
    /// `false` when the lease has lapsed or was taken over; the caller must
    /// stop doing exclusive work.
    pub async fn keep_alive(&self) -> AppResult<bool> {
        let mut lease = self.lease.lock().await;
        match self.lock.renew(&lease, self.duration).await? {
            Some(renewed) => {
                debug!(job = %renewed.job_name, expires_at = %renewed.expires_at, "Lease renewed");
                *lease = renewed;
                Ok(true)
            }
            None => {
                warn!(job = %lease.job_name, token = %lease.token, "Lease no longer held");
                Ok(false)
            }
        }
    }

    /// Release the lease. Returns `false` if it was no longer held.
    pub async fn release(mut self) -> AppResult<bool> {
        self.released = true;
        let lease = self.lease.get_mut().clone();
        self.lock.release(&lease).await
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let lease = self.lease.get_mut().clone();
        let lock = Arc::clone(&self.lock);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = lock.release(&lease).await {
                        warn!(job = %lease.job_name, error = %e, "Failed to release dropped lease");
                    }
                });
            }
            Err(_) => {
                warn!(
                    job = %lease.job_name,
                    expires_at = %lease.expires_at,
                    "Lease dropped outside a runtime; it will lapse on expiry"
                );
            }
        }
    }
}
