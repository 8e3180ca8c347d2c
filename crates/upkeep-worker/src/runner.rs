//! Job runner: lock, timeout and bookkeeping around one job run.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::FutureExt;
use serde_json::Value;
use tracing::{error, info, warn};

use upkeep_core::traits::lock::JobLock;

use crate::executor::{JobContext, JobOutcome, ScheduledJob};
use crate::health::JobHealthRegistry;
use crate::lock::LeaseGuard;

/// Result of one run as recorded in the health registry.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The body finished and returned its summary.
    Completed(Value),
    /// The body skipped itself.
    Skipped(String),
    /// Another holder owns the job lock; the body never ran.
    LockNotAcquired,
    /// The body or the lock backend returned an error.
    Failed(String),
    /// The body exceeded the job timeout and was cancelled.
    TimedOut,
    /// The body panicked.
    Panicked(String),
}

impl RunOutcome {
    /// Short label used in logs and the health endpoint.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed(_) => "completed",
            Self::Skipped(_) => "skipped",
            Self::LockNotAcquired => "lock_not_acquired",
            Self::Failed(_) => "failed",
            Self::TimedOut => "timed_out",
            Self::Panicked(_) => "panicked",
        }
    }

    /// Whether the run counts as a failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_) | Self::TimedOut | Self::Panicked(_))
    }

    fn detail(&self) -> Option<Value> {
        match self {
            Self::Completed(summary) => Some(summary.clone()),
            Self::Skipped(reason) | Self::Failed(reason) | Self::Panicked(reason) => {
                Some(Value::String(reason.clone()))
            }
            Self::LockNotAcquired | Self::TimedOut => None,
        }
    }
}

/// Executes jobs from the table under their lock and timeout.
#[derive(Debug, Clone)]
pub struct JobRunner {
    lock: Arc<dyn JobLock>,
    holder_id: String,
    health: JobHealthRegistry,
}

impl JobRunner {
    /// Create a runner for this process.
    pub fn new(lock: Arc<dyn JobLock>, holder_id: String, health: JobHealthRegistry) -> Self {
        Self {
            lock,
            holder_id,
            health,
        }
    }

    /// Identity recorded on this runner's leases.
    pub fn holder_id(&self) -> &str {
        &self.holder_id
    }

    /// Health registry this runner reports to.
    pub fn health(&self) -> &JobHealthRegistry {
        &self.health
    }

    /// Run `job` once.
    ///
    /// The lease is released on every exit path: explicitly after the body
    /// returns, times out or panics, and by the guard's drop if this
    /// future itself is cancelled.
    pub async fn run(&self, job: &ScheduledJob) -> RunOutcome {
        let started = Instant::now();
        self.health.run_started(&job.name, Utc::now()).await;

        let guard = if job.exclusive {
            match LeaseGuard::acquire(Arc::clone(&self.lock), &job.name, &self.holder_id, job.lease)
                .await
            {
                Ok(Some(guard)) => Some(guard),
                Ok(None) => {
                    info!(job = %job.name, "Job lock held by another worker, skipping run");
                    return self.finish(job, RunOutcome::LockNotAcquired, started).await;
                }
                Err(e) => {
                    error!(job = %job.name, error = %e, "Failed to acquire job lock");
                    return self
                        .finish(job, RunOutcome::Failed(e.to_string()), started)
                        .await;
                }
            }
        } else {
            None
        };

        let ctx = JobContext::new(&job.name, &self.holder_id, guard.as_ref());
        let body = AssertUnwindSafe(job.handler.execute(&ctx)).catch_unwind();
        let outcome = match tokio::time::timeout(job.timeout, body).await {
            Ok(Ok(Ok(JobOutcome::Completed(summary)))) => RunOutcome::Completed(summary),
            Ok(Ok(Ok(JobOutcome::Skipped(reason)))) => {
                info!(job = %job.name, reason = %reason, "Job skipped");
                RunOutcome::Skipped(reason)
            }
            Ok(Ok(Err(e))) => {
                error!(job = %job.name, error = %e, "Job failed");
                RunOutcome::Failed(e.to_string())
            }
            Ok(Err(panic)) => {
                let message = panic_message(panic.as_ref());
                error!(job = %job.name, panic = %message, "Job panicked");
                RunOutcome::Panicked(message)
            }
            Err(_) => {
                error!(
                    job = %job.name,
                    timeout_secs = job.timeout.as_secs(),
                    "Job exceeded its timeout and was cancelled"
                );
                RunOutcome::TimedOut
            }
        };
        drop(ctx);

        if let Some(guard) = guard {
            match guard.release().await {
                Ok(true) => {}
                Ok(false) => warn!(job = %job.name, "Lease had already lapsed at release"),
                Err(e) => warn!(job = %job.name, error = %e, "Failed to release job lock"),
            }
        }

        self.finish(job, outcome, started).await
    }

    async fn finish(&self, job: &ScheduledJob, outcome: RunOutcome, started: Instant) -> RunOutcome {
        self.health
            .run_finished(
                &job.name,
                Utc::now(),
                outcome.label(),
                outcome.is_failure(),
                outcome.detail(),
            )
            .await;
        info!(
            job = %job.name,
            outcome = outcome.label(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Job run finished"
        );
        outcome
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
