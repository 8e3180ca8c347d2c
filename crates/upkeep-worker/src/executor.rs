//! Job handler trait and the job table.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use upkeep_core::error::AppError;
use upkeep_core::result::AppResult;

use crate::lock::LeaseGuard;

/// What a job body reports on success.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// The run did its work; the value is its summary.
    Completed(Value),
    /// The run decided there was nothing it could do.
    Skipped(String),
}

/// Error from job execution
#[derive(Debug, thiserror::Error)]
pub enum JobExecutionError {
    /// The run stopped early; nothing past the failure point was applied.
    #[error("Job aborted: {0}")]
    Aborted(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] AppError),
}

/// Per-run context handed to a job body.
#[derive(Debug)]
pub struct JobContext<'a> {
    job_name: &'a str,
    holder_id: &'a str,
    lease: Option<&'a LeaseGuard>,
}

impl<'a> JobContext<'a> {
    /// Context for a run holding `lease`.
    pub fn new(job_name: &'a str, holder_id: &'a str, lease: Option<&'a LeaseGuard>) -> Self {
        Self {
            job_name,
            holder_id,
            lease,
        }
    }

    /// Name of the running job.
    pub fn job_name(&self) -> &str {
        self.job_name
    }

    /// Identity of this process.
    pub fn holder_id(&self) -> &str {
        self.holder_id
    }

    /// Whether the run holds the job lock.
    pub fn is_exclusive(&self) -> bool {
        self.lease.is_some()
    }

    /// Confirm and renew the job lease with the lock backend before exclusive work.
    ///
    /// Always `true` for runs that do not hold a lease.
    pub async fn keep_alive(&self) -> AppResult<bool> {
        match self.lease {
            Some(guard) => guard.keep_alive().await,
            None => Ok(true),
        }
    }
}

/// Trait for job handler implementations
#[async_trait]
pub trait JobHandler: Send + Sync + std::fmt::Debug {
    /// Job name this handler runs as.
    fn job_name(&self) -> &str;

    /// Run the job body once.
    async fn execute(&self, ctx: &JobContext<'_>) -> Result<JobOutcome, JobExecutionError>;
}

/// One row of the job table: cadence, limits and handler.
#[derive(Debug, Clone)]
pub struct ScheduledJob {
    /// Unique job name; also the lock key.
    pub name: String,
    /// Six-field cron expression.
    pub schedule: String,
    /// Global run timeout.
    pub timeout: Duration,
    /// Lock lease duration.
    pub lease: Duration,
    /// Whether the scheduler fires this job.
    pub enabled: bool,
    /// Whether runs must hold the job lock.
    pub exclusive: bool,
    /// Job body.
    pub handler: Arc<dyn JobHandler>,
}

/// Name-indexed table of scheduled jobs, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct JobTable {
    jobs: BTreeMap<String, ScheduledJob>,
}

impl JobTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a job. Names must be unique and the timeout shorter than the lease.
    pub fn register(&mut self, job: ScheduledJob) -> AppResult<()> {
        if job.timeout >= job.lease {
            return Err(AppError::configuration(format!(
                "Job '{}' timeout must be shorter than its lease",
                job.name
            )));
        }
        if self.jobs.contains_key(&job.name) {
            return Err(AppError::conflict(format!(
                "Job '{}' is already registered",
                job.name
            )));
        }
        tracing::info!(job = %job.name, schedule = %job.schedule, enabled = job.enabled, "Registered job");
        self.jobs.insert(job.name.clone(), job);
        Ok(())
    }

    /// Look up a job by name.
    pub fn get(&self, name: &str) -> Option<&ScheduledJob> {
        self.jobs.get(name)
    }

    /// Iterate jobs in name order.
    pub fn iter(&self) -> impl Iterator<Item = &ScheduledJob> {
        self.jobs.values()
    }

    /// Registered job names.
    pub fn names(&self) -> Vec<String> {
        self.jobs.keys().cloned().collect()
    }

    /// Number of registered jobs.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
