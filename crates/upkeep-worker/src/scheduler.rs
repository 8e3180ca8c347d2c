//! Cron scheduler driving the job table.

use std::sync::Arc;
use std::time::Duration;

use tokio_cron_scheduler::{Job as CronJob, JobScheduler};

use upkeep_core::error::AppError;

use crate::executor::JobTable;
use crate::runner::JobRunner;

/// Fires every enabled job of a [`JobTable`] on its cron cadence.
///
/// Each firing goes through [`JobRunner::run`], so lock acquisition, the
/// job timeout and health bookkeeping apply uniformly.
pub struct SchedulerRunner {
    scheduler: JobScheduler,
    table: Arc<JobTable>,
    runner: Arc<JobRunner>,
    started: bool,
}

impl std::fmt::Debug for SchedulerRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerRunner")
            .field("jobs", &self.table.names())
            .field("started", &self.started)
            .finish()
    }
}

impl SchedulerRunner {
    /// Create a scheduler for `table`.
    pub async fn new(table: Arc<JobTable>, runner: Arc<JobRunner>) -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {e}")))?;

        Ok(Self {
            scheduler,
            table,
            runner,
            started: false,
        })
    }

    /// Register every enabled job and start firing.
    pub async fn start(&mut self) -> Result<(), AppError> {
        for job in self.table.iter() {
            if !job.enabled {
                tracing::info!(job = %job.name, "Job disabled, not scheduling");
                continue;
            }

            let runner = Arc::clone(&self.runner);
            let scheduled = job.clone();
            let cron = CronJob::new_async(job.schedule.as_str(), move |_uuid, _lock| {
                let runner = Arc::clone(&runner);
                let scheduled = scheduled.clone();
                Box::pin(async move {
                    tracing::debug!(job = %scheduled.name, "Cron fired");
                    runner.run(&scheduled).await;
                })
            })
            .map_err(|e| {
                AppError::configuration(format!(
                    "Invalid schedule '{}' for job '{}': {e}",
                    job.schedule, job.name
                ))
            })?;

            self.scheduler.add(cron).await.map_err(|e| {
                AppError::internal(format!("Failed to add schedule for '{}': {e}", job.name))
            })?;

            self.runner.health().mark_running(&job.name).await;
            tracing::info!(job = %job.name, schedule = %job.schedule, "Scheduled job");
        }

        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {e}")))?;
        self.started = true;

        tracing::info!(jobs = self.table.len(), "Cron scheduler started");
        Ok(())
    }

    /// Stop firing, then wait up to `grace` for in-flight runs to finish.
    pub async fn shutdown(&mut self, grace: Duration) -> Result<(), AppError> {
        if self.started {
            self.scheduler
                .shutdown()
                .await
                .map_err(|e| AppError::internal(format!("Failed to shut down scheduler: {e}")))?;
            self.started = false;
        }
        self.runner.health().mark_all_stopped().await;

        let health = self.runner.health().clone();
        let drained = tokio::time::timeout(grace, async move {
            while health.any_in_progress().await {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        })
        .await;
        if drained.is_err() {
            tracing::warn!(
                grace_secs = grace.as_secs(),
                "Runs still in progress at shutdown; their leases will lapse"
            );
        }

        tracing::info!("Cron scheduler shut down");
        Ok(())
    }
}
