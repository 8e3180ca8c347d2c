//! Wiring of the job table from configuration.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use upkeep_core::config::AppConfig;
use upkeep_core::result::AppResult;
use upkeep_core::traits::lock::JobLock;
use upkeep_database::DatabasePool;
use upkeep_database::repositories::{BookingRepository, DisputeRepository, ReferenceCollector};
use upkeep_storage::{KeyExtractor, build_object_store};

use crate::disputes::DisputeResolver;
use crate::executor::{JobTable, ScheduledJob};
use crate::health::JobHealthRegistry;
use crate::jobs::{BOOKING_EXPIRY, BookingExpiryJob, ORPHAN_RECONCILIATION, OrphanReconciler};
use crate::lock::build_job_lock;
use crate::runner::JobRunner;

/// Everything the server and the CLI need to run jobs.
#[derive(Debug, Clone)]
pub struct WorkerParts {
    /// Registered jobs.
    pub table: Arc<JobTable>,
    /// Runner bound to this process's holder id and lock backend.
    pub runner: Arc<JobRunner>,
    /// Health registry shared with the HTTP boundary.
    pub health: JobHealthRegistry,
    /// Dispute resolution entry point.
    pub disputes: DisputeResolver,
}

/// Build storage, the lock backend, the job table and the runner.
pub async fn build_worker(config: &AppConfig, db: &DatabasePool) -> AppResult<WorkerParts> {
    let pool = db.pool().clone();

    let store = build_object_store(&config.storage).await?;
    let lock: Arc<dyn JobLock> = build_job_lock(&config.worker, &pool).await?;

    let extractor = KeyExtractor::new(config.storage.bucket_name().map(String::from));
    let references = ReferenceCollector::new(
        pool.clone(),
        config.reconciler.references.clone(),
        extractor,
    )?;

    let reconciler = &config.reconciler;
    let orphan = OrphanReconciler::new(
        store,
        Arc::new(references),
        chrono::Duration::days(i64::from(reconciler.grace_period_days)),
        reconciler.page_size,
        reconciler.prefix.clone(),
    );

    let expiry = &config.booking_expiry;
    let sweep = BookingExpiryJob::new(
        Arc::new(BookingRepository::new(pool.clone())),
        expiry.batch_size,
        expiry.max_batches_per_run,
    );

    let mut table = JobTable::new();
    table.register(ScheduledJob {
        name: ORPHAN_RECONCILIATION.to_string(),
        schedule: reconciler.schedule.clone(),
        timeout: Duration::from_secs(reconciler.timeout_seconds),
        lease: Duration::from_secs(reconciler.lease_seconds),
        enabled: reconciler.enabled,
        exclusive: true,
        handler: Arc::new(orphan),
    })?;
    table.register(ScheduledJob {
        name: BOOKING_EXPIRY.to_string(),
        schedule: expiry.schedule.clone(),
        timeout: Duration::from_secs(expiry.timeout_seconds),
        lease: Duration::from_secs(expiry.lease_seconds),
        enabled: expiry.enabled,
        exclusive: expiry.exclusive,
        handler: Arc::new(sweep),
    })?;

    let health = JobHealthRegistry::new();
    for job in table.iter() {
        health.register(&job.name, &job.schedule, job.enabled).await;
    }

    let holder_id = config.worker.resolve_holder_id();
    info!(holder_id = %holder_id, jobs = table.len(), "Worker assembled");

    Ok(WorkerParts {
        table: Arc::new(table),
        runner: Arc::new(JobRunner::new(lock, holder_id, health.clone())),
        health,
        disputes: DisputeResolver::new(DisputeRepository::new(pool)),
    })
}
