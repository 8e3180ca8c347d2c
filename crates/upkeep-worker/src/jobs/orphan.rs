//! Orphan object reconciliation.
//!
//! Deletes objects from the bucket that no application row references any
//! more. An object is deleted only when, right before the delete:
//!
//! 1. it is still absent from the reference index (targeted re-check), and
//! 2. it is older than the grace period according to a fresh `head`.
//!
//! The reference index is collected first and held in memory; the bucket
//! is streamed page by page and only the orphan subset is kept.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use upkeep_core::error::AppError;
use upkeep_core::traits::references::ReferenceSource;
use upkeep_core::traits::storage::{ObjectMeta, ObjectStore};
use upkeep_core::types::key::StorageKey;
use upkeep_storage::lister::{ListingError, StorageLister};

use crate::executor::{JobContext, JobExecutionError, JobHandler, JobOutcome};
use crate::jobs::ORPHAN_RECONCILIATION;

/// Counters for one reconciliation run.
///
/// `deleted + skipped_in_grace + skipped_referenced + errored == orphans`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    /// Keys seen in the bucket listing.
    pub bucket_keys: u64,
    /// Distinct keys in the reference index.
    pub referenced_keys: u64,
    /// Bucket keys absent from the reference index.
    pub orphans: u64,
    /// Orphans deleted, or already gone at re-check.
    pub deleted: u64,
    /// Orphans younger than the grace period.
    pub skipped_in_grace: u64,
    /// Orphans found referenced at re-check.
    pub skipped_referenced: u64,
    /// Orphans whose head, re-check or delete failed.
    pub errored: u64,
    /// Wall time of the run.
    pub duration_ms: u64,
}

/// Why a run did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No object store is configured for this deployment.
    StorageNotConfigured,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StorageNotConfigured => write!(f, "storage not configured"),
        }
    }
}

/// Successful end states of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The run went through every orphan.
    Completed(ReconcileSummary),
    /// The run did not start.
    Skipped(SkipReason),
}

/// Conditions that abort a run. Nothing is deleted after one is raised.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The first listing page failed.
    #[error("storage backend unavailable: {0}")]
    BackendUnavailable(#[source] AppError),
    /// Reading the reference registry failed.
    #[error("reference query failed: {0}")]
    ReferenceQueryFailure(#[source] AppError),
    /// A later listing page failed; the bucket view is incomplete.
    #[error("listing interrupted after {pages} page(s): {source}")]
    ListingInterrupted {
        /// Pages read before the failure.
        pages: usize,
        /// Backend error.
        #[source]
        source: AppError,
    },
    /// The job lease lapsed or was taken over mid-run.
    #[error("job lease lost before deleting {key}")]
    LeaseLost {
        /// Key that was about to be deleted.
        key: StorageKey,
    },
}

impl From<ListingError> for ReconcileError {
    fn from(err: ListingError) -> Self {
        match err {
            ListingError::BackendUnavailable(source) => Self::BackendUnavailable(source),
            ListingError::Interrupted { pages, source } => {
                Self::ListingInterrupted { pages, source }
            }
        }
    }
}

impl From<ReconcileError> for JobExecutionError {
    fn from(err: ReconcileError) -> Self {
        JobExecutionError::Aborted(err.to_string())
    }
}

/// The orphan reconciliation job.
#[derive(Debug, Clone)]
pub struct OrphanReconciler {
    store: Option<Arc<dyn ObjectStore>>,
    references: Arc<dyn ReferenceSource>,
    grace_period: chrono::Duration,
    page_size: u32,
    prefix: Option<String>,
}

impl OrphanReconciler {
    /// Create a reconciler. `store` is `None` when storage is not configured.
    pub fn new(
        store: Option<Arc<dyn ObjectStore>>,
        references: Arc<dyn ReferenceSource>,
        grace_period: chrono::Duration,
        page_size: u32,
        prefix: Option<String>,
    ) -> Self {
        Self {
            store,
            references,
            grace_period,
            page_size,
            prefix,
        }
    }

    /// Run one reconciliation pass.
    pub async fn reconcile(
        &self,
        ctx: &JobContext<'_>,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let started = Instant::now();

        let Some(store) = self.store.as_ref() else {
            info!(job = ORPHAN_RECONCILIATION, "Object storage not configured, skipping");
            return Ok(ReconcileOutcome::Skipped(SkipReason::StorageNotConfigured));
        };

        let referenced = self
            .references
            .collect()
            .await
            .map_err(ReconcileError::ReferenceQueryFailure)?;

        let mut summary = ReconcileSummary {
            referenced_keys: referenced.len() as u64,
            ..ReconcileSummary::default()
        };

        let orphans = self
            .find_orphans(Arc::clone(store), &referenced, &mut summary)
            .await?;
        drop(referenced);
        summary.orphans = orphans.len() as u64;

        let chunk_size = self.page_size.max(1) as usize;
        for chunk in orphans.chunks(chunk_size) {
            if let Err(e) = self.settle_chunk(store.as_ref(), chunk, ctx, &mut summary).await {
                summary.duration_ms = started.elapsed().as_millis() as u64;
                error!(
                    job = ORPHAN_RECONCILIATION,
                    deleted = summary.deleted,
                    orphans = summary.orphans,
                    error = %e,
                    "Orphan reconciliation aborted"
                );
                return Err(e);
            }
        }

        summary.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            job = ORPHAN_RECONCILIATION,
            bucket_keys = summary.bucket_keys,
            referenced_keys = summary.referenced_keys,
            orphans = summary.orphans,
            deleted = summary.deleted,
            skipped_in_grace = summary.skipped_in_grace,
            skipped_referenced = summary.skipped_referenced,
            errored = summary.errored,
            duration_ms = summary.duration_ms,
            "Orphan reconciliation finished"
        );
        Ok(ReconcileOutcome::Completed(summary))
    }

    /// Stream the bucket, keeping only keys absent from `referenced`.
    async fn find_orphans(
        &self,
        store: Arc<dyn ObjectStore>,
        referenced: &HashSet<StorageKey>,
        summary: &mut ReconcileSummary,
    ) -> Result<Vec<ObjectMeta>, ReconcileError> {
        let lister = StorageLister::new(store, self.prefix.clone(), self.page_size);
        let mut listing = lister.list();
        let mut orphans = Vec::new();

        while let Some(item) = listing.next().await {
            let meta = item?;
            summary.bucket_keys += 1;
            if !referenced.contains(&meta.key) {
                orphans.push(meta);
            }
        }
        Ok(orphans)
    }

    /// Re-check a chunk of orphans and delete the ones that pass both checks.
    ///
    /// Each orphan gets a fresh `head`; those past grace are re-checked
    /// against the registry in one batch right before their deletes.
    async fn settle_chunk(
        &self,
        store: &dyn ObjectStore,
        chunk: &[ObjectMeta],
        ctx: &JobContext<'_>,
        summary: &mut ReconcileSummary,
    ) -> Result<(), ReconcileError> {
        let now = Utc::now();
        let mut candidates = Vec::with_capacity(chunk.len());
        for orphan in chunk {
            match store.head(&orphan.key).await {
                // Already gone; delete is idempotent.
                Ok(None) => summary.deleted += 1,
                Ok(Some(current)) if !self.past_grace(current.last_modified, now) => {
                    summary.skipped_in_grace += 1;
                }
                Ok(Some(_)) => candidates.push(orphan),
                Err(e) => {
                    warn!(key = %orphan.key, error = %e, "Failed to reconcile object");
                    summary.errored += 1;
                }
            }
        }
        if candidates.is_empty() {
            return Ok(());
        }

        let keys: Vec<StorageKey> = candidates.iter().map(|o| o.key.clone()).collect();
        let (referenced, mut failed) = self.recheck(&keys).await;

        for orphan in candidates {
            if let Some(e) = failed.remove(&orphan.key) {
                warn!(key = %orphan.key, error = %e, "Failed to reconcile object");
                summary.errored += 1;
                continue;
            }
            if referenced.contains(&orphan.key) {
                summary.skipped_referenced += 1;
                continue;
            }

            match ctx.keep_alive().await {
                Ok(true) => {}
                Ok(false) => return Err(ReconcileError::LeaseLost { key: orphan.key.clone() }),
                Err(e) => {
                    warn!(error = %e, "Lock backend error while checking lease");
                    return Err(ReconcileError::LeaseLost { key: orphan.key.clone() });
                }
            }

            match store.delete(&orphan.key).await {
                Ok(()) => {
                    info!(key = %orphan.key, size_bytes = orphan.size_bytes, "Deleted orphaned object");
                    summary.deleted += 1;
                }
                Err(e) => {
                    warn!(key = %orphan.key, error = %e, "Failed to reconcile object");
                    summary.errored += 1;
                }
            }
        }
        Ok(())
    }

    /// Batched reference re-check, falling back to one query per key when
    /// the batch fails so a single bad key only errors itself.
    async fn recheck(
        &self,
        keys: &[StorageKey],
    ) -> (HashSet<StorageKey>, HashMap<StorageKey, AppError>) {
        match self.references.referenced_among(keys).await {
            Ok(referenced) => (referenced, HashMap::new()),
            Err(e) => {
                warn!(keys = keys.len(), error = %e, "Batched reference re-check failed, checking keys one by one");
                let mut referenced = HashSet::new();
                let mut failed = HashMap::new();
                for key in keys {
                    match self.references.is_referenced(key).await {
                        Ok(true) => {
                            referenced.insert(key.clone());
                        }
                        Ok(false) => {}
                        Err(e) => {
                            failed.insert(key.clone(), e);
                        }
                    }
                }
                (referenced, failed)
            }
        }
    }

    /// Objects without a usable timestamp are never considered past grace.
    fn past_grace(&self, last_modified: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        last_modified.is_some_and(|modified| now - modified >= self.grace_period)
    }
}

#[async_trait]
impl JobHandler for OrphanReconciler {
    fn job_name(&self) -> &str {
        ORPHAN_RECONCILIATION
    }

    async fn execute(&self, ctx: &JobContext<'_>) -> Result<JobOutcome, JobExecutionError> {
        match self.reconcile(ctx).await {
            Ok(ReconcileOutcome::Completed(summary)) => Ok(JobOutcome::Completed(
                serde_json::to_value(&summary).map_err(AppError::from)?,
            )),
            Ok(ReconcileOutcome::Skipped(reason)) => Ok(JobOutcome::Skipped(reason.to_string())),
            Err(e) => {
                error!(job = ORPHAN_RECONCILIATION, error = %e, "Orphan reconciliation failed");
                Err(e.into())
            }
        }
    }
}
