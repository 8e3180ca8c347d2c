//! Pending booking expiry sweep.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

use upkeep_core::error::AppError;
use upkeep_core::traits::sweep::ExpirySweepStore;
use uuid::Uuid;

use crate::executor::{JobContext, JobExecutionError, JobHandler, JobOutcome};
use crate::jobs::BOOKING_EXPIRY;

/// Counters for one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    /// Rows claimed across all batches.
    pub claimed: u64,
    /// Rows moved to `expired`.
    pub expired: u64,
    /// Rows claimed but left untouched.
    pub failed: u64,
    /// Committed batches.
    pub batches: u32,
    /// Wall time of the run.
    pub duration_ms: u64,
}

/// Expires pending bookings whose deadline has passed, batch by batch.
///
/// Each batch is one transaction that claims due rows with lock-and-skip
/// semantics, so concurrent sweeps never transition the same row twice.
#[derive(Debug, Clone)]
pub struct BookingExpiryJob {
    store: Arc<dyn ExpirySweepStore>,
    batch_size: u32,
    max_batches: u32,
}

impl BookingExpiryJob {
    /// Create the job.
    pub fn new(store: Arc<dyn ExpirySweepStore>, batch_size: u32, max_batches: u32) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
            max_batches: max_batches.max(1),
        }
    }

    /// Run batches until the backlog is drained or the batch cap is hit.
    pub async fn sweep(&self, ctx: &JobContext<'_>) -> Result<SweepSummary, JobExecutionError> {
        let started = Instant::now();
        let mut summary = SweepSummary::default();
        // Rows that failed in this run are not claimed again until the next run.
        let mut failed_ids: Vec<Uuid> = Vec::new();

        while summary.batches < self.max_batches {
            if !ctx.keep_alive().await? {
                warn!(job = BOOKING_EXPIRY, batches = summary.batches, "Job lease lost, stopping sweep");
                return Err(JobExecutionError::Aborted(format!(
                    "job lease lost after {} batch(es)",
                    summary.batches
                )));
            }

            let batch = self
                .store
                .expire_due_batch(Utc::now(), self.batch_size, &failed_ids)
                .await
                .map_err(|e| abort(&summary, e))?;
            summary.batches += 1;
            summary.claimed += batch.claimed as u64;
            summary.expired += batch.transitioned.len() as u64;
            summary.failed += batch.failed.len() as u64;

            for id in &batch.transitioned {
                info!(booking_id = %id, "Expired pending booking");
            }
            for failure in &batch.failed {
                warn!(booking_id = %failure.row_id, error = %failure.error, "Failed to expire booking");
                failed_ids.push(failure.row_id);
            }

            // A short batch means the backlog is drained.
            if batch.claimed < self.batch_size as usize {
                break;
            }
        }

        summary.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            job = BOOKING_EXPIRY,
            claimed = summary.claimed,
            expired = summary.expired,
            failed = summary.failed,
            batches = summary.batches,
            duration_ms = summary.duration_ms,
            "Booking expiry sweep finished"
        );
        Ok(summary)
    }
}

fn abort(summary: &SweepSummary, err: AppError) -> JobExecutionError {
    error!(
        job = BOOKING_EXPIRY,
        committed_batches = summary.batches,
        expired = summary.expired,
        error = %err,
        "Booking expiry batch failed"
    );
    JobExecutionError::Aborted(format!(
        "batch {} failed after {} expired: {err}",
        summary.batches + 1,
        summary.expired
    ))
}

#[async_trait]
impl JobHandler for BookingExpiryJob {
    fn job_name(&self) -> &str {
        BOOKING_EXPIRY
    }

    async fn execute(&self, ctx: &JobContext<'_>) -> Result<JobOutcome, JobExecutionError> {
        let summary = self.sweep(ctx).await?;
        Ok(JobOutcome::Completed(
            serde_json::to_value(&summary).map_err(AppError::from)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    use chrono::{DateTime, Duration};
    use upkeep_core::result::AppResult;
    use upkeep_core::traits::sweep::{ClaimBatch, RowFailure};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Status {
        Pending,
        Expired,
        Confirmed,
    }

    #[derive(Debug)]
    struct Row {
        status: Status,
        expires_at: DateTime<Utc>,
        failed_at: Option<DateTime<Utc>>,
        locked: bool,
    }

    /// In-process table with row locks that claimers skip over.
    #[derive(Debug, Default)]
    struct MemorySweepStore {
        rows: Mutex<HashMap<Uuid, Row>>,
        transitions: Mutex<HashMap<Uuid, u32>>,
        poisoned: HashSet<Uuid>,
        fail_batches: bool,
    }

    impl MemorySweepStore {
        fn insert(&self, status: Status, expires_at: DateTime<Utc>) -> Uuid {
            let id = Uuid::new_v4();
            self.rows.lock().expect("rows").insert(
                id,
                Row {
                    status,
                    expires_at,
                    failed_at: None,
                    locked: false,
                },
            );
            id
        }

        fn status(&self, id: Uuid) -> Status {
            self.rows.lock().expect("rows")[&id].status
        }

        fn transition_counts(&self) -> HashMap<Uuid, u32> {
            self.transitions.lock().expect("transitions").clone()
        }
    }

    #[async_trait]
    impl ExpirySweepStore for MemorySweepStore {
        async fn expire_due_batch(
            &self,
            now: DateTime<Utc>,
            batch_size: u32,
            exclude: &[Uuid],
        ) -> AppResult<ClaimBatch> {
            if self.fail_batches {
                return Err(AppError::database("connection refused"));
            }

            let claimed: Vec<Uuid> = {
                let mut rows = self.rows.lock().expect("rows");
                // Never-failed rows first, then by deadline.
                let mut due: Vec<(Option<DateTime<Utc>>, DateTime<Utc>, Uuid)> = rows
                    .iter()
                    .filter(|(id, r)| {
                        !r.locked
                            && r.status == Status::Pending
                            && r.expires_at <= now
                            && !exclude.contains(*id)
                    })
                    .map(|(id, r)| (r.failed_at, r.expires_at, *id))
                    .collect();
                due.sort();
                due.truncate(batch_size as usize);
                for (_, _, id) in &due {
                    if let Some(row) = rows.get_mut(id) {
                        row.locked = true;
                    }
                }
                due.into_iter().map(|(_, _, id)| id).collect()
            };

            // Let a concurrent sweeper run between claim and update.
            tokio::task::yield_now().await;

            let mut batch = ClaimBatch {
                claimed: claimed.len(),
                ..ClaimBatch::default()
            };
            let mut rows = self.rows.lock().expect("rows");
            for id in claimed {
                let Some(row) = rows.get_mut(&id) else { continue };
                row.locked = false;
                if self.poisoned.contains(&id) {
                    row.failed_at = Some(now);
                    batch.failed.push(RowFailure {
                        row_id: id,
                        error: "check constraint violated".to_string(),
                    });
                    continue;
                }
                if row.status != Status::Pending {
                    batch.failed.push(RowFailure {
                        row_id: id,
                        error: "booking is no longer pending".to_string(),
                    });
                    continue;
                }
                row.status = Status::Expired;
                *self.transitions.lock().expect("transitions").entry(id).or_default() += 1;
                batch.transitioned.push(id);
            }
            Ok(batch)
        }
    }

    fn ctx() -> JobContext<'static> {
        JobContext::new(BOOKING_EXPIRY, "w1", None)
    }

    #[tokio::test]
    async fn test_expires_only_due_pending_rows() {
        let store = Arc::new(MemorySweepStore::default());
        let now = Utc::now();
        let due = store.insert(Status::Pending, now - Duration::minutes(5));
        let future = store.insert(Status::Pending, now + Duration::hours(1));
        let confirmed = store.insert(Status::Confirmed, now - Duration::hours(1));

        let job = BookingExpiryJob::new(store.clone(), 10, 5);
        let summary = job.sweep(&ctx()).await.expect("sweep");

        assert_eq!(summary.expired, 1);
        assert_eq!(summary.batches, 1);
        assert_eq!(store.status(due), Status::Expired);
        assert_eq!(store.status(future), Status::Pending);
        assert_eq!(store.status(confirmed), Status::Confirmed);
    }

    #[tokio::test]
    async fn test_drains_backlog_in_batches_up_to_cap() {
        let store = Arc::new(MemorySweepStore::default());
        let past = Utc::now() - Duration::minutes(1);
        for _ in 0..7 {
            store.insert(Status::Pending, past);
        }

        let summary = BookingExpiryJob::new(store.clone(), 3, 2)
            .sweep(&ctx())
            .await
            .expect("sweep");
        assert_eq!((summary.batches, summary.expired), (2, 6));

        let summary = BookingExpiryJob::new(store.clone(), 3, 2)
            .sweep(&ctx())
            .await
            .expect("sweep");
        assert_eq!((summary.batches, summary.expired), (1, 1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sweeps_transition_each_row_once() {
        let store = Arc::new(MemorySweepStore::default());
        let past = Utc::now() - Duration::minutes(1);
        let ids: Vec<Uuid> = (0..40).map(|_| store.insert(Status::Pending, past)).collect();

        let a = BookingExpiryJob::new(store.clone(), 3, 100);
        let b = BookingExpiryJob::new(store.clone(), 3, 100);
        let (ra, rb) = tokio::join!(
            async { a.sweep(&ctx()).await },
            async { b.sweep(&ctx()).await }
        );
        let (ra, rb) = (ra.expect("sweep a"), rb.expect("sweep b"));

        assert_eq!(ra.expired + rb.expired, 40);
        let counts = store.transition_counts();
        for id in ids {
            assert_eq!(counts.get(&id), Some(&1), "row {id} transitioned {:?} times", counts.get(&id));
        }
    }

    #[tokio::test]
    async fn test_poisoned_rows_do_not_block_others() {
        let mut store = MemorySweepStore::default();
        let past = Utc::now() - Duration::minutes(1);
        let bad = store.insert(Status::Pending, past - Duration::minutes(1));
        store.poisoned.insert(bad);
        let good = store.insert(Status::Pending, past);
        let store = Arc::new(store);

        let summary = BookingExpiryJob::new(store.clone(), 10, 5)
            .sweep(&ctx())
            .await
            .expect("sweep");
        assert_eq!((summary.claimed, summary.expired, summary.failed), (2, 1, 1));
        assert_eq!(store.status(good), Status::Expired);
        assert_eq!(store.status(bad), Status::Pending);
    }

    #[tokio::test]
    async fn test_failed_rows_are_not_reclaimed_within_run() {
        let mut store = MemorySweepStore::default();
        let past = Utc::now() - Duration::minutes(1);
        let bad = store.insert(Status::Pending, past);
        store.poisoned.insert(bad);
        let store = Arc::new(store);

        let summary = BookingExpiryJob::new(store, 1, 50)
            .sweep(&ctx())
            .await
            .expect("sweep");
        assert_eq!((summary.batches, summary.claimed, summary.failed), (2, 1, 1));
    }

    #[tokio::test]
    async fn test_full_batch_of_failing_rows_does_not_starve_due_rows() {
        let mut store = MemorySweepStore::default();
        let now = Utc::now();
        let bad_a = store.insert(Status::Pending, now - Duration::hours(3));
        let bad_b = store.insert(Status::Pending, now - Duration::hours(2));
        store.poisoned.extend([bad_a, bad_b]);
        let good = store.insert(Status::Pending, now - Duration::hours(1));
        let store = Arc::new(store);

        let summary = BookingExpiryJob::new(store.clone(), 2, 100)
            .sweep(&ctx())
            .await
            .expect("sweep");
        assert_eq!(summary.expired, 1);
        assert_eq!(summary.failed, 2);
        assert_eq!(store.status(good), Status::Expired);
        assert_eq!(store.status(bad_a), Status::Pending);
    }

    #[tokio::test]
    async fn test_previously_failed_rows_are_claimed_last_across_runs() {
        let mut store = MemorySweepStore::default();
        let now = Utc::now();
        let bad_a = store.insert(Status::Pending, now - Duration::hours(3));
        let bad_b = store.insert(Status::Pending, now - Duration::hours(2));
        store.poisoned.extend([bad_a, bad_b]);
        let store = Arc::new(store);

        // First run records both failures.
        BookingExpiryJob::new(store.clone(), 2, 1)
            .sweep(&ctx())
            .await
            .expect("first sweep");

        // A newer due row arrives; a one-batch run must reach it first.
        let good = store.insert(Status::Pending, now - Duration::minutes(5));
        let summary = BookingExpiryJob::new(store.clone(), 2, 1)
            .sweep(&ctx())
            .await
            .expect("second sweep");
        assert_eq!(summary.expired, 1);
        assert_eq!(store.status(good), Status::Expired);
    }

    #[tokio::test]
    async fn test_store_failure_aborts() {
        let store = Arc::new(MemorySweepStore {
            fail_batches: true,
            ..MemorySweepStore::default()
        });
        let err = BookingExpiryJob::new(store, 10, 5)
            .execute(&ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, JobExecutionError::Aborted(_)));
    }
}
