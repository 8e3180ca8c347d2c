//! Row-claim sweep store for time-based state transitions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::result::AppResult;

/// A row whose transition failed inside an otherwise committed batch.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RowFailure {
    /// Row primary key.
    pub row_id: Uuid,
    /// Failure description.
    pub error: String,
}

/// Result of one claim-and-transition transaction.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ClaimBatch {
    /// Rows locked by this transaction.
    pub claimed: usize,
    /// Rows transitioned and committed.
    pub transitioned: Vec<Uuid>,
    /// Rows claimed but not transitioned.
    pub failed: Vec<RowFailure>,
}

/// Store that claims due rows with lock-and-skip semantics and transitions them.
///
/// Concurrent callers must receive disjoint sets of claimed rows. Rows that
/// failed an earlier attempt are claimed after rows that never failed.
#[async_trait]
pub trait ExpirySweepStore: Send + Sync + std::fmt::Debug + 'static {
    /// Claim up to `batch_size` rows due at `now`, skipping the ids in
    /// `exclude`, and expire them in one transaction.
    async fn expire_due_batch(
        &self,
        now: DateTime<Utc>,
        batch_size: u32,
        exclude: &[Uuid],
    ) -> AppResult<ClaimBatch>;
}
