//! Booking repository and the pending-booking expiry claim.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Acquire, PgPool};
use tracing::warn;
use uuid::Uuid;

use upkeep_core::error::{AppError, ErrorKind};
use upkeep_core::result::AppResult;
use upkeep_core::traits::sweep::{ClaimBatch, ExpirySweepStore, RowFailure};
use upkeep_entity::booking::{Booking, BookingStatus};

/// Repository for booking reads and the expiry sweep.
#[derive(Debug, Clone)]
pub struct BookingRepository {
    pool: PgPool,
}

impl BookingRepository {
    /// Create a new booking repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a booking by ID.
    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Booking>> {
        sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find booking", e))
    }

    /// Count bookings currently due for expiry.
    pub async fn count_due(&self, now: DateTime<Utc>) -> AppResult<i64> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM bookings WHERE status = $1 AND expires_at <= $2",
        )
        .bind(BookingStatus::Pending)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count due bookings", e))
    }
}

#[async_trait]
impl ExpirySweepStore for BookingRepository {
    async fn expire_due_batch(
        &self,
        now: DateTime<Utc>,
        batch_size: u32,
        exclude: &[Uuid],
    ) -> AppResult<ClaimBatch> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin expiry transaction", e)
        })?;

        // Rows locked by a concurrent sweeper are skipped, not waited on.
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM bookings \
             WHERE status = $1 AND expires_at <= $2 AND NOT (id = ANY($4)) \
             ORDER BY expiry_failed_at NULLS FIRST, expires_at \
             LIMIT $3 \
             FOR UPDATE SKIP LOCKED",
        )
        .bind(BookingStatus::Pending)
        .bind(now)
        .bind(i64::from(batch_size))
        .bind(exclude)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to claim due bookings", e))?;

        let mut batch = ClaimBatch {
            claimed: ids.len(),
            ..ClaimBatch::default()
        };

        for id in ids {
            let mut savepoint = (&mut *tx).begin().await.map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to open savepoint", e)
            })?;

            let updated = sqlx::query(
                "UPDATE bookings SET status = $2, expired_at = $3, updated_at = $3 \
                 WHERE id = $1 AND status = $4",
            )
            .bind(id)
            .bind(BookingStatus::Expired)
            .bind(now)
            .bind(BookingStatus::Pending)
            .execute(&mut *savepoint)
            .await;

            match updated {
                Ok(result) if result.rows_affected() == 1 => {
                    savepoint.commit().await.map_err(|e| {
                        AppError::with_source(ErrorKind::Database, "Failed to release savepoint", e)
                    })?;
                    batch.transitioned.push(id);
                }
                Ok(_) => {
                    savepoint.commit().await.map_err(|e| {
                        AppError::with_source(ErrorKind::Database, "Failed to release savepoint", e)
                    })?;
                    batch.failed.push(RowFailure {
                        row_id: id,
                        error: "booking is no longer pending".to_string(),
                    });
                }
                Err(e) => {
                    warn!(booking_id = %id, error = %e, "Booking expiry update failed");
                    savepoint.rollback().await.map_err(|e| {
                        AppError::with_source(ErrorKind::Database, "Failed to roll back savepoint", e)
                    })?;
                    mark_failed(&mut tx, id, now).await?;
                    batch.failed.push(RowFailure {
                        row_id: id,
                        error: e.to_string(),
                    });
                }
            }
        }

        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to commit expiry batch", e)
        })?;

        Ok(batch)
    }
}

/// Stamp a failed expiry attempt so later claims order the row last.
async fn mark_failed(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: Uuid,
    now: DateTime<Utc>,
) -> AppResult<()> {
    let mut savepoint = (&mut **tx).begin().await.map_err(|e| {
        AppError::with_source(ErrorKind::Database, "Failed to open savepoint", e)
    })?;
    let marked = sqlx::query("UPDATE bookings SET expiry_failed_at = $2 WHERE id = $1")
        .bind(id)
        .bind(now)
        .execute(&mut *savepoint)
        .await;

    let closed = match marked {
        Ok(_) => savepoint.commit().await,
        Err(e) => {
            warn!(booking_id = %id, error = %e, "Failed to record expiry failure");
            savepoint.rollback().await
        }
    };
    closed.map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to close savepoint", e))
}
