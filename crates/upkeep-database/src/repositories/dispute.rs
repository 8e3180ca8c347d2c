//! Dispute repository and the locked resolution transaction.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use upkeep_core::error::{AppError, ErrorKind};
use upkeep_core::result::AppResult;
use upkeep_entity::booking::Booking;
use upkeep_entity::dispute::{Dispute, Resolution, ResolvedDispute};

/// Repository for disputes.
#[derive(Debug, Clone)]
pub struct DisputeRepository {
    pool: PgPool,
}

impl DisputeRepository {
    /// Create a new dispute repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a dispute by ID.
    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Dispute>> {
        sqlx::query_as::<_, Dispute>("SELECT * FROM disputes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find dispute", e))
    }

    /// Apply `resolution` to an open dispute and its booking atomically.
    ///
    /// Lock order is fixed: the booking row first, then the dispute row.
    /// Every writer touching both rows must follow the same order.
    pub async fn resolve(
        &self,
        dispute_id: Uuid,
        resolution: &Resolution,
        now: DateTime<Utc>,
    ) -> AppResult<ResolvedDispute> {
        resolution.validate()?;

        let booking_id: Uuid =
            sqlx::query_scalar("SELECT booking_id FROM disputes WHERE id = $1")
                .bind(dispute_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to read dispute", e)
                })?
                .ok_or_else(|| AppError::not_found(format!("Dispute {dispute_id} not found")))?;

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin resolution", e)
        })?;

        let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1 FOR UPDATE")
            .bind(booking_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to lock booking", e))?
            .ok_or_else(|| AppError::not_found(format!("Booking {booking_id} not found")))?;

        let dispute = sqlx::query_as::<_, Dispute>("SELECT * FROM disputes WHERE id = $1 FOR UPDATE")
            .bind(dispute_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to lock dispute", e))?
            .ok_or_else(|| AppError::not_found(format!("Dispute {dispute_id} not found")))?;

        // Dropping `tx` on the error path rolls back and releases both locks.
        resolution.check_against(&dispute, &booking)?;

        let dispute = sqlx::query_as::<_, Dispute>(
            "UPDATE disputes SET status = $2, outcome = $3, refund_amount_cents = $4, \
             resolution_note = $5, resolved_by = $6, resolved_at = $7, updated_at = $7 \
             WHERE id = $1 RETURNING *",
        )
        .bind(dispute_id)
        .bind(resolution.outcome.dispute_status())
        .bind(resolution.outcome)
        .bind(resolution.refund_amount_cents)
        .bind(resolution.note.as_deref())
        .bind(resolution.resolved_by)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to update dispute", e))?;

        let booking = sqlx::query_as::<_, Booking>(
            "UPDATE bookings SET status = $2, updated_at = $3 WHERE id = $1 RETURNING *",
        )
        .bind(booking_id)
        .bind(resolution.outcome.booking_status())
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to update booking", e))?;

        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to commit resolution", e)
        })?;

        Ok(ResolvedDispute { dispute, booking })
    }
}
