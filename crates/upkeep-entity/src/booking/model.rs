//! Booking entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::status::BookingStatus;

/// A marketplace booking between a client and a provider.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Booking {
    /// Unique booking identifier.
    pub id: Uuid,
    /// Client who booked.
    pub client_id: Uuid,
    /// Provider who was booked.
    pub provider_id: Uuid,
    /// Current status.
    pub status: BookingStatus,
    /// Amount charged, in cents.
    pub amount_cents: i64,
    /// Deadline for a pending booking to be confirmed.
    pub expires_at: DateTime<Utc>,
    /// When the sweeper expired the booking.
    pub expired_at: Option<DateTime<Utc>>,
    /// Last failed expiry attempt; such rows are claimed after fresh ones.
    pub expiry_failed_at: Option<DateTime<Utc>>,
    /// When the booking was created.
    pub created_at: DateTime<Utc>,
    /// When the booking was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Whether the expiry sweep should claim this booking at `now`.
    pub fn is_due_for_expiry(&self, now: DateTime<Utc>) -> bool {
        self.status == BookingStatus::Pending && self.expires_at <= now
    }
}
