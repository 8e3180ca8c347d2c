//! Dispute entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::status::{DisputeOutcome, DisputeStatus};

/// A dispute raised against a booking.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Dispute {
    /// Unique dispute identifier.
    pub id: Uuid,
    /// Booking under dispute.
    pub booking_id: Uuid,
    /// Current status.
    pub status: DisputeStatus,
    /// Decision, once closed.
    pub outcome: Option<DisputeOutcome>,
    /// Refunded amount for partial refunds, in cents.
    pub refund_amount_cents: Option<i64>,
    /// Free-text note from the resolver.
    pub resolution_note: Option<String>,
    /// Admin who resolved the dispute.
    pub resolved_by: Option<Uuid>,
    /// When the dispute was closed.
    pub resolved_at: Option<DateTime<Utc>>,
    /// Evidence photo URLs uploaded by the parties.
    pub evidence_photo_urls: Vec<String>,
    /// When the dispute was opened.
    pub created_at: DateTime<Utc>,
    /// When the dispute was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Dispute {
    /// Whether the dispute still awaits a decision.
    pub fn is_open(&self) -> bool {
        self.status == DisputeStatus::Open
    }
}
