//! Dispute resolution request and result.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use upkeep_core::error::AppError;

use super::model::Dispute;
use super::status::DisputeOutcome;
use crate::booking::{Booking, BookingStatus};

/// Admin decision applied to an open dispute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    /// Decision taken.
    pub outcome: DisputeOutcome,
    /// Refund amount; required for partial refunds, forbidden otherwise.
    pub refund_amount_cents: Option<i64>,
    /// Optional note stored on the dispute.
    pub note: Option<String>,
    /// Admin applying the decision.
    pub resolved_by: Option<Uuid>,
}

impl Resolution {
    /// Validate the request shape before any row is locked.
    pub fn validate(&self) -> Result<(), AppError> {
        match (self.outcome, self.refund_amount_cents) {
            (DisputeOutcome::PartialRefund, None) => Err(AppError::validation(
                "partial_refund requires refund_amount_cents",
            )),
            (DisputeOutcome::PartialRefund, Some(cents)) if cents <= 0 => Err(
                AppError::validation("refund_amount_cents must be positive"),
            ),
            (DisputeOutcome::PartialRefund, Some(_)) => Ok(()),
            (outcome, Some(_)) => Err(AppError::validation(format!(
                "refund_amount_cents is only valid for partial_refund, not {outcome}"
            ))),
            (_, None) => Ok(()),
        }
    }

    /// Validate against the locked rows.
    ///
    /// The dispute must still be open and point at `booking`, the booking
    /// must still be disputed, and a partial refund must be strictly less
    /// than the booking amount.
    pub fn check_against(&self, dispute: &Dispute, booking: &Booking) -> Result<(), AppError> {
        if !dispute.is_open() {
            return Err(AppError::conflict(format!(
                "Dispute {} is already {}",
                dispute.id, dispute.status
            )));
        }
        if dispute.booking_id != booking.id {
            return Err(AppError::conflict(format!(
                "Dispute {} no longer references booking {}",
                dispute.id, booking.id
            )));
        }
        if booking.status != BookingStatus::Disputed {
            return Err(AppError::conflict(format!(
                "Booking {} is {}, expected disputed",
                booking.id, booking.status
            )));
        }
        if let Some(cents) = self.refund_amount_cents {
            if cents >= booking.amount_cents {
                return Err(AppError::validation(format!(
                    "Partial refund of {cents} must be below the booking amount {}",
                    booking.amount_cents
                )));
            }
        }
        Ok(())
    }
}

/// The dispute and booking after a committed resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedDispute {
    /// Updated dispute row.
    pub dispute: Dispute,
    /// Updated booking row.
    pub booking: Booking,
}
