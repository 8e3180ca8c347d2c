//! Booking status enumeration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "booking_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Requested, awaiting provider confirmation or payment.
    Pending,
    /// Confirmed by both parties.
    Confirmed,
    /// Service delivered and paid out.
    Completed,
    /// Cancelled by a party.
    Cancelled,
    /// Pending too long; expired by the sweeper.
    Expired,
    /// Under an open dispute.
    Disputed,
    /// Fully refunded to the client.
    Refunded,
    /// Partially refunded after a dispute.
    PartiallyRefunded,
}

impl BookingStatus {
    /// Check if the booking is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed
                | Self::Cancelled
                | Self::Expired
                | Self::Refunded
                | Self::PartiallyRefunded
        )
    }

    /// Return the status as a snake_case string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
            Self::Disputed => "disputed",
            Self::Refunded => "refunded",
            Self::PartiallyRefunded => "partially_refunded",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
