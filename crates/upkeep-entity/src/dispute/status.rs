//! Dispute status and outcome enumerations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::booking::BookingStatus;

/// Lifecycle status of a dispute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "dispute_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    /// Awaiting an admin decision.
    Open,
    /// Closed with a refund or payout decision.
    Resolved,
    /// Closed without merit.
    Rejected,
}

impl fmt::Display for DisputeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Resolved => write!(f, "resolved"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// Decision taken when a dispute is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "dispute_outcome", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DisputeOutcome {
    /// Refund the full amount to the client.
    RefundClient,
    /// Pay the provider in full.
    ReleaseToProvider,
    /// Refund part of the amount to the client.
    PartialRefund,
    /// Dispute has no merit; the provider is paid.
    Dismissed,
}

impl DisputeOutcome {
    /// Status the dispute moves to.
    pub fn dispute_status(&self) -> DisputeStatus {
        match self {
            Self::Dismissed => DisputeStatus::Rejected,
            _ => DisputeStatus::Resolved,
        }
    }

    /// Status the disputed booking moves to.
    pub fn booking_status(&self) -> BookingStatus {
        match self {
            Self::RefundClient => BookingStatus::Refunded,
            Self::ReleaseToProvider | Self::Dismissed => BookingStatus::Completed,
            Self::PartialRefund => BookingStatus::PartiallyRefunded,
        }
    }

    /// Return the outcome as a snake_case string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RefundClient => "refund_client",
            Self::ReleaseToProvider => "release_to_provider",
            Self::PartialRefund => "partial_refund",
            Self::Dismissed => "dismissed",
        }
    }
}

impl fmt::Display for DisputeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DisputeOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "refund_client" => Ok(Self::RefundClient),
            "release_to_provider" => Ok(Self::ReleaseToProvider),
            "partial_refund" => Ok(Self::PartialRefund),
            "dismissed" => Ok(Self::Dismissed),
            other => Err(format!("Unknown dispute outcome: {other}")),
        }
    }
}
