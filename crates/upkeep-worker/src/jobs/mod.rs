//! Scheduled job bodies.

pub mod booking_expiry;
pub mod orphan;

pub use booking_expiry::{BookingExpiryJob, SweepSummary};
pub use orphan::{OrphanReconciler, ReconcileError, ReconcileOutcome, ReconcileSummary};

/// Lock and health name of the orphan reconciliation job.
pub const ORPHAN_RECONCILIATION: &str = "orphan_reconciliation";

/// Lock and health name of the pending booking expiry job.
pub const BOOKING_EXPIRY: &str = "booking_expiry";
