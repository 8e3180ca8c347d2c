//! Admin-triggered dispute resolution.

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use upkeep_core::error::ErrorKind;
use upkeep_core::result::AppResult;
use upkeep_database::repositories::DisputeRepository;
use upkeep_entity::dispute::{Resolution, ResolvedDispute};

/// Resolves disputes and moves their bookings in one transaction.
#[derive(Debug, Clone)]
pub struct DisputeResolver {
    repo: DisputeRepository,
}

impl DisputeResolver {
    /// Create a resolver over `repo`.
    pub fn new(repo: DisputeRepository) -> Self {
        Self { repo }
    }

    /// Apply `resolution` to dispute `dispute_id`.
    ///
    /// Fails with a conflict when the dispute is no longer open or the
    /// booking left the disputed state; nothing is written in that case.
    pub async fn resolve(&self, dispute_id: Uuid, resolution: Resolution) -> AppResult<ResolvedDispute> {
        match self.repo.resolve(dispute_id, &resolution, Utc::now()).await {
            Ok(resolved) => {
                info!(
                    dispute_id = %dispute_id,
                    booking_id = %resolved.booking.id,
                    outcome = %resolution.outcome,
                    booking_status = %resolved.booking.status,
                    "Dispute resolved"
                );
                Ok(resolved)
            }
            Err(e) => {
                if matches!(e.kind, ErrorKind::Conflict | ErrorKind::Validation | ErrorKind::NotFound) {
                    warn!(dispute_id = %dispute_id, error = %e, "Dispute resolution rejected");
                } else {
                    warn!(dispute_id = %dispute_id, error = %e, "Dispute resolution failed");
                }
                Err(e)
            }
        }
    }
}
