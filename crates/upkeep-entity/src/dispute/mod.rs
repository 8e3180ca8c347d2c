//! Dispute entity and resolution value objects.

pub mod model;
pub mod resolution;
pub mod status;

pub use model::Dispute;
pub use resolution::{Resolution, ResolvedDispute};
pub use status::{DisputeOutcome, DisputeStatus};
