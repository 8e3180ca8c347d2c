//! Ports defined in `upkeep-core` and implemented by other crates.

pub mod lock;
pub mod references;
pub mod storage;
pub mod sweep;

pub use lock::{JobLock, LockLease};
pub use references::ReferenceSource;
pub use storage::{ObjectMeta, ObjectPage, ObjectStore};
pub use sweep::{ClaimBatch, ExpirySweepStore, RowFailure};
