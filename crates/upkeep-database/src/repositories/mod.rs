//! Repository implementations backing the maintenance jobs.

pub mod booking;
pub mod dispute;
pub mod job_lock;
pub mod reference;

pub use booking::BookingRepository;
pub use dispute::DisputeRepository;
pub use job_lock::PgJobLock;
pub use reference::ReferenceCollector;
