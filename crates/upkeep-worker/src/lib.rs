//! Background maintenance for the marketplace.
//!
//! This crate provides:
//! - Job locks (PostgreSQL lease table, Redis, in-memory) behind one trait
//! - A runner that wraps each job in lock acquisition and a global timeout
//! - The cron scheduler driving the job table and a health registry
//! - Orphan object reconciliation, pending-booking expiry and dispute
//!   resolution

pub mod bootstrap;
pub mod disputes;
pub mod executor;
pub mod health;
pub mod jobs;
pub mod lock;
pub mod runner;
pub mod scheduler;

pub use bootstrap::{WorkerParts, build_worker};
pub use executor::{JobContext, JobExecutionError, JobHandler, JobOutcome, JobTable, ScheduledJob};
pub use health::{JobHealth, JobHealthRegistry, JobState};
pub use runner::{JobRunner, RunOutcome};
pub use scheduler::SchedulerRunner;
