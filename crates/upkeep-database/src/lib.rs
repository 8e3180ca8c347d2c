//! # upkeep-database
//!
//! PostgreSQL connection management and the concrete repositories the
//! maintenance jobs run against: lease table, reference registry, booking
//! expiry claims and dispute resolution.

pub mod connection;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
