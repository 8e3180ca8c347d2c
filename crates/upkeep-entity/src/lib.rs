//! # upkeep-entity
//!
//! Domain entity models touched by the maintenance jobs. Every struct in
//! this crate represents a database table row or a domain value object.
//! Database entities additionally derive `sqlx::FromRow`.

pub mod booking;
pub mod dispute;
pub mod lock;
