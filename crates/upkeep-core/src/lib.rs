//! # upkeep-core
//!
//! Core crate for Upkeep, the marketplace background-maintenance service.
//! Contains the ports implemented by the storage, database and worker
//! crates (object store, job lock, reference source, claim sweep),
//! configuration schemas, the storage key type and the unified error system.
//!
//! This crate has **no** internal dependencies on other Upkeep crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
