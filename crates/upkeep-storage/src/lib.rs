//! # upkeep-storage
//!
//! Object store providers (S3-compatible and in-memory), the URL to
//! storage-key extractor, and the lazy paginated bucket lister.

pub mod key;
pub mod lister;
pub mod manager;
pub mod providers;

pub use key::KeyExtractor;
pub use lister::{ListingError, StorageLister};
pub use manager::build_object_store;
