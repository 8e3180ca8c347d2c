//! Shared value types.

pub mod key;

pub use key::StorageKey;
