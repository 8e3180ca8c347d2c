//! Source of the keys still referenced by application data.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::result::AppResult;
use crate::types::key::StorageKey;

/// Answers "which storage keys does the data model still point to".
#[async_trait]
pub trait ReferenceSource: Send + Sync + std::fmt::Debug + 'static {
    /// Build the full reference index. Any failure must be returned, never
    /// a partial set.
    async fn collect(&self) -> AppResult<HashSet<StorageKey>>;

    /// Targeted re-check for a single key right before it is deleted.
    ///
    /// May report false positives, never false negatives.
    async fn is_referenced(&self, key: &StorageKey) -> AppResult<bool>;

    /// Batched re-check: the subset of `keys` still referenced.
    ///
    /// The default asks [`ReferenceSource::is_referenced`] once per key.
    /// Sources backed by a database should override it with a bounded
    /// number of queries per call.
    async fn referenced_among(&self, keys: &[StorageKey]) -> AppResult<HashSet<StorageKey>> {
        let mut referenced = HashSet::new();
        for key in keys {
            if self.is_referenced(key).await? {
                referenced.insert(key.clone());
            }
        }
        Ok(referenced)
    }
}
