//! Object store trait for the remote blob store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::result::AppResult;
use crate::types::key::StorageKey;

/// Metadata about one stored object.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ObjectMeta {
    /// Object key.
    pub key: StorageKey,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Last modified timestamp, when the backend reports one.
    pub last_modified: Option<DateTime<Utc>>,
}

/// One page of a cursor-paginated listing.
#[derive(Debug, Clone, Default)]
pub struct ObjectPage {
    /// Objects in this page.
    pub objects: Vec<ObjectMeta>,
    /// Continuation cursor; `None` on the last page.
    pub next_cursor: Option<String>,
}

/// Trait for blob store backends.
///
/// Implementations exist for S3-compatible stores and an in-memory store.
#[async_trait]
pub trait ObjectStore: Send + Sync + std::fmt::Debug + 'static {
    /// Return the provider type name (e.g., "s3", "memory").
    fn provider_type(&self) -> &str;

    /// Bucket this store operates on.
    fn bucket(&self) -> &str;

    /// Check whether the backend is reachable.
    async fn health_check(&self) -> AppResult<bool>;

    /// Fetch one page of keys, starting after `cursor`.
    async fn list_page(
        &self,
        prefix: Option<&str>,
        cursor: Option<&str>,
        page_size: u32,
    ) -> AppResult<ObjectPage>;

    /// Fetch metadata for one key. `Ok(None)` means the object does not exist.
    async fn head(&self, key: &StorageKey) -> AppResult<Option<ObjectMeta>>;

    /// Delete one key. Deleting a missing key is not an error.
    async fn delete(&self, key: &StorageKey) -> AppResult<()>;
}
