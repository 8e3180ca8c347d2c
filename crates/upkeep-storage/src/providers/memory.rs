//! In-memory object store for single-node runs and tests.

use std::collections::BTreeMap;
use std::ops::Bound;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use upkeep_core::result::AppResult;
use upkeep_core::traits::storage::{ObjectMeta, ObjectPage, ObjectStore};
use upkeep_core::types::key::StorageKey;

/// Object store kept in a sorted map. The listing cursor is the last key
/// of the previous page.
#[derive(Debug)]
pub struct MemoryObjectStore {
    bucket: String,
    objects: RwLock<BTreeMap<StorageKey, ObjectMeta>>,
}

impl MemoryObjectStore {
    /// Create an empty store.
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    /// Insert or replace an object.
    pub async fn put(&self, key: &str, last_modified: DateTime<Utc>, size_bytes: u64) {
        let key = StorageKey::new(key);
        let meta = ObjectMeta {
            key: key.clone(),
            size_bytes,
            last_modified: Some(last_modified),
        };
        self.objects.write().await.insert(key, meta);
    }

    /// Whether `key` is stored.
    pub async fn contains(&self, key: &str) -> bool {
        self.objects.read().await.contains_key(key)
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    fn provider_type(&self) -> &str {
        "memory"
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }

    async fn list_page(
        &self,
        prefix: Option<&str>,
        cursor: Option<&str>,
        page_size: u32,
    ) -> AppResult<ObjectPage> {
        let objects = self.objects.read().await;
        let start = match cursor {
            Some(after) => Bound::Excluded(after),
            None => Bound::Unbounded,
        };

        let mut matching = objects
            .range::<str, _>((start, Bound::Unbounded))
            .map(|(_, meta)| meta)
            .filter(|meta| prefix.is_none_or(|p| meta.key.as_str().starts_with(p)));

        let page: Vec<ObjectMeta> = matching.by_ref().take(page_size as usize).cloned().collect();
        let more = matching.next().is_some();
        let next_cursor = if more {
            page.last().map(|meta| meta.key.as_str().to_string())
        } else {
            None
        };

        Ok(ObjectPage {
            objects: page,
            next_cursor,
        })
    }

    async fn head(&self, key: &StorageKey) -> AppResult<Option<ObjectMeta>> {
        Ok(self.objects.read().await.get(key).cloned())
    }

    async fn delete(&self, key: &StorageKey) -> AppResult<()> {
        self.objects.write().await.remove(key);
        Ok(())
    }
}
