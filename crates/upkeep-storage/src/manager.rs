//! Object store construction from configuration.

use std::sync::Arc;

use tracing::info;

use upkeep_core::config::StorageConfig;
use upkeep_core::result::AppResult;
use upkeep_core::traits::storage::ObjectStore;

use crate::providers::MemoryObjectStore;

/// Build the configured object store.
///
/// Returns `Ok(None)` when storage is not configured (provider `none`, or
/// `s3` without a bucket). Callers treat that as "skip", never as an empty
/// bucket.
pub async fn build_object_store(config: &StorageConfig) -> AppResult<Option<Arc<dyn ObjectStore>>> {
    if !config.is_configured() {
        info!(provider = %config.provider, "Object storage not configured");
        return Ok(None);
    }

    let store: Arc<dyn ObjectStore> = match config.provider.as_str() {
        "memory" => Arc::new(MemoryObjectStore::new("memory")),
        #[cfg(feature = "s3")]
        "s3" => Arc::new(crate::providers::S3ObjectStore::connect(&config.s3).await?),
        other => {
            return Err(upkeep_core::AppError::configuration(format!(
                "Storage provider '{other}' is not available in this build"
            )));
        }
    };

    info!(
        provider = store.provider_type(),
        bucket = store.bucket(),
        "Object store ready"
    );
    Ok(Some(store))
}
