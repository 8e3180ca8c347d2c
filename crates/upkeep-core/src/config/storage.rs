//! Object storage configuration.

use serde::{Deserialize, Serialize};

/// Top-level storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage provider: `"s3"`, `"memory"` or `"none"`.
    ///
    /// `"none"` means this deployment has no object storage access and
    /// storage-dependent jobs are skipped.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// S3-compatible storage configuration.
    #[serde(default)]
    pub s3: S3StorageConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            s3: S3StorageConfig::default(),
        }
    }
}

impl StorageConfig {
    /// Whether an object store can be built from this configuration.
    pub fn is_configured(&self) -> bool {
        match self.provider.as_str() {
            "memory" => true,
            "s3" => !self.s3.bucket.trim().is_empty(),
            _ => false,
        }
    }

    /// Bucket name used to strip path-style URL prefixes, if any.
    pub fn bucket_name(&self) -> Option<&str> {
        let bucket = self.s3.bucket.trim();
        (!bucket.is_empty()).then_some(bucket)
    }
}

/// S3-compatible object storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3StorageConfig {
    /// S3 endpoint URL (for non-AWS services like MinIO). Empty uses AWS.
    #[serde(default)]
    pub endpoint: String,
    /// AWS region.
    #[serde(default = "default_region")]
    pub region: String,
    /// Bucket name.
    #[serde(default)]
    pub bucket: String,
    /// Access key ID. Empty falls back to the default credential chain.
    #[serde(default)]
    pub access_key: String,
    /// Secret access key.
    #[serde(default)]
    pub secret_key: String,
    /// Use path-style addressing (`endpoint/bucket/key`).
    #[serde(default)]
    pub force_path_style: bool,
    /// Per-operation timeout in seconds for list/head/delete calls.
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_seconds: u64,
}

impl Default for S3StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            region: default_region(),
            bucket: String::new(),
            access_key: String::new(),
            secret_key: String::new(),
            force_path_style: false,
            operation_timeout_seconds: default_operation_timeout(),
        }
    }
}

fn default_provider() -> String {
    "s3".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_operation_timeout() -> u64 {
    30
}
