//! S3-compatible object store provider.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::DateTime as AwsDateTime;
use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use upkeep_core::config::S3StorageConfig;
use upkeep_core::error::{AppError, ErrorKind};
use upkeep_core::result::AppResult;
use upkeep_core::traits::storage::{ObjectMeta, ObjectPage, ObjectStore};
use upkeep_core::types::key::StorageKey;

/// Object store backed by an S3-compatible bucket (AWS S3, MinIO, R2).
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Build a client from `[storage.s3]` settings.
    ///
    /// Explicit keys take precedence over the ambient AWS credential chain.
    /// Every request carries the configured operation timeout.
    pub async fn connect(config: &S3StorageConfig) -> AppResult<Self> {
        if config.bucket.is_empty() {
            return Err(AppError::configuration("storage.s3.bucket is empty"));
        }
        if config.access_key.is_empty() != config.secret_key.is_empty() {
            return Err(AppError::configuration(
                "storage.s3 requires both access_key and secret_key when either is set",
            ));
        }

        info!(
            endpoint = %config.endpoint,
            region = %config.region,
            bucket = %config.bucket,
            "Initializing S3 object store"
        );

        let timeouts = TimeoutConfig::builder()
            .operation_timeout(Duration::from_secs(config.operation_timeout_seconds))
            .build();

        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .timeout_config(timeouts)
            .load()
            .await;

        let mut builder =
            aws_sdk_s3::config::Builder::from(&shared).force_path_style(config.force_path_style);

        if !config.endpoint.is_empty() {
            builder = builder.endpoint_url(normalize_endpoint(&config.endpoint));
        }
        if !config.access_key.is_empty() {
            builder = builder.credentials_provider(Credentials::new(
                config.access_key.clone(),
                config.secret_key.clone(),
                None,
                None,
                "upkeep-config",
            ));
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
        })
    }
}

/// Accept bare `host:port` endpoints by assuming plain HTTP.
fn normalize_endpoint(endpoint: &str) -> String {
    let lower = endpoint.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("http://{endpoint}")
    }
}

fn to_chrono(dt: &AwsDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(dt.secs(), dt.subsec_nanos())
}

fn sdk_error<E>(message: &str, err: SdkError<E>) -> AppError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let detail = DisplayErrorContext(&err).to_string();
    let kind = match &err {
        SdkError::TimeoutError(_) => ErrorKind::Timeout,
        SdkError::DispatchFailure(_) => ErrorKind::ServiceUnavailable,
        _ => ErrorKind::Storage,
    };
    AppError::with_source(kind, format!("{message}: {detail}"), err)
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn provider_type(&self) -> &str {
        "s3"
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map(|_| true)
            .map_err(|e| sdk_error("S3 bucket check failed", e))
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn list_page(
        &self,
        prefix: Option<&str>,
        cursor: Option<&str>,
        page_size: u32,
    ) -> AppResult<ObjectPage> {
        let mut request = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .max_keys(i32::try_from(page_size).unwrap_or(i32::MAX));
        if let Some(prefix) = prefix {
            request = request.prefix(prefix);
        }
        if let Some(token) = cursor {
            request = request.continuation_token(token);
        }

        let output = request
            .send()
            .await
            .map_err(|e| sdk_error("S3 list failed", e))?;

        let objects = output
            .contents()
            .iter()
            .filter_map(|obj| {
                let key = obj.key()?;
                Some(ObjectMeta {
                    key: StorageKey::new(key),
                    size_bytes: obj.size().and_then(|s| u64::try_from(s).ok()).unwrap_or(0),
                    last_modified: obj.last_modified().and_then(to_chrono),
                })
            })
            .collect();

        let next_cursor = if output.is_truncated() == Some(true) {
            match output.next_continuation_token() {
                Some(token) => Some(token.to_string()),
                None => {
                    return Err(AppError::storage(
                        "S3 reported a truncated listing without a continuation token",
                    ));
                }
            }
        } else {
            None
        };

        Ok(ObjectPage {
            objects,
            next_cursor,
        })
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn head(&self, key: &StorageKey) -> AppResult<Option<ObjectMeta>> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key.as_str())
            .send()
            .await
        {
            Ok(output) => {
                let last_modified = output.last_modified().and_then(to_chrono);
                if last_modified.is_none() {
                    warn!(key = %key, "S3 head returned no usable last-modified timestamp");
                }
                Ok(Some(ObjectMeta {
                    key: key.clone(),
                    size_bytes: output
                        .content_length()
                        .and_then(|s| u64::try_from(s).ok())
                        .unwrap_or(0),
                    last_modified,
                }))
            }
            Err(err) => {
                if err.as_service_error().is_some_and(|e| e.is_not_found()) {
                    return Ok(None);
                }
                Err(sdk_error("S3 head failed", err))
            }
        }
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn delete(&self, key: &StorageKey) -> AppResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key.as_str())
            .send()
            .await
            .map(|_| ())
            .map_err(|e| sdk_error("S3 delete failed", e))
    }
}
