//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod app;
pub mod database;
pub mod jobs;
pub mod logging;
pub mod storage;
pub mod worker;

use serde::{Deserialize, Serialize};

pub use self::app::ServerConfig;
pub use self::database::DatabaseConfig;
pub use self::jobs::{BookingExpiryConfig, ColumnKind, ReconcilerConfig, ReferenceColumn};
pub use self::logging::LoggingConfig;
pub use self::storage::{S3StorageConfig, StorageConfig};
pub use self::worker::WorkerConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// Top-level deserialization target for the merged TOML configuration
/// (base file + environment overlay + `UPKEEP__` environment variables).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Health server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database connection settings.
    pub database: DatabaseConfig,
    /// Object storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Scheduler and lock settings.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Orphan reconciliation job.
    #[serde(default)]
    pub reconciler: ReconcilerConfig,
    /// Pending booking expiry job.
    #[serde(default)]
    pub booking_expiry: BookingExpiryConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the base file with `config/<env>` (when present) and
    /// environment variables prefixed with `UPKEEP__`, then validates.
    pub fn load(config_path: &str, env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("UPKEEP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde defaults cannot express.
    pub fn validate(&self) -> Result<(), AppError> {
        for column in &self.reconciler.references {
            column.validate()?;
        }

        if self.reconciler.grace_period_days == 0 {
            return Err(AppError::configuration(
                "reconciler.grace_period_days must be at least 1",
            ));
        }
        if self.reconciler.page_size == 0 || self.reconciler.page_size > 1000 {
            return Err(AppError::configuration(
                "reconciler.page_size must be between 1 and 1000",
            ));
        }
        if self.reconciler.timeout_seconds >= self.reconciler.lease_seconds {
            return Err(AppError::configuration(
                "reconciler.timeout_seconds must be shorter than reconciler.lease_seconds",
            ));
        }

        if self.booking_expiry.batch_size == 0 || self.booking_expiry.max_batches_per_run == 0 {
            return Err(AppError::configuration(
                "booking_expiry.batch_size and max_batches_per_run must be positive",
            ));
        }
        if self.booking_expiry.timeout_seconds >= self.booking_expiry.lease_seconds {
            return Err(AppError::configuration(
                "booking_expiry.timeout_seconds must be shorter than booking_expiry.lease_seconds",
            ));
        }

        match self.worker.lock_backend.as_str() {
            "postgres" | "redis" | "memory" => {}
            other => {
                return Err(AppError::configuration(format!(
                    "Unknown worker.lock_backend '{other}'"
                )));
            }
        }

        match self.storage.provider.as_str() {
            "s3" | "memory" | "none" => Ok(()),
            other => Err(AppError::configuration(format!(
                "Unknown storage.provider '{other}'"
            ))),
        }
    }
}
