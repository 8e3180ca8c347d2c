//! Per-job configuration: orphan reconciliation and booking expiry.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// How a watched column stores object URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    /// A single nullable `TEXT` URL.
    #[default]
    Scalar,
    /// A `TEXT[]` array of URLs.
    Array,
}

/// A (table, column) pair known to hold object URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceColumn {
    /// Table name.
    pub table: String,
    /// Column name.
    pub column: String,
    /// Column shape.
    #[serde(default)]
    pub kind: ColumnKind,
}

impl ReferenceColumn {
    /// Create a registry entry.
    pub fn new(table: &str, column: &str, kind: ColumnKind) -> Self {
        Self {
            table: table.to_string(),
            column: column.to_string(),
            kind,
        }
    }

    /// Reject identifiers that are not plain lowercase SQL names.
    ///
    /// Table and column names are interpolated into queries, so only
    /// `[a-z_][a-z0-9_]*` is accepted.
    pub fn validate(&self) -> Result<(), AppError> {
        for ident in [&self.table, &self.column] {
            if !is_plain_identifier(ident) {
                return Err(AppError::configuration(format!(
                    "Invalid reference identifier '{ident}' in {}.{}",
                    self.table, self.column
                )));
            }
        }
        Ok(())
    }
}

fn is_plain_identifier(ident: &str) -> bool {
    let mut chars = ident.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    ident.len() <= 63
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Orphan reconciliation job configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Whether the job is scheduled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Six-field cron expression (seconds first).
    #[serde(default = "default_reconciler_schedule")]
    pub schedule: String,
    /// Minimum object age in days before an orphan may be deleted.
    #[serde(default = "default_grace_period_days")]
    pub grace_period_days: u32,
    /// Listing page size (S3 caps this at 1000).
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Only list keys under this prefix.
    #[serde(default)]
    pub prefix: Option<String>,
    /// Lock lease duration in seconds.
    #[serde(default = "default_reconciler_lease")]
    pub lease_seconds: u64,
    /// Global run timeout in seconds; must be shorter than the lease.
    #[serde(default = "default_reconciler_timeout")]
    pub timeout_seconds: u64,
    /// Columns holding object URLs.
    #[serde(default = "default_references")]
    pub references: Vec<ReferenceColumn>,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            schedule: default_reconciler_schedule(),
            grace_period_days: default_grace_period_days(),
            page_size: default_page_size(),
            prefix: None,
            lease_seconds: default_reconciler_lease(),
            timeout_seconds: default_reconciler_timeout(),
            references: default_references(),
        }
    }
}

/// Pending booking expiry sweep configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingExpiryConfig {
    /// Whether the job is scheduled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Six-field cron expression (seconds first).
    #[serde(default = "default_expiry_schedule")]
    pub schedule: String,
    /// Maximum rows claimed per transaction.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    /// Maximum batches per run.
    #[serde(default = "default_max_batches")]
    pub max_batches_per_run: u32,
    /// Run under the job lock. Row claims stay safe either way.
    #[serde(default = "default_true")]
    pub exclusive: bool,
    /// Lock lease duration in seconds.
    #[serde(default = "default_expiry_lease")]
    pub lease_seconds: u64,
    /// Global run timeout in seconds; must be shorter than the lease.
    #[serde(default = "default_expiry_timeout")]
    pub timeout_seconds: u64,
}

impl Default for BookingExpiryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            schedule: default_expiry_schedule(),
            batch_size: default_batch_size(),
            max_batches_per_run: default_max_batches(),
            exclusive: true,
            lease_seconds: default_expiry_lease(),
            timeout_seconds: default_expiry_timeout(),
        }
    }
}

/// The registry of URL-holding columns in the marketplace schema.
pub fn default_references() -> Vec<ReferenceColumn> {
    vec![
        ReferenceColumn::new("users", "avatar_url", ColumnKind::Scalar),
        ReferenceColumn::new("provider_profiles", "identity_document_url", ColumnKind::Scalar),
        ReferenceColumn::new("provider_profiles", "selfie_url", ColumnKind::Scalar),
        ReferenceColumn::new("provider_profiles", "cv_url", ColumnKind::Scalar),
        ReferenceColumn::new("provider_profiles", "diploma_urls", ColumnKind::Array),
        ReferenceColumn::new("provider_profiles", "photo_urls", ColumnKind::Array),
        ReferenceColumn::new("disputes", "evidence_photo_urls", ColumnKind::Array),
        ReferenceColumn::new("reports", "pdf_url", ColumnKind::Scalar),
    ]
}

fn default_true() -> bool {
    true
}

fn default_reconciler_schedule() -> String {
    // Sundays at 03:00
    "0 0 3 * * 0".to_string()
}

fn default_grace_period_days() -> u32 {
    7
}

fn default_page_size() -> u32 {
    1000
}

fn default_reconciler_lease() -> u64 {
    3600
}

fn default_reconciler_timeout() -> u64 {
    1800
}

fn default_expiry_schedule() -> String {
    "0 */5 * * * *".to_string()
}

fn default_batch_size() -> u32 {
    100
}

fn default_max_batches() -> u32 {
    50
}

fn default_expiry_lease() -> u64 {
    300
}

fn default_expiry_timeout() -> u64 {
    240
}
