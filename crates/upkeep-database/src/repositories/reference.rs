//! Reference registry queries.

use std::collections::HashSet;

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::PgPool;
use tracing::debug;

use upkeep_core::config::{ColumnKind, ReferenceColumn};
use upkeep_core::error::{AppError, ErrorKind};
use upkeep_core::result::AppResult;
use upkeep_core::traits::references::ReferenceSource;
use upkeep_core::types::key::StorageKey;
use upkeep_storage::key::{KeyExtractor, encode_key};

/// Reads every watched (table, column) pair and reports the storage keys
/// the application data still points to.
///
/// Read-only. No explicit locks are taken; the reference index is a
/// point-in-time snapshot.
#[derive(Debug, Clone)]
pub struct ReferenceCollector {
    pool: PgPool,
    columns: Vec<ReferenceColumn>,
    extractor: KeyExtractor,
}

impl ReferenceCollector {
    /// Create a collector over `columns`. Identifiers are validated here as
    /// well as at config load, since they end up inside SQL text.
    pub fn new(
        pool: PgPool,
        columns: Vec<ReferenceColumn>,
        extractor: KeyExtractor,
    ) -> AppResult<Self> {
        for column in &columns {
            column.validate()?;
        }
        Ok(Self {
            pool,
            columns,
            extractor,
        })
    }

    /// The watched columns.
    pub fn columns(&self) -> &[ReferenceColumn] {
        &self.columns
    }

    async fn collect_column(
        &self,
        column: &ReferenceColumn,
        keys: &mut HashSet<StorageKey>,
    ) -> AppResult<usize> {
        let sql = collect_sql(column);
        let mut rows = sqlx::query_scalar::<_, String>(&sql).fetch(&self.pool);
        let mut values = 0usize;

        while let Some(url) = rows.try_next().await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Database,
                format!("Failed to read references from {}.{}", column.table, column.column),
                e,
            )
        })? {
            values += 1;
            if let Some(key) = self.extractor.extract(Some(&url)) {
                keys.insert(key);
            }
        }
        Ok(values)
    }
}

#[async_trait]
impl ReferenceSource for ReferenceCollector {
    async fn collect(&self) -> AppResult<HashSet<StorageKey>> {
        let mut keys = HashSet::new();
        for column in &self.columns {
            let values = self.collect_column(column, &mut keys).await?;
            debug!(
                table = %column.table,
                column = %column.column,
                values,
                "Collected reference column"
            );
        }
        Ok(keys)
    }

    async fn is_referenced(&self, key: &StorageKey) -> AppResult<bool> {
        let encoded = encode_key(key);
        for column in &self.columns {
            let found: bool = sqlx::query_scalar(&recheck_sql(column))
                .bind(key.as_str())
                .bind(&encoded)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    AppError::with_source(
                        ErrorKind::Database,
                        format!("Failed to re-check {}.{}", column.table, column.column),
                        e,
                    )
                })?;
            if found {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// One scan of each watched column for the whole batch, instead of one
    /// per key. Columns stop being asked about keys already found.
    async fn referenced_among(&self, keys: &[StorageKey]) -> AppResult<HashSet<StorageKey>> {
        let mut referenced = HashSet::new();
        let mut remaining: Vec<&StorageKey> = keys.iter().collect();

        for column in &self.columns {
            if remaining.is_empty() {
                break;
            }
            let raw: Vec<String> = remaining.iter().map(|k| k.as_str().to_string()).collect();
            let encoded: Vec<String> = remaining.iter().map(|k| encode_key(k)).collect();

            let found: Vec<String> = sqlx::query_scalar(&batch_recheck_sql(column))
                .bind(&raw)
                .bind(&encoded)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    AppError::with_source(
                        ErrorKind::Database,
                        format!("Failed to batch re-check {}.{}", column.table, column.column),
                        e,
                    )
                })?;

            referenced.extend(found.into_iter().map(StorageKey::new));
            remaining.retain(|k| !referenced.contains(*k));
        }
        Ok(referenced)
    }
}

/// Query yielding every non-null URL held by `column`.
fn collect_sql(column: &ReferenceColumn) -> String {
    let (table, col) = (&column.table, &column.column);
    match column.kind {
        ColumnKind::Scalar => format!("SELECT {col} FROM {table} WHERE {col} IS NOT NULL"),
        ColumnKind::Array => format!(
            "SELECT v.url FROM {table} CROSS JOIN LATERAL unnest({table}.{col}) AS v(url) \
             WHERE v.url IS NOT NULL"
        ),
    }
}

/// Query answering whether any value of `column` contains `$1` or `$2`.
fn recheck_sql(column: &ReferenceColumn) -> String {
    let (table, col) = (&column.table, &column.column);
    match column.kind {
        ColumnKind::Scalar => format!(
            "SELECT EXISTS (SELECT 1 FROM {table} \
             WHERE position($1 in {col}) > 0 OR position($2 in {col}) > 0)"
        ),
        ColumnKind::Array => format!(
            "SELECT EXISTS (SELECT 1 FROM {table} \
             CROSS JOIN LATERAL unnest({table}.{col}) AS v(url) \
             WHERE position($1 in v.url) > 0 OR position($2 in v.url) > 0)"
        ),
    }
}

/// Query returning which raw keys in `$1` (paired with encoded forms in
/// `$2`) appear inside any value of `column`. The key list is joined
/// against a single pass over the table.
fn batch_recheck_sql(column: &ReferenceColumn) -> String {
    let (table, col) = (&column.table, &column.column);
    let keys = "unnest($1::text[], $2::text[]) AS k(raw, enc)";
    match column.kind {
        ColumnKind::Scalar => format!(
            "SELECT DISTINCT k.raw FROM {table} JOIN {keys} \
             ON position(k.raw in {table}.{col}) > 0 OR position(k.enc in {table}.{col}) > 0"
        ),
        ColumnKind::Array => format!(
            "SELECT DISTINCT k.raw FROM {table} \
             CROSS JOIN LATERAL unnest({table}.{col}) AS v(url) \
             JOIN {keys} ON position(k.raw in v.url) > 0 OR position(k.enc in v.url) > 0"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_sql_shapes() {
        let scalar = ReferenceColumn::new("users", "avatar_url", ColumnKind::Scalar);
        assert_eq!(
            collect_sql(&scalar),
            "SELECT avatar_url FROM users WHERE avatar_url IS NOT NULL"
        );

        let array = ReferenceColumn::new("provider_profiles", "photo_urls", ColumnKind::Array);
        let sql = collect_sql(&array);
        assert!(sql.contains("unnest(provider_profiles.photo_urls)"));
        assert!(sql.contains("v.url IS NOT NULL"));
    }

    #[test]
    fn test_recheck_sql_checks_raw_and_encoded_key() {
        let scalar = ReferenceColumn::new("reports", "pdf_url", ColumnKind::Scalar);
        let sql = recheck_sql(&scalar);
        assert!(sql.contains("position($1 in pdf_url) > 0"));
        assert!(sql.contains("position($2 in pdf_url) > 0"));
    }

    #[test]
    fn test_batch_recheck_sql_joins_key_list() {
        let scalar = ReferenceColumn::new("users", "avatar_url", ColumnKind::Scalar);
        let sql = batch_recheck_sql(&scalar);
        assert!(sql.contains("unnest($1::text[], $2::text[]) AS k(raw, enc)"));
        assert!(sql.contains("position(k.raw in users.avatar_url) > 0"));
        assert!(sql.contains("position(k.enc in users.avatar_url) > 0"));

        let array = ReferenceColumn::new("disputes", "evidence_photo_urls", ColumnKind::Array);
        let sql = batch_recheck_sql(&array);
        assert!(sql.contains("unnest(disputes.evidence_photo_urls) AS v(url)"));
        assert!(sql.contains("position(k.enc in v.url) > 0"));
    }

    #[tokio::test]
    async fn test_new_rejects_injected_identifier() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/upkeep")
            .expect("lazy pool");
        let columns = vec![ReferenceColumn::new(
            "users; DROP TABLE users",
            "avatar_url",
            ColumnKind::Scalar,
        )];
        assert!(ReferenceCollector::new(pool, columns, KeyExtractor::new(None)).is_err());
    }
}
