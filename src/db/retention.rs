//! Retention entry persistence.
//!
//! Every call is a single statement, so each mutation is durable as soon as
//! it returns.

use crate::error::DatabaseError;
use crate::types::RetentionEntry;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::path::Path;

use super::{Database, RetentionRow};

impl Database {
    /// Track an output path, refreshing the timestamp if already tracked
    pub async fn upsert_retention_entry(
        &self,
        path: &Path,
        extracted_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO retention_entries (path, extracted_at)
            VALUES (?, ?)
            ON CONFLICT(path) DO UPDATE SET extracted_at = excluded.extracted_at
            "#,
        )
        .bind(path.to_string_lossy().as_ref())
        .bind(extracted_at.timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to record retention entry: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// All tracked entries, oldest first
    pub async fn list_retention_entries(&self) -> Result<Vec<RetentionEntry>> {
        let rows: Vec<RetentionRow> = sqlx::query_as(
            "SELECT path, extracted_at FROM retention_entries ORDER BY extracted_at ASC, path ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list retention entries: {}",
                e
            )))
        })?;

        Ok(rows.into_iter().map(RetentionEntry::from).collect())
    }

    /// Stop tracking a path
    ///
    /// Returns true if an entry was removed.
    pub async fn delete_retention_entry(&self, path: &Path) -> Result<bool> {
        let result = sqlx::query("DELETE FROM retention_entries WHERE path = ?")
            .bind(path.to_string_lossy().as_ref())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to delete retention entry: {}",
                    e
                )))
            })?;

        Ok(result.rows_affected() > 0)
    }
}
