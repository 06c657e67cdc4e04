//! Database layer for auto-unpack
//!
//! Handles SQLite persistence for retention tracking and runtime settings.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] - Database lifecycle, schema migrations
//! - [`retention`] - Tracked extraction output with timestamps
//! - [`state`] - Runtime state (persisted settings snapshot)

use sqlx::{FromRow, sqlite::SqlitePool};

mod migrations;
mod retention;
mod state;

/// Retention record from database (raw from SQLite)
#[derive(Debug, Clone, FromRow)]
pub struct RetentionRow {
    /// Absolute path of the tracked output
    pub path: String,
    /// Unix timestamp when the output was placed
    pub extracted_at: i64,
}

impl From<RetentionRow> for crate::types::RetentionEntry {
    fn from(row: RetentionRow) -> Self {
        use chrono::{TimeZone, Utc};

        crate::types::RetentionEntry {
            path: std::path::PathBuf::from(row.path),
            extracted_at: Utc
                .timestamp_opt(row.extracted_at, 0)
                .single()
                .unwrap_or_else(Utc::now),
        }
    }
}

/// Database handle for auto-unpack
pub struct Database {
    pool: SqlitePool,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
