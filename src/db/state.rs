//! Runtime state: the persisted settings snapshot.

use crate::config::ExtractSettings;
use crate::error::DatabaseError;
use crate::{Error, Result};

use super::Database;

const SETTINGS_KEY: &str = "settings";

impl Database {
    /// Persist the current settings snapshot
    pub async fn save_settings(&self, settings: &ExtractSettings) -> Result<()> {
        let value = serde_json::to_string(settings)?;
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO runtime_state (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(SETTINGS_KEY)
        .bind(value)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to save settings: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Load the persisted settings snapshot, if one was ever saved
    pub async fn load_settings(&self) -> Result<Option<ExtractSettings>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM runtime_state WHERE key = ?")
                .bind(SETTINGS_KEY)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to load settings: {}",
                        e
                    )))
                })?;

        match value {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}
