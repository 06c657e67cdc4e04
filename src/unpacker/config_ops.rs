//! Runtime configuration updates (placement, staging, pool size, retention).

use crate::config::{ConfigUpdate, ExtractSettings};
use crate::error::Result;

use super::Unpacker;

impl Unpacker {
    /// Snapshot of the current extraction settings
    pub async fn settings(&self) -> ExtractSettings {
        self.settings.read().await.clone()
    }

    /// Update runtime-changeable settings
    ///
    /// The new settings are persisted before this returns and restored on the
    /// next startup. A new `max_extract_threads` resizes the worker pool for
    /// subsequent submissions; retention changes reconfigure the sweep.
    /// Jobs already being processed keep the settings they started with.
    pub async fn update_config(&self, update: ConfigUpdate) -> Result<ExtractSettings> {
        let mut settings = self.settings.write().await;
        let mut updated = settings.clone();
        update.apply_to(&mut updated);

        self.db.save_settings(&updated).await?;
        *settings = updated.clone();
        drop(settings);

        if updated.worker_count() != self.pool.size() {
            self.pool.resize(updated.worker_count());
        }

        let policy = updated.retention_policy();
        self.sweep.policy_tx.send_if_modified(|current| {
            if *current == policy {
                false
            } else {
                *current = policy;
                true
            }
        });

        tracing::info!(
            placement = ?updated.placement(),
            workers = updated.worker_count(),
            auto_cleanup = updated.auto_cleanup,
            cleanup_hours = updated.cleanup_hours(),
            "Extraction settings updated"
        );

        Ok(updated)
    }
}
