//! Retention tracking for extracted output
//!
//! Every placed output path is recorded with its completion time. A periodic
//! sweep ([`sweeper`]) deletes output older than the configured age and
//! forgets entries whose target has already disappeared.

mod sweeper;

pub(crate) use sweeper::spawn_sweeper;

use crate::config::RetentionPolicy;
use crate::db::Database;
use crate::types::RetentionEntry;
use crate::{Error, Result};
use chrono::{DateTime, TimeDelta, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of one sweep
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Paths deleted for exceeding the retention age
    pub deleted: Vec<PathBuf>,
    /// Entries dropped because the path no longer existed
    pub pruned: Vec<PathBuf>,
    /// Entries left in place
    pub retained: usize,
}

/// Persistent record of extracted output
#[derive(Clone)]
pub struct RetentionTracker {
    db: Arc<Database>,
}

impl RetentionTracker {
    /// Create a tracker backed by `db`
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Record `path` as extracted now
    pub async fn record(&self, path: &Path) -> Result<RetentionEntry> {
        self.record_at(path, Utc::now()).await
    }

    /// Record `path` as extracted at `at`
    ///
    /// The path must exist. The entry is persisted before this returns.
    pub async fn record_at(&self, path: &Path, at: DateTime<Utc>) -> Result<RetentionEntry> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(Error::NotFound(format!(
                "cannot track missing path {}",
                path.display()
            )));
        }

        self.db.upsert_retention_entry(path, at).await?;
        debug!(path = %path.display(), "tracking extracted output");

        Ok(RetentionEntry {
            path: path.to_path_buf(),
            extracted_at: at,
        })
    }

    /// Every tracked entry, oldest first
    pub async fn entries(&self) -> Result<Vec<RetentionEntry>> {
        self.db.list_retention_entries().await
    }

    /// Stop tracking `path` without touching the filesystem
    pub async fn forget(&self, path: &Path) -> Result<bool> {
        self.db.delete_retention_entry(path).await
    }

    /// Run one sweep at the current time
    pub async fn sweep(&self, policy: RetentionPolicy) -> Result<SweepReport> {
        self.sweep_at(policy, Utc::now()).await
    }

    /// Run one sweep as if the current time were `now`
    ///
    /// Does nothing when retention is disabled. A path that cannot be deleted
    /// stays tracked and is retried on the next sweep.
    pub async fn sweep_at(&self, policy: RetentionPolicy, now: DateTime<Utc>) -> Result<SweepReport> {
        let mut report = SweepReport::default();
        if !policy.enabled {
            return Ok(report);
        }

        let max_age = TimeDelta::hours(i64::from(policy.max_age_hours.max(1)));

        for entry in self.db.list_retention_entries().await? {
            match tokio::fs::try_exists(&entry.path).await {
                Ok(false) => {
                    debug!(path = %entry.path.display(), "tracked output already gone");
                    self.db.delete_retention_entry(&entry.path).await?;
                    report.pruned.push(entry.path);
                    continue;
                }
                Ok(true) => {}
                Err(e) => {
                    warn!(path = %entry.path.display(), error = %e, "cannot check tracked output");
                    report.retained += 1;
                    continue;
                }
            }

            if now - entry.extracted_at < max_age {
                report.retained += 1;
                continue;
            }

            match crate::extraction::remove_path(&entry.path).await {
                Ok(()) => {
                    info!(path = %entry.path.display(), "deleted expired extracted output");
                    self.db.delete_retention_entry(&entry.path).await?;
                    report.deleted.push(entry.path);
                }
                Err(e) => {
                    warn!(path = %entry.path.display(), error = %e, "failed to delete expired output");
                    report.retained += 1;
                }
            }
        }

        Ok(report)
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
