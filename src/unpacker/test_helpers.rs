//! Shared test helpers: an in-memory host and shell stand-ins for archivers.

use crate::Result;
use crate::config::{Config, ExtractSettings};
use crate::extraction::CommandTable;
use crate::host::JobHost;
use crate::types::{JobId, JobStatus};
use crate::unpacker::Unpacker;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::{TempDir, tempdir};

/// Host double recording every callback
#[derive(Default)]
pub(crate) struct FakeHost {
    jobs: Mutex<HashMap<JobId, JobStatus>>,
    labels: Mutex<HashMap<JobId, Vec<String>>>,
    held: Mutex<Vec<JobId>>,
    finished: Mutex<Vec<JobId>>,
    unreachable: Mutex<Vec<JobId>>,
}

impl FakeHost {
    pub(crate) fn add_job(&self, id: &str, status: JobStatus) {
        self.jobs.lock().unwrap().insert(JobId::new(id), status);
    }

    pub(crate) fn set_labels(&self, id: &str, labels: &[&str]) {
        self.labels.lock().unwrap().insert(
            JobId::new(id),
            labels.iter().map(|l| l.to_string()).collect(),
        );
    }

    /// Make status lookups for `id` fail
    pub(crate) fn fail_status(&self, id: &str) {
        self.unreachable.lock().unwrap().push(JobId::new(id));
    }

    pub(crate) fn finished(&self) -> Vec<JobId> {
        self.finished.lock().unwrap().clone()
    }

    pub(crate) fn held(&self) -> Vec<JobId> {
        self.held.lock().unwrap().clone()
    }

    /// Wait until `id` has been marked finished `count` times
    pub(crate) async fn wait_finished(&self, id: &str, count: usize) {
        let id = JobId::new(id);
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let seen = self.finished().iter().filter(|f| **f == id).count();
                if seen >= count {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("job was not marked finished in time");
    }
}

#[async_trait]
impl JobHost for FakeHost {
    async fn job_status(&self, id: &JobId) -> Result<Option<JobStatus>> {
        if self.unreachable.lock().unwrap().contains(id) {
            return Err(crate::Error::Host(format!("status unavailable for {}", id)));
        }
        Ok(self.jobs.lock().unwrap().get(id).cloned())
    }

    async fn job_labels(&self, id: &JobId) -> Result<Vec<String>> {
        Ok(self.labels.lock().unwrap().get(id).cloned().unwrap_or_default())
    }

    async fn hold_job(&self, id: &JobId) -> Result<()> {
        self.held.lock().unwrap().push(id.clone());
        Ok(())
    }

    async fn mark_finished(&self, id: &JobId) -> Result<()> {
        self.finished.lock().unwrap().push(id.clone());
        Ok(())
    }
}

fn sh(script: &str) -> Vec<String> {
    vec!["sh".into(), "-c".into(), script.into(), "sh".into()]
}

/// Archiver stand-ins driven by `sh`
///
/// - `.zip` copies the archive to `<stem>.txt`
/// - `.7z` does the same after a short delay
/// - `.rar` fails with exit code 1
pub(crate) fn fake_commands() -> CommandTable {
    let mut table = CommandTable::default();
    table.insert(".zip", sh(r#"n=$(basename "$1"); cp "$1" "${n%.*}.txt""#));
    table.insert(
        ".7z",
        sh(r#"sleep 0.3; n=$(basename "$1"); cp "$1" "${n%.*}.txt""#),
    );
    table.insert(".rar", sh("echo 'CRC failed' >&2; exit 1"));
    table
}

/// A job whose files exist on disk with their names as content
pub(crate) fn job_on_disk(root: &Path, name: &str, files: &[&str]) -> JobStatus {
    for file in files {
        let path = root.join(file);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, file.as_bytes()).unwrap();
    }
    JobStatus {
        name: name.to_string(),
        download_root: root.to_path_buf(),
        files: files.iter().map(PathBuf::from).collect(),
        progress: 100.0,
    }
}

/// Create an Unpacker over a temp directory with fake archivers
///
/// Returns the unpacker, its host, and the tempdir (which must be kept alive).
/// The tempdir holds `downloads/`, `out/`, `staging/` and the database.
pub(crate) async fn create_test_unpacker(
    settings: ExtractSettings,
) -> (Unpacker, Arc<FakeHost>, TempDir) {
    let temp_dir = tempdir().unwrap();
    for sub in ["downloads", "out", "staging"] {
        std::fs::create_dir_all(temp_dir.path().join(sub)).unwrap();
    }

    let mut config = Config {
        settings,
        ..Default::default()
    };
    config.persistence.database_path = temp_dir.path().join("test.db");

    let host = Arc::new(FakeHost::default());
    let unpacker = Unpacker::with_commands(config, host.clone(), fake_commands())
        .await
        .unwrap();

    (unpacker, host, temp_dir)
}
