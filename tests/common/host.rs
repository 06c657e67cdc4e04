//! In-memory host download manager

use async_trait::async_trait;
use auto_unpack::{JobHost, JobId, JobStatus, Result};
use std::collections::HashMap;
use std::sync::Mutex;

/// Host double that records every `mark_finished` call
#[derive(Default)]
pub struct FakeHost {
    jobs: Mutex<HashMap<JobId, JobStatus>>,
    labels: Mutex<HashMap<JobId, Vec<String>>>,
    finished: Mutex<Vec<JobId>>,
}

impl FakeHost {
    /// Register a job
    pub fn add_job(&self, id: &str, status: JobStatus) {
        self.jobs.lock().unwrap().insert(JobId::new(id), status);
    }

    /// Attach labels to a job
    pub fn set_labels(&self, id: &str, labels: &[&str]) {
        self.labels.lock().unwrap().insert(
            JobId::new(id),
            labels.iter().map(|l| l.to_string()).collect(),
        );
    }

    /// Jobs marked finished, in call order
    pub fn finished(&self) -> Vec<JobId> {
        self.finished.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobHost for FakeHost {
    async fn job_status(&self, id: &JobId) -> Result<Option<JobStatus>> {
        Ok(self.jobs.lock().unwrap().get(id).cloned())
    }

    async fn job_labels(&self, id: &JobId) -> Result<Vec<String>> {
        Ok(self.labels.lock().unwrap().get(id).cloned().unwrap_or_default())
    }

    async fn mark_finished(&self, id: &JobId) -> Result<()> {
        self.finished.lock().unwrap().push(id.clone());
        Ok(())
    }
}
