//! Interface to the download manager that owns the jobs

use crate::Result;
use crate::types::{JobId, JobStatus};
use async_trait::async_trait;

/// The host download manager, as seen by the unpacker
///
/// The host calls [`Unpacker::on_job_finished`](crate::Unpacker::on_job_finished)
/// when a download completes; the unpacker calls back through this trait to
/// read the job and to report when extraction has settled.
#[async_trait]
pub trait JobHost: Send + Sync {
    /// Current status of a job, `None` if the host does not know it
    async fn job_status(&self, id: &JobId) -> Result<Option<JobStatus>>;

    /// Free-text labels attached to a job
    async fn job_labels(&self, id: &JobId) -> Result<Vec<String>>;

    /// Keep the job in a not-finished state while it is being extracted
    async fn hold_job(&self, _id: &JobId) -> Result<()> {
        Ok(())
    }

    /// All extraction activity for the job has settled
    ///
    /// Called exactly once per processed job.
    async fn mark_finished(&self, id: &JobId) -> Result<()>;
}
