//! Job processing: classify → extract → finalize → done.

use crate::error::{Error, Result};
use crate::extraction::{
    ArchiveClassifier, ExtractionPool, StagingManager, TaskContext, run_extraction,
};
use crate::types::{Event, ExtractionJob, JobId, JobReport, JobState};
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use super::Unpacker;

/// Marks a job as non-idle for as long as it is held
///
/// Dropping the claim returns the job to `Idle`, also when processing
/// bails out early with an error.
struct JobClaim {
    states: Arc<Mutex<HashMap<JobId, JobState>>>,
    id: JobId,
}

impl JobClaim {
    fn set(&self, state: JobState) {
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        states.insert(self.id.clone(), state);
        tracing::debug!(job_id = %self.id, ?state, "Job state changed");
    }
}

impl Drop for JobClaim {
    fn drop(&mut self) {
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        states.remove(&self.id);
    }
}

impl Unpacker {
    /// Current processing state of a job (`Idle` when not being processed)
    pub fn job_state(&self, id: &JobId) -> JobState {
        let states = self.jobs.states.lock().unwrap_or_else(|e| e.into_inner());
        states.get(id).copied().unwrap_or(JobState::Idle)
    }

    /// Move a job from `Idle` to `Classifying`, or `None` if it is already busy
    fn try_claim(&self, id: &JobId) -> Option<JobClaim> {
        let mut states = self.jobs.states.lock().unwrap_or_else(|e| e.into_inner());
        if states.contains_key(id) {
            return None;
        }
        states.insert(id.clone(), JobState::Classifying);
        Some(JobClaim {
            states: self.jobs.states.clone(),
            id: id.clone(),
        })
    }

    fn ensure_accepting(&self) -> Result<()> {
        if self.jobs.accepting_new.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::ShuttingDown)
        }
    }

    /// Host entry point: a job finished downloading
    ///
    /// Processing runs in the background; this returns immediately. Returns
    /// `false` if the job is already being processed or the unpacker is
    /// shutting down.
    pub fn on_job_finished(&self, id: JobId) -> bool {
        if self.ensure_accepting().is_err() {
            tracing::warn!(job_id = %id, "Ignoring finished job during shutdown");
            return false;
        }

        let Some(claim) = self.try_claim(&id) else {
            tracing::debug!(job_id = %id, "Job already being processed");
            return false;
        };

        self.spawn_job(claim);
        true
    }

    /// Extract a job on demand
    ///
    /// Only jobs the host reports as 100% complete are processed. Returns
    /// `Ok(false)` for unknown, incomplete, or already-busy jobs.
    pub async fn force_extract(&self, id: JobId) -> Result<bool> {
        self.ensure_accepting()?;

        let Some(status) = self.host.job_status(&id).await? else {
            tracing::warn!(job_id = %id, "Force extract requested for unknown job");
            return Ok(false);
        };

        if !status.is_complete() {
            tracing::info!(
                job_id = %id,
                progress = status.progress,
                "Force extract rejected, job is not complete"
            );
            return Ok(false);
        }

        let Some(claim) = self.try_claim(&id) else {
            tracing::info!(job_id = %id, "Force extract rejected, job already being processed");
            return Ok(false);
        };

        tracing::info!(job_id = %id, name = %status.name, "Force extract started");
        self.spawn_job(claim);
        Ok(true)
    }

    /// Process a job and wait for the result
    ///
    /// Fails with [`Error::JobBusy`] when the job is already being processed.
    pub async fn process_job(&self, id: JobId) -> Result<JobReport> {
        self.ensure_accepting()?;
        let claim = self
            .try_claim(&id)
            .ok_or_else(|| Error::JobBusy(id.to_string()))?;
        self.run_job(claim).await
    }

    fn spawn_job(&self, claim: JobClaim) {
        let unpacker = self.clone();
        self.jobs.watchers.spawn(async move {
            let id = claim.id.clone();
            if let Err(e) = unpacker.run_job(claim).await {
                tracing::error!(job_id = %id, error = %e, "Job processing failed");
            }
        });
    }

    async fn run_job(&self, claim: JobClaim) -> Result<JobReport> {
        let id = claim.id.clone();
        self.emit_event(Event::JobStarted { id: id.clone() });

        let status = match self.host.job_status(&id).await {
            Ok(Some(status)) => status,
            Ok(None) => return Err(Error::NotFound(format!("job {}", id))),
            Err(e) => {
                // Still hand the job back so it never stays held
                tracing::error!(job_id = %id, error = %e, "Failed to fetch job status");
                self.finish_job(&claim, &JobReport::default()).await;
                return Err(e);
            }
        };

        tracing::info!(job_id = %id, name = %status.name, files = status.files.len(), "Processing completed job");

        if let Err(e) = self.host.hold_job(&id).await {
            tracing::warn!(job_id = %id, error = %e, "Host could not hold job during extraction");
        }

        let labels = match self.host.job_labels(&id).await {
            Ok(labels) => labels,
            Err(e) => {
                tracing::warn!(job_id = %id, error = %e, "Failed to fetch job labels");
                Vec::new()
            }
        };

        // Snapshot: a config update mid-job applies to the next job
        let settings = self.settings.read().await.clone();
        let classification = ArchiveClassifier::new(&self.commands, &settings).classify(&status, &labels);

        if classification.eligible {
            for (file, reason) in &classification.skipped {
                self.emit_event(Event::ArchiveSkipped {
                    id: id.clone(),
                    file: file.clone(),
                    reason: reason.to_string(),
                });
            }
        }

        let mut report = JobReport {
            candidates: classification.candidates.len(),
            ..Default::default()
        };

        if classification.candidates.is_empty() {
            tracing::info!(job_id = %id, eligible = classification.eligible, "No archives to extract");
            self.finish_job(&claim, &report).await;
            return Ok(report);
        }

        claim.set(JobState::Extracting);
        let ctx = TaskContext {
            staging: StagingManager::new(settings.use_temp_dir.then(|| settings.staging_root())),
            retention: self.retention.clone(),
            event_tx: self.event_tx.clone(),
        };

        let handles: Vec<_> = classification
            .candidates
            .into_iter()
            .enumerate()
            .map(|(index, candidate)| {
                let archive = candidate.source_path.clone();
                let job = ExtractionJob {
                    job_id: id.clone(),
                    index,
                    candidate,
                };
                self.pool.submit(archive, run_extraction(job, ctx.clone()))
            })
            .collect();

        let outcomes = ExtractionPool::await_all(handles).await;

        claim.set(JobState::Finalizing);
        ctx.staging.cleanup_job(&id).await;

        for outcome in outcomes {
            if outcome.succeeded() {
                report.succeeded += 1;
            } else {
                report.failed += 1;
            }
            report.placed.extend(outcome.placed);
        }

        self.finish_job(&claim, &report).await;
        Ok(report)
    }

    /// Enter `Done` and hand the job back to the host
    async fn finish_job(&self, claim: &JobClaim, report: &JobReport) {
        claim.set(JobState::Done);

        if let Err(e) = self.host.mark_finished(&claim.id).await {
            tracing::error!(job_id = %claim.id, error = %e, "Failed to mark job finished");
        }

        tracing::info!(
            job_id = %claim.id,
            candidates = report.candidates,
            extracted = report.succeeded,
            failed = report.failed,
            "Processing complete"
        );

        self.emit_event(Event::JobFinished {
            id: claim.id.clone(),
            extracted: report.succeeded,
            failed: report.failed,
        });
    }
}
