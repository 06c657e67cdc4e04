//! One extraction task: stage, run the archiver, place, stamp, record

use super::pipeline::Pipeline;
use super::staging::{self, StagingManager};
use crate::error::ExtractionError;
use crate::retention::RetentionTracker;
use crate::types::{Event, ExtractionJob, ExtractionOutcome};
use chrono::{SubsecRound, Utc};
use std::path::PathBuf;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Everything a task needs besides its job
#[derive(Clone)]
pub struct TaskContext {
    /// Staging layout for the settings snapshot the job was classified under
    pub staging: StagingManager,
    /// Where placed output is recorded
    pub retention: RetentionTracker,
    /// Event channel
    pub event_tx: broadcast::Sender<Event>,
}

/// Extract one candidate
///
/// Never fails past this boundary: every error is logged, reported as an
/// event, and carried in the returned outcome.
pub async fn run_extraction(job: ExtractionJob, ctx: TaskContext) -> ExtractionOutcome {
    let archive = job.candidate.source_path.clone();
    ctx.event_tx
        .send(Event::Extracting {
            id: job.job_id.clone(),
            archive: archive.clone(),
        })
        .ok();

    let mut placed = Vec::new();
    let result = extract(&job, &ctx, &mut placed).await;

    match result {
        Ok(()) => {
            info!(
                job_id = %job.job_id,
                archive = %archive.display(),
                files = placed.len(),
                "extraction complete"
            );
            ctx.event_tx
                .send(Event::ExtractionComplete {
                    id: job.job_id.clone(),
                    archive: archive.clone(),
                    files: placed.len(),
                })
                .ok();
            ExtractionOutcome {
                archive,
                placed,
                error: None,
            }
        }
        Err(e) => {
            error!(
                job_id = %job.job_id,
                archive = %archive.display(),
                error = %e,
                "extraction failed"
            );
            ctx.event_tx
                .send(Event::ExtractionFailed {
                    id: job.job_id.clone(),
                    archive: archive.clone(),
                    error: e.to_string(),
                })
                .ok();
            ExtractionOutcome {
                archive,
                placed,
                error: Some(e.to_string()),
            }
        }
    }
}

/// Paths that reach their final location are pushed to `placed` even when a
/// sibling entry fails to move.
async fn extract(
    job: &ExtractionJob,
    ctx: &TaskContext,
    placed: &mut Vec<PathBuf>,
) -> Result<(), ExtractionError> {
    let candidate = &job.candidate;
    let destination = &candidate.destination_path;
    let work_dir = ctx.staging.work_dir(&job.job_id, job.index, destination);

    staging::prepare_dir(&work_dir).await?;
    let before = staging::snapshot(&work_dir).await;

    info!(
        job_id = %job.job_id,
        archive = %candidate.source_path.display(),
        work_dir = %work_dir.display(),
        destination = %destination.display(),
        "extracting archive"
    );
    Pipeline::for_candidate(candidate, &work_dir)?.run().await?;

    let completed_at = Utc::now().trunc_subsecs(0);
    let produced = staging::new_entries(&work_dir, &before).await;

    let mut first_error = None;
    let finals = if ctx.staging.is_staging() {
        staging::prepare_dir(destination).await?;
        let mut finals = Vec::with_capacity(produced.len());
        for entry in produced {
            if let Err(e) = staging::place(&entry, destination, &mut finals).await {
                error!(job_id = %job.job_id, error = %e, "failed to move extracted entry");
                first_error.get_or_insert(e);
            }
        }
        finals
    } else {
        produced
    };

    for path in finals {
        if let Err(e) = staging::stamp(&path, completed_at).await {
            warn!(path = %path.display(), error = %e, "failed to set modification time");
        }
        if let Err(e) = ctx.retention.record_at(&path, completed_at).await {
            error!(path = %path.display(), error = %e, "failed to record extracted output");
        }
        placed.push(path);
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
