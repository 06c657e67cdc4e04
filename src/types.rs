//! Core types for auto-unpack

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Identifier of a host job (e.g. a torrent info-hash)
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Create a new JobId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the inner identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Snapshot of a finished job as reported by the host
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    /// Display name (also the torrent-root subdirectory name)
    pub name: String,
    /// Directory the job's files were downloaded into
    pub download_root: PathBuf,
    /// File paths relative to `download_root`, in host order
    pub files: Vec<PathBuf>,
    /// Completion percentage, 0.0 to 100.0
    pub progress: f32,
}

impl JobStatus {
    /// Whether the host reports the job as fully downloaded
    pub fn is_complete(&self) -> bool {
        self.progress >= 100.0
    }
}

/// One file slated for extraction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveCandidate {
    /// Absolute path to the archive on disk
    pub source_path: PathBuf,
    /// Final destination directory
    pub destination_path: PathBuf,
    /// Normalized, possibly compound extension (e.g. `.tar.gz`)
    pub extension_key: String,
    /// Primary command (program first), archive path appended at run time
    pub primary_command: Vec<String>,
    /// Second stage fed by the primary's stdout, for two-stage formats
    pub secondary_command: Option<Vec<String>>,
}

/// Unit of work for the extraction pool
#[derive(Clone, Debug)]
pub struct ExtractionJob {
    /// Parent job
    pub job_id: JobId,
    /// Position of the candidate within its job (keys the staging subdirectory)
    pub index: usize,
    /// The archive to extract
    pub candidate: ArchiveCandidate,
}

/// Tracked extraction output
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionEntry {
    /// Absolute path of the extracted file or directory
    pub path: PathBuf,
    /// When the output was placed in its final location
    pub extracted_at: DateTime<Utc>,
}

/// Per-job processing state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Not being processed
    Idle,
    /// Deciding which files are archives
    Classifying,
    /// Candidates submitted to the pool
    Extracting,
    /// All tasks resolved, cleaning up staging
    Finalizing,
    /// Finished; host has been notified
    Done,
}

/// Result of one candidate's extraction task
#[derive(Clone, Debug)]
pub struct ExtractionOutcome {
    /// The archive that was processed
    pub archive: PathBuf,
    /// Output paths placed and recorded for retention
    pub placed: Vec<PathBuf>,
    /// Failure description, `None` on success
    pub error: Option<String>,
}

impl ExtractionOutcome {
    /// Whether the candidate extracted without a task-level failure
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Summary of one processed job
#[derive(Clone, Debug, Default)]
pub struct JobReport {
    /// Number of archive candidates found
    pub candidates: usize,
    /// Candidates that extracted successfully
    pub succeeded: usize,
    /// Candidates that failed
    pub failed: usize,
    /// Every output path placed in its final destination
    pub placed: Vec<PathBuf>,
}

/// Event emitted during job processing and retention sweeps
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Processing of a job began
    JobStarted {
        /// Job ID
        id: JobId,
    },

    /// A file was dropped by classification
    ArchiveSkipped {
        /// Job ID
        id: JobId,
        /// Relative path of the skipped file
        file: PathBuf,
        /// Why it was skipped
        reason: String,
    },

    /// An archive extraction started
    Extracting {
        /// Job ID
        id: JobId,
        /// Archive path
        archive: PathBuf,
    },

    /// An archive extraction failed
    ExtractionFailed {
        /// Job ID
        id: JobId,
        /// Archive path
        archive: PathBuf,
        /// Error message
        error: String,
    },

    /// An archive was extracted and placed
    ExtractionComplete {
        /// Job ID
        id: JobId,
        /// Archive path
        archive: PathBuf,
        /// Number of output entries placed
        files: usize,
    },

    /// All extraction activity for a job settled
    JobFinished {
        /// Job ID
        id: JobId,
        /// Candidates extracted successfully
        extracted: usize,
        /// Candidates that failed
        failed: usize,
    },

    /// The retention sweep deleted expired output
    RetentionDeleted {
        /// Deleted path
        path: PathBuf,
    },

    /// Unpacker is shutting down
    Shutdown,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_id_serializes_transparently() {
        let id = JobId::new("abc123");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc123\"");
        assert_eq!(id.to_string(), "abc123");
    }

    #[test]
    fn job_status_completion_requires_full_progress() {
        let mut status = JobStatus {
            name: "job".into(),
            download_root: PathBuf::from("/dl"),
            files: vec![],
            progress: 99.9,
        };
        assert!(!status.is_complete());
        status.progress = 100.0;
        assert!(status.is_complete());
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let event = Event::JobFinished {
            id: JobId::new("j"),
            extracted: 2,
            failed: 1,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "job_finished");
        assert_eq!(json["extracted"], 2);
    }
}
