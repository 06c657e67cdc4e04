//! Error types for auto-unpack
//!
//! Errors fall into three groups:
//! - Configuration-fatal errors that stop the whole subsystem (no archivers found)
//! - Per-candidate extraction errors, which are logged and never abort a job
//! - Persistence and host errors

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for auto-unpack operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for auto-unpack
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "extract_path")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// Extraction of a single candidate failed
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The host download manager reported an error
    #[error("host error: {0}")]
    Host(String),

    /// Job or path not found
    #[error("not found: {0}")]
    NotFound(String),

    /// The job is already being classified or extracted
    #[error("job {0} is already being processed")]
    JobBusy(String),

    /// Shutdown in progress - not accepting new jobs
    #[error("shutdown in progress: not accepting new jobs")]
    ShuttingDown,
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),
}

/// Errors scoped to one archive candidate
///
/// None of these abort the parent job; the controller logs them and moves on.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The working directory path exists but is not a directory
    #[error("extraction path exists but is not a directory: {path}")]
    WorkDirNotDirectory {
        /// The offending path
        path: PathBuf,
    },

    /// A working or destination directory could not be created
    #[error("failed to create directory {path}: {reason}")]
    CreateDirFailed {
        /// The directory that could not be created
        path: PathBuf,
        /// The underlying reason
        reason: String,
    },

    /// An external archiver process could not be started
    #[error("failed to start {program}: {reason}")]
    Spawn {
        /// Program that failed to start
        program: String,
        /// The underlying reason
        reason: String,
    },

    /// A pipeline stage exited unsuccessfully
    #[error("stage {stage} ({program}) exited with {}: {stderr}", code.map_or_else(|| "signal".to_string(), |c| format!("code {c}")))]
    StageFailed {
        /// Zero-based stage index within the pipeline
        stage: usize,
        /// Program run by the stage
        program: String,
        /// Exit code, `None` when terminated by a signal
        code: Option<i32>,
        /// Trailing standard error output of the stage
        stderr: String,
    },

    /// File move/rename into the final destination failed
    #[error("failed to move {source_path} to {dest_path}: {reason}")]
    MoveFailed {
        /// The source path of the file being moved
        source_path: PathBuf,
        /// The destination path where the file should be moved
        dest_path: PathBuf,
        /// The reason the move failed
        reason: String,
    },

    /// The extraction task panicked or was aborted
    #[error("extraction task for {archive} did not complete: {reason}")]
    TaskPanicked {
        /// The archive the task was processing
        archive: PathBuf,
        /// Join error description
        reason: String,
    },
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}
