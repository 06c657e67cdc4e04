//! # auto-unpack
//!
//! Automatic archive extraction for completed downloads.
//!
//! When the host download manager reports a finished job, the [`Unpacker`]
//! picks out the archives among its files, extracts them through external
//! archivers (`unrar`, `unzip`, `tar`, `7zr`, or 7-Zip on Windows) on a
//! bounded worker pool, optionally via a staging directory, and tells the host
//! once everything has settled. Every extracted file is tracked so a periodic
//! sweep can delete output older than a configured age.
//!
//! ## Quick Start
//!
//! ```no_run
//! use auto_unpack::{Config, JobHost, JobId, JobStatus, Unpacker};
//! use async_trait::async_trait;
//! use std::sync::Arc;
//!
//! struct MyHost;
//!
//! #[async_trait]
//! impl JobHost for MyHost {
//!     async fn job_status(&self, _id: &JobId) -> auto_unpack::Result<Option<JobStatus>> {
//!         Ok(None)
//!     }
//!     async fn job_labels(&self, _id: &JobId) -> auto_unpack::Result<Vec<String>> {
//!         Ok(vec![])
//!     }
//!     async fn mark_finished(&self, _id: &JobId) -> auto_unpack::Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let unpacker = Unpacker::new(Config::default(), Arc::new(MyHost)).await?;
//!
//!     let mut events = unpacker.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     // Called by the host whenever a download completes
//!     unpacker.on_job_finished(JobId::new("0123abcd"));
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Error types
pub mod error;
/// Archive classification and extraction
pub mod extraction;
/// Host download manager interface
pub mod host;
/// Retention tracking and sweeping
pub mod retention;
/// Core types and events
pub mod types;
/// Job controller
pub mod unpacker;

// Re-export commonly used types
pub use config::{
    Config, ConfigUpdate, ExtractSettings, PersistenceConfig, PlacementMode, RetentionPolicy,
    ToolsConfig,
};
pub use db::Database;
pub use error::{DatabaseError, Error, ExtractionError, Result};
pub use extraction::{ArchiveClassifier, CommandResolver, CommandTable, ExtractionPool};
pub use host::JobHost;
pub use retention::{RetentionTracker, SweepReport};
pub use types::{
    ArchiveCandidate, Event, ExtractionJob, ExtractionOutcome, JobId, JobReport, JobState,
    JobStatus, RetentionEntry,
};
pub use unpacker::Unpacker;

/// Helper function to run the unpacker with graceful signal handling.
///
/// Waits for a termination signal and then calls the unpacker's `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn run_with_shutdown(unpacker: Unpacker) -> Result<()> {
    wait_for_signal().await;
    unpacker.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration may fail in restricted environments (containers, tests)
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("Received SIGINT signal (Ctrl+C)");
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("Received SIGTERM signal");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C signal"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C signal"),
    }
}
