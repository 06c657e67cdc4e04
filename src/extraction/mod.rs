//! Archive extraction through external archivers
//!
//! - [`commands`] probes installed archivers and builds the [`CommandTable`]
//! - [`classifier`] picks archive candidates out of a finished job
//! - [`pipeline`] runs one or two chained archiver processes
//! - [`staging`] handles staging directories and the two-step move
//! - [`pool`] bounds how many extractions run at once
//! - [`task`] ties the above together for a single candidate

pub mod classifier;
pub mod commands;
pub mod pipeline;
pub mod pool;
pub mod staging;
pub mod task;


pub use classifier::{ArchiveClassifier, Classification, SkipReason, split_extension};
pub use commands::{CommandResolver, CommandTable};
pub use pipeline::{Pipeline, Stage};
pub use pool::{ExtractionHandle, ExtractionPool};
pub use staging::{StagingManager, remove_path};
pub use task::{TaskContext, run_extraction};
