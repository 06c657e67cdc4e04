//! Chained external processes for archive extraction
//!
//! A [`Pipeline`] is an ordered list of [`Stage`]s. Each stage's stdout feeds
//! the next stage's stdin; the first stage reads nothing and the last stage's
//! stdout is discarded. Every stage's exit status is checked on its own, so a
//! failure in either half of a two-stage extraction is reported against the
//! stage that caused it.

use crate::error::ExtractionError;
use crate::types::ArchiveCandidate;
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::{debug, error};

/// Bytes of stderr kept for error reports
const STDERR_TAIL: usize = 512;

/// One external process in a pipeline
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stage {
    /// Program to run
    pub program: String,
    /// Arguments, in order
    pub args: Vec<String>,
    /// Working directory
    pub cwd: PathBuf,
}

impl Stage {
    /// Build a stage from a command list whose first element is the program
    pub fn from_command(command: &[String], cwd: &Path) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
            cwd: cwd.to_path_buf(),
        })
    }

    /// Space-joined command line, for logging
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Ordered chain of stages
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    /// Create a pipeline from explicit stages
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    /// Pipeline extracting `candidate` inside `cwd`
    ///
    /// The archive path is appended to the primary command only; a secondary
    /// command reads the primary's output from stdin.
    pub fn for_candidate(candidate: &ArchiveCandidate, cwd: &Path) -> Result<Self, ExtractionError> {
        let mut primary = Stage::from_command(&candidate.primary_command, cwd).ok_or_else(|| {
            ExtractionError::Spawn {
                program: String::new(),
                reason: format!("empty command for {}", candidate.extension_key),
            }
        })?;
        primary
            .args
            .push(candidate.source_path.to_string_lossy().into_owned());

        let mut stages = vec![primary];
        if let Some(secondary) = &candidate.secondary_command {
            stages.push(Stage::from_command(secondary, cwd).ok_or_else(|| {
                ExtractionError::Spawn {
                    program: String::new(),
                    reason: format!("empty secondary command for {}", candidate.extension_key),
                }
            })?);
        }

        Ok(Self { stages })
    }

    /// The stages, in order
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Run every stage to completion
    ///
    /// Waits for all stages even when one fails early. Returns the failure
    /// of the lowest-indexed stage that did not exit successfully.
    pub async fn run(&self) -> Result<(), ExtractionError> {
        let children = self.spawn_all()?;

        let outputs = join_all(children.into_iter().map(|(index, child)| async move {
            (index, child.wait_with_output().await)
        }))
        .await;

        let mut first_failure = None;
        for (index, output) in outputs {
            let stage = &self.stages[index];
            let failure = match output {
                Ok(output) if output.status.success() => {
                    debug!(stage = index, program = %stage.program, "stage finished");
                    continue;
                }
                Ok(output) => ExtractionError::StageFailed {
                    stage: index,
                    program: stage.program.clone(),
                    code: output.status.code(),
                    stderr: stderr_tail(&output.stderr),
                },
                Err(e) => ExtractionError::Spawn {
                    program: stage.program.clone(),
                    reason: format!("failed waiting for process: {}", e),
                },
            };

            error!(stage = index, program = %stage.program, error = %failure, "pipeline stage failed");
            first_failure.get_or_insert(failure);
        }

        match first_failure {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }

    /// Start every stage, wiring each stdout into the next stdin
    ///
    /// Children already started are killed if a later stage cannot start.
    fn spawn_all(&self) -> Result<Vec<(usize, Child)>, ExtractionError> {
        let last = self.stages.len().saturating_sub(1);
        let mut children = Vec::with_capacity(self.stages.len());
        let mut upstream: Option<Stdio> = None;

        for (index, stage) in self.stages.iter().enumerate() {
            debug!(stage = index, command = %stage.command_line(), cwd = %stage.cwd.display(), "starting stage");

            let spawn_error = |reason: String| ExtractionError::Spawn {
                program: stage.program.clone(),
                reason,
            };

            let mut child = Command::new(&stage.program)
                .args(&stage.args)
                .current_dir(&stage.cwd)
                .stdin(upstream.take().unwrap_or_else(Stdio::null))
                .stdout(if index == last {
                    Stdio::null()
                } else {
                    Stdio::piped()
                })
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| spawn_error(e.to_string()))?;

            if index != last {
                let stdout = child
                    .stdout
                    .take()
                    .ok_or_else(|| spawn_error("stdout was not captured".to_string()))?;
                let stdio: Stdio = stdout
                    .try_into()
                    .map_err(|e: std::io::Error| spawn_error(e.to_string()))?;
                upstream = Some(stdio);
            }

            children.push((index, child));
        }

        Ok(children)
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let start = stderr.len().saturating_sub(STDERR_TAIL);
    String::from_utf8_lossy(&stderr[start..]).trim().to_string()
}
