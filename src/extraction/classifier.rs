//! Archive candidate selection for a finished job

use super::commands::CommandTable;
use crate::config::{ExtractSettings, PlacementMode};
use crate::types::{ArchiveCandidate, JobStatus};
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

/// `part<digits>` at the end of a rar stem
#[allow(clippy::expect_used)]
static RAR_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)part(\d+)$").expect("valid rar volume regex"));

/// Why a file produced no candidate
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// Extension has no command in the active table
    Unsupported,
    /// `.r00` whose `.rar` sibling is extracted instead
    SupersededByRar,
    /// Non-first volume of a `partN.rar` set
    LaterVolume,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Unsupported => f.write_str("unsupported extension"),
            SkipReason::SupersededByRar => f.write_str("matching .rar exists"),
            SkipReason::LaterVolume => f.write_str("not the first volume"),
        }
    }
}

/// Result of classifying one job
#[derive(Clone, Debug, Default)]
pub struct Classification {
    /// Whether the job passed the label filter
    pub eligible: bool,
    /// Label that matched the filter, if a filter is configured
    pub matched_label: Option<String>,
    /// Candidates in host file order
    pub candidates: Vec<ArchiveCandidate>,
    /// Files dropped, with the relative path and reason
    pub skipped: Vec<(PathBuf, SkipReason)>,
}

/// Splits a path's extension into a lowercase key and the stem without it
///
/// `.tar.*` compounds are kept together: `a.tar.gz` yields `(".tar.gz", "a")`.
pub fn split_extension(path: &Path) -> Option<(String, String)> {
    let name = path.file_name()?.to_str()?;
    let (root, ext) = split_last(name)?;

    if let Some((inner_root, inner_ext)) = split_last(root)
        && inner_ext.eq_ignore_ascii_case(".tar")
    {
        let key = format!(".tar{}", ext).to_ascii_lowercase();
        return Some((key, inner_root.to_string()));
    }

    Some((ext.to_ascii_lowercase(), root.to_string()))
}

/// Split off the final `.ext`; leading-dot names have no extension
fn split_last(name: &str) -> Option<(&str, &str)> {
    let idx = name.rfind('.')?;
    if idx == 0 || idx == name.len() - 1 {
        return None;
    }
    Some((&name[..idx], &name[idx..]))
}

/// Volume number of a `*.partN` rar stem
fn rar_volume(stem: &str) -> Option<u64> {
    RAR_PART.captures(stem)?.get(1)?.as_str().parse().ok()
}

/// Decides which files of a job are archives and where each extracts to
pub struct ArchiveClassifier<'a> {
    table: &'a CommandTable,
    settings: &'a ExtractSettings,
}

impl<'a> ArchiveClassifier<'a> {
    /// Classify against a command table and a settings snapshot
    pub fn new(table: &'a CommandTable, settings: &'a ExtractSettings) -> Self {
        Self { table, settings }
    }

    /// Label the job matches, or `Ok(None)` when no filter is configured
    ///
    /// `Err(())` means a filter is configured and no label matched.
    fn match_label(&self, labels: &[String]) -> Result<Option<String>, ()> {
        let filters = self.settings.label_filters();
        if filters.is_empty() {
            return Ok(None);
        }

        labels
            .iter()
            .map(|label| label.chars().filter(|c| !c.is_whitespace()).collect::<String>())
            .find(|label| filters.contains(label))
            .map(Some)
            .ok_or(())
    }

    /// Destination base for the job; in-place is resolved per file later
    fn base_destination(&self, job: &JobStatus, matched_label: Option<&str>) -> PathBuf {
        match self.settings.placement() {
            PlacementMode::InPlace => job.download_root.clone(),
            PlacementMode::TorrentRoot => job.download_root.join(&job.name),
            PlacementMode::SelectedFolder => {
                let mut dest = if self.settings.extract_path.as_os_str().is_empty() {
                    job.download_root.clone()
                } else {
                    self.settings.extract_path.clone()
                };
                if self.settings.append_matched_label
                    && let Some(label) = matched_label
                {
                    dest.push(label);
                }
                dest
            }
        }
    }

    /// Classify a finished job's files
    pub fn classify(&self, job: &JobStatus, labels: &[String]) -> Classification {
        let matched_label = match self.match_label(labels) {
            Ok(label) => label,
            Err(()) => {
                debug!(job = %job.name, ?labels, "no label matched the filter, skipping job");
                return Classification::default();
            }
        };

        let base = self.base_destination(job, matched_label.as_deref());
        let in_place = self.settings.placement() == PlacementMode::InPlace;

        let lowercase_paths: HashSet<String> = job
            .files
            .iter()
            .map(|f| f.to_string_lossy().to_lowercase())
            .collect();

        let mut result = Classification {
            eligible: true,
            matched_label,
            ..Default::default()
        };

        for file in &job.files {
            match self.candidate_for(job, file, &base, in_place, &lowercase_paths) {
                Ok(candidate) => {
                    debug!(
                        file = %file.display(),
                        destination = %candidate.destination_path.display(),
                        "archive candidate"
                    );
                    result.candidates.push(candidate);
                }
                Err(reason) => {
                    debug!(file = %file.display(), %reason, "skipping file");
                    result.skipped.push((file.clone(), reason));
                }
            }
        }

        result
    }

    fn candidate_for(
        &self,
        job: &JobStatus,
        file: &Path,
        base: &Path,
        in_place: bool,
        lowercase_paths: &HashSet<String>,
    ) -> Result<ArchiveCandidate, SkipReason> {
        let (key, stem) = split_extension(file).ok_or(SkipReason::Unsupported)?;
        let primary = self.table.primary(&key).ok_or(SkipReason::Unsupported)?;

        if key == ".r00" {
            let sibling = file.with_file_name(format!("{stem}.rar"));
            if lowercase_paths.contains(&sibling.to_string_lossy().to_lowercase()) {
                return Err(SkipReason::SupersededByRar);
            }
        }

        if key == ".rar"
            && let Some(volume) = rar_volume(&stem)
            && volume != 1
        {
            return Err(SkipReason::LaterVolume);
        }

        let mut destination = if in_place {
            match file.parent() {
                Some(parent) => job.download_root.join(parent),
                None => job.download_root.clone(),
            }
        } else {
            base.to_path_buf()
        };

        if self.settings.append_archive_name {
            destination.push(&stem);
        }

        Ok(ArchiveCandidate {
            source_path: job.download_root.join(file),
            destination_path: destination,
            extension_key: key.clone(),
            primary_command: primary.to_vec(),
            secondary_command: self.table.secondary(&key).map(<[String]>::to_vec),
        })
    }
}
