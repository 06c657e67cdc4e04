//! Staging directories and the two-step move into final destinations
//!
//! With staging enabled, archives extract into `<temp_root>/<job_id>/<index>`.
//! Each new top-level entry is then moved next to its final path under a
//! `.unpacking` suffix (the slow, possibly cross-filesystem step) and renamed
//! into place within the destination directory, so nothing observes a
//! half-written file under its real name.

use crate::error::ExtractionError;
use crate::types::JobId;
use chrono::{DateTime, Utc};
use filetime::FileTime;
use std::collections::HashSet;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Suffix of the sibling path used during the first move step
pub const STAGING_SUFFIX: &str = ".unpacking";

/// Computes working directories and finalizes staged output
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StagingManager {
    root: Option<PathBuf>,
}

impl StagingManager {
    /// Manager that stages under `root`, or extracts in place when `None`
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    /// Whether extraction goes through a staging directory
    pub fn is_staging(&self) -> bool {
        self.root.is_some()
    }

    /// Staging directory holding every candidate of one job
    ///
    /// Always a direct child of the staging root, whatever the job id holds.
    pub fn job_dir(&self, job_id: &JobId) -> Option<PathBuf> {
        self.root
            .as_ref()
            .map(|root| root.join(job_dir_name(job_id.as_str())))
    }

    /// Directory the archiver runs in for one candidate
    pub fn work_dir(&self, job_id: &JobId, index: usize, destination: &Path) -> PathBuf {
        match self.job_dir(job_id) {
            Some(dir) => dir.join(index.to_string()),
            None => destination.to_path_buf(),
        }
    }

    /// Remove a job's staging tree
    ///
    /// Missing directories are fine; other failures are logged.
    pub async fn cleanup_job(&self, job_id: &JobId) {
        let Some(dir) = self.job_dir(job_id) else {
            return;
        };

        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => debug!(job_id = %job_id, path = %dir.display(), "removed staging directory"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(
                job_id = %job_id,
                path = %dir.display(),
                error = %e,
                "could not remove staging directory"
            ),
        }
    }
}

/// Directory name for a job id
///
/// Percent-encodes separators and other unsafe bytes; `""`, `.` and `..`
/// map to names no encoded id can produce.
fn job_dir_name(id: &str) -> String {
    match id {
        "" => "%".to_string(),
        "." => "%2E".to_string(),
        ".." => "%2E%2E".to_string(),
        _ => urlencoding::encode(id).into_owned(),
    }
}

/// Create `dir` if absent
///
/// A path that exists but is not a directory is an error. Losing a creation
/// race to another task is not.
pub async fn prepare_dir(dir: &Path) -> Result<(), ExtractionError> {
    match tokio::fs::metadata(dir).await {
        Ok(meta) if meta.is_dir() => return Ok(()),
        Ok(_) => {
            return Err(ExtractionError::WorkDirNotDirectory {
                path: dir.to_path_buf(),
            });
        }
        Err(_) => {}
    }

    info!(path = %dir.display(), "creating extraction directory");
    match tokio::fs::create_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists && dir.is_dir() => Ok(()),
        Err(e) => Err(ExtractionError::CreateDirFailed {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

/// Names of the entries currently in `dir`
///
/// An unreadable directory yields an empty snapshot.
pub async fn snapshot(dir: &Path) -> HashSet<OsString> {
    let mut names = HashSet::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "failed to list directory");
            return names;
        }
    };

    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                names.insert(entry.file_name());
            }
            Ok(None) => break,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "failed to read directory entry");
                break;
            }
        }
    }

    names
}

/// Top-level entries of `dir` not present in `before`, sorted
pub async fn new_entries(dir: &Path, before: &HashSet<OsString>) -> Vec<PathBuf> {
    let mut added: Vec<PathBuf> = snapshot(dir)
        .await
        .into_iter()
        .filter(|name| !before.contains(name))
        .filter(|name| !name.to_string_lossy().ends_with(STAGING_SUFFIX))
        .map(|name| dir.join(name))
        .collect();
    added.sort();
    added
}

/// `<final_path>.unpacking`
pub fn sibling_path(final_path: &Path) -> PathBuf {
    let mut name = final_path.as_os_str().to_os_string();
    name.push(STAGING_SUFFIX);
    PathBuf::from(name)
}

/// Move one staged entry into `dest_dir` with the two-step protocol
///
/// Every path created or replaced in the destination is pushed to `placed`,
/// also when a later sibling fails. A directory landing on an existing
/// directory is merged entry by entry; the existing directory itself is
/// never reported.
pub async fn place(
    entry: &Path,
    dest_dir: &Path,
    placed: &mut Vec<PathBuf>,
) -> Result<(), ExtractionError> {
    let Some(name) = entry.file_name() else {
        return Err(move_failed(entry, dest_dir, "entry has no file name"));
    };
    let final_path = dest_dir.join(name);

    if entry.is_dir() && final_path.is_dir() {
        return merge_directory(entry, &final_path, placed).await;
    }

    let sibling = sibling_path(&final_path);
    if tokio::fs::symlink_metadata(&sibling).await.is_ok() {
        debug!(path = %sibling.display(), "removing stale staging sibling");
        remove_path(&sibling).await.map_err(|e| move_failed(entry, &sibling, e))?;
    }

    if let Err(e) = move_path(entry, &sibling).await {
        if tokio::fs::symlink_metadata(&sibling).await.is_err() {
            return Err(move_failed(entry, &final_path, e));
        }
        recover_partial_move(entry, &sibling, &final_path, e).await?;
        placed.push(final_path);
        return Ok(());
    }

    tokio::fs::rename(&sibling, &final_path)
        .await
        .map_err(|e| move_failed(&sibling, &final_path, e))?;

    debug!(source = %entry.display(), dest = %final_path.display(), "placed extracted entry");
    placed.push(final_path);
    Ok(())
}

/// Second chance after a move into `sibling` failed part way
///
/// Renames whatever reached the sibling straight to `final_path`, once.
pub(crate) async fn recover_partial_move(
    entry: &Path,
    sibling: &Path,
    final_path: &Path,
    error: std::io::Error,
) -> Result<(), ExtractionError> {
    warn!(
        source = %entry.display(),
        sibling = %sibling.display(),
        error = %error,
        "move left a partial copy, attempting direct rename"
    );
    tokio::fs::rename(sibling, final_path).await.map_err(|retry| {
        move_failed(
            entry,
            final_path,
            format!("{}; recovery rename failed: {}", error, retry),
        )
    })
}

/// Move every child of `source` into the existing directory `target`
///
/// Boxed because directory merging recurses through [`place`].
fn merge_directory<'a>(
    source: &'a Path,
    target: &'a Path,
    placed: &'a mut Vec<PathBuf>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), ExtractionError>> + Send + 'a>>
{
    Box::pin(async move {
        let mut children: Vec<PathBuf> = snapshot(source)
            .await
            .into_iter()
            .map(|name| source.join(name))
            .collect();
        children.sort();

        let mut first_error = None;
        for child in children {
            if let Err(e) = place(&child, target, placed).await {
                warn!(error = %e, "failed to merge entry");
                first_error.get_or_insert(e);
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        if let Err(e) = tokio::fs::remove_dir(source).await {
            debug!(path = %source.display(), error = %e, "staged directory not removed after merge");
        }
        Ok(())
    })
}

/// Rename, falling back to copy + remove across filesystems
async fn move_path(source: &Path, dest: &Path) -> std::io::Result<()> {
    match tokio::fs::rename(source, dest).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::CrossesDevices => {
            debug!(source = %source.display(), dest = %dest.display(), "cross-device move, copying");
            copy_recursive(source, dest).await?;
            remove_path(source).await
        }
        Err(e) => Err(e),
    }
}

fn copy_recursive<'a>(
    source: &'a Path,
    dest: &'a Path,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + 'a>> {
    Box::pin(async move {
        let meta = tokio::fs::symlink_metadata(source).await?;
        if !meta.is_dir() {
            tokio::fs::copy(source, dest).await?;
            return Ok(());
        }

        tokio::fs::create_dir_all(dest).await?;
        let mut entries = tokio::fs::read_dir(source).await?;
        while let Some(entry) = entries.next_entry().await? {
            copy_recursive(&entry.path(), &dest.join(entry.file_name())).await?;
        }
        Ok(())
    })
}

/// Delete a file or directory tree
pub async fn remove_path(path: &Path) -> std::io::Result<()> {
    let meta = tokio::fs::symlink_metadata(path).await?;
    if meta.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    }
}

/// Set access and modification time of `path` to `at`
pub async fn stamp(path: &Path, at: DateTime<Utc>) -> std::io::Result<()> {
    let time = FileTime::from_unix_time(at.timestamp(), at.timestamp_subsec_nanos());
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || filetime::set_file_times(&path, time, time))
        .await
        .map_err(std::io::Error::other)?
}

fn move_failed(source: &Path, dest: &Path, reason: impl std::fmt::Display) -> ExtractionError {
    ExtractionError::MoveFailed {
        source_path: source.to_path_buf(),
        dest_path: dest.to_path_buf(),
        reason: reason.to_string(),
    }
}

