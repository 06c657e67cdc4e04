//! Fake archivers, on-disk jobs, and unpacker construction

use super::host::FakeHost;
use auto_unpack::{CommandTable, Config, ExtractSettings, JobStatus, Unpacker};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Build a command that runs `script` under `sh` with the archive path as `$1`
pub fn sh(script: &str) -> Vec<String> {
    vec!["sh".into(), "-c".into(), script.into(), "sh".into()]
}

/// Extractor stand-in: writes `<stem>/content.bin` holding the archive bytes
pub const EXTRACT_TO_FOLDER: &str =
    r#"n=$(basename "$1"); d="${n%.*}"; mkdir -p "$d" && cp "$1" "$d/content.bin""#;

/// Extractor stand-in that announces itself in `started/`, then holds its
/// slot until `gate` exists
pub fn gated(started: &Path, gate: &Path) -> Vec<String> {
    sh(&format!(
        r#"n=$(basename "$1"); touch '{}'/"$n"; while [ ! -e '{}' ]; do sleep 0.02; done; cp "$1" "$n.out""#,
        started.display(),
        gate.display()
    ))
}

/// Table with `.zip`, `.rar` and `.7z` mapped to [`EXTRACT_TO_FOLDER`]
pub fn fake_commands() -> CommandTable {
    let mut table = CommandTable::default();
    for key in [".zip", ".rar", ".7z"] {
        table.insert(key, sh(EXTRACT_TO_FOLDER));
    }
    table
}

/// Write each file (content = its relative path) and describe the job
pub fn job_on_disk(root: &Path, name: &str, files: &[&str]) -> JobStatus {
    for file in files {
        let path = root.join(file);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, file.as_bytes()).unwrap();
    }
    JobStatus {
        name: name.to_string(),
        download_root: root.to_path_buf(),
        files: files.iter().map(PathBuf::from).collect(),
        progress: 100.0,
    }
}

/// Test environment: unpacker, host, and the directory everything lives in
pub struct TestEnv {
    pub unpacker: Unpacker,
    pub host: Arc<FakeHost>,
    pub dir: TempDir,
}

impl TestEnv {
    /// Download root for fake jobs
    pub fn downloads(&self) -> PathBuf {
        self.dir.path().join("downloads")
    }

    /// Selected-folder destination
    pub fn out(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    /// Staging root
    pub fn staging(&self) -> PathBuf {
        self.dir.path().join("staging")
    }
}

/// Create a test environment
///
/// `customize` receives the settings with `extract_path` pointing at `out/`
/// and `temp_dir` at `staging/`.
pub async fn test_env(
    commands: CommandTable,
    customize: impl FnOnce(&mut ExtractSettings),
) -> TestEnv {
    let dir = tempfile::tempdir().unwrap();
    for sub in ["downloads", "out", "staging"] {
        std::fs::create_dir_all(dir.path().join(sub)).unwrap();
    }

    let mut config = Config::default();
    config.settings.extract_path = dir.path().join("out");
    config.settings.temp_dir = Some(dir.path().join("staging"));
    customize(&mut config.settings);
    config.persistence.database_path = dir.path().join("state.db");

    let host = Arc::new(FakeHost::default());
    let unpacker = Unpacker::with_commands(config, host.clone(), commands)
        .await
        .unwrap();

    TestEnv {
        unpacker,
        host,
        dir,
    }
}
