//! Configuration types for auto-unpack

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Where extracted output lands
///
/// The three modes are mutually exclusive. When several flags are set in
/// [`ExtractSettings`], in-place wins over torrent-root, which wins over
/// selected-folder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementMode {
    /// Next to each archive, in the archive's own directory
    InPlace,
    /// `<download_root>/<job name>`
    TorrentRoot,
    /// The configured `extract_path`, optionally suffixed with the matched label
    SelectedFolder,
}

/// User-facing extraction settings
///
/// Field names match the persisted key/value surface so stored settings can be
/// read by other tools.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExtractSettings {
    /// Destination for selected-folder mode (empty = job download root)
    #[serde(default)]
    pub extract_path: PathBuf,

    /// Extract next to each archive
    #[serde(default)]
    pub extract_in_place: bool,

    /// Extract into `extract_path`
    #[serde(default)]
    pub extract_selected_folder: bool,

    /// Extract into `<download_root>/<job name>` (default: true)
    #[serde(default = "default_true")]
    pub extract_torrent_root: bool,

    /// Extract into a staging directory first, then move into place
    #[serde(default)]
    pub use_temp_dir: bool,

    /// Staging root override (system temp dir when unset or not a directory)
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,

    /// Append the matched label to the selected-folder destination
    #[serde(default)]
    pub append_matched_label: bool,

    /// Extract each archive into a subfolder named after it
    #[serde(default)]
    pub append_archive_name: bool,

    /// Comma-separated label allow-list (empty = every job is eligible)
    #[serde(default)]
    pub label_filter: String,

    /// Delete tracked output after `cleanup_time` hours
    #[serde(default)]
    pub auto_cleanup: bool,

    /// Retention age in hours (values below 1 are treated as 1)
    #[serde(default = "default_cleanup_time")]
    pub cleanup_time: u32,

    /// Number of extraction worker slots (values below 1 are treated as 1)
    #[serde(default = "default_max_extract_threads")]
    pub max_extract_threads: usize,
}

impl Default for ExtractSettings {
    fn default() -> Self {
        Self {
            extract_path: PathBuf::new(),
            extract_in_place: false,
            extract_selected_folder: false,
            extract_torrent_root: true,
            use_temp_dir: false,
            temp_dir: None,
            append_matched_label: false,
            append_archive_name: false,
            label_filter: String::new(),
            auto_cleanup: false,
            cleanup_time: default_cleanup_time(),
            max_extract_threads: default_max_extract_threads(),
        }
    }
}

impl ExtractSettings {
    /// Effective placement mode after applying flag priority
    ///
    /// Falls back to selected-folder when no flag is set.
    pub fn placement(&self) -> PlacementMode {
        if self.extract_in_place {
            PlacementMode::InPlace
        } else if self.extract_torrent_root {
            PlacementMode::TorrentRoot
        } else {
            PlacementMode::SelectedFolder
        }
    }

    /// Parsed label allow-list, whitespace stripped, empty entries dropped
    pub fn label_filters(&self) -> Vec<String> {
        self.label_filter
            .split(',')
            .map(|label| label.chars().filter(|c| !c.is_whitespace()).collect::<String>())
            .filter(|label| !label.is_empty())
            .collect()
    }

    /// Retention age in hours, floored at 1
    pub fn cleanup_hours(&self) -> u32 {
        self.cleanup_time.max(1)
    }

    /// Worker slot count, floored at 1
    pub fn worker_count(&self) -> usize {
        self.max_extract_threads.max(1)
    }

    /// Staging root for temp-dir extraction
    ///
    /// Uses the configured override when it names an existing directory,
    /// otherwise the system temp directory.
    pub fn staging_root(&self) -> PathBuf {
        match &self.temp_dir {
            Some(dir) if !dir.as_os_str().is_empty() && dir.is_dir() => dir.clone(),
            _ => std::env::temp_dir(),
        }
    }

    /// Retention policy derived from these settings
    pub fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            enabled: self.auto_cleanup,
            max_age_hours: self.cleanup_hours(),
        }
    }
}

/// Retention sweep parameters
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Whether the sweep deletes anything at all
    pub enabled: bool,
    /// Age in hours at which tracked output is deleted
    pub max_age_hours: u32,
}

/// External archiver locations
///
/// Explicit paths take precedence over PATH lookup.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to unrar executable (auto-detected if None)
    #[serde(default)]
    pub unrar_path: Option<PathBuf>,

    /// Path to unzip executable (auto-detected if None)
    #[serde(default)]
    pub unzip_path: Option<PathBuf>,

    /// Path to tar executable (auto-detected if None)
    #[serde(default)]
    pub tar_path: Option<PathBuf>,

    /// Path to a 7-Zip executable (`7zr` on Unix, `7z.exe` on Windows)
    #[serde(default)]
    pub sevenzip_path: Option<PathBuf>,

    /// 7-Zip shipped alongside the host application (Windows only, tried first)
    #[serde(default)]
    pub bundled_sevenzip: Option<PathBuf>,

    /// Whether to search PATH for external binaries if explicit paths not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            unrar_path: None,
            unzip_path: None,
            tar_path: None,
            sevenzip_path: None,
            bundled_sevenzip: None,
            search_path: true,
        }
    }
}

/// Data storage and background timing
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// SQLite database holding retention entries and runtime settings
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Delay between retention sweeps (default: 30 seconds)
    #[serde(default = "default_sweep_interval", with = "duration_serde")]
    pub sweep_interval: Duration,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            sweep_interval: default_sweep_interval(),
        }
    }
}

/// Main configuration for [`Unpacker`](crate::Unpacker)
///
/// `settings` and `tools` are flattened so the serialized form is a flat
/// key/value map.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Extraction behaviour
    #[serde(flatten)]
    pub settings: ExtractSettings,

    /// External archiver locations
    #[serde(flatten)]
    pub tools: ToolsConfig,

    /// Data storage and background timing
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

/// Configuration update for runtime-changeable settings
///
/// `None` leaves a field unchanged. Tool paths and persistence settings
/// require a restart and are not included.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConfigUpdate {
    /// New `extract_path`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extract_path: Option<PathBuf>,
    /// New `extract_in_place`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extract_in_place: Option<bool>,
    /// New `extract_selected_folder`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extract_selected_folder: Option<bool>,
    /// New `extract_torrent_root`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extract_torrent_root: Option<bool>,
    /// New `use_temp_dir`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_temp_dir: Option<bool>,
    /// New `temp_dir` (`Some(None)` clears the override)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<Option<PathBuf>>,
    /// New `append_matched_label`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub append_matched_label: Option<bool>,
    /// New `append_archive_name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub append_archive_name: Option<bool>,
    /// New `label_filter`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_filter: Option<String>,
    /// New `auto_cleanup`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_cleanup: Option<bool>,
    /// New `cleanup_time`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleanup_time: Option<u32>,
    /// New `max_extract_threads`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_extract_threads: Option<usize>,
}

impl ConfigUpdate {
    /// Apply every present field to `settings`
    pub fn apply_to(&self, settings: &mut ExtractSettings) {
        if let Some(v) = &self.extract_path {
            settings.extract_path = v.clone();
        }
        if let Some(v) = self.extract_in_place {
            settings.extract_in_place = v;
        }
        if let Some(v) = self.extract_selected_folder {
            settings.extract_selected_folder = v;
        }
        if let Some(v) = self.extract_torrent_root {
            settings.extract_torrent_root = v;
        }
        if let Some(v) = self.use_temp_dir {
            settings.use_temp_dir = v;
        }
        if let Some(v) = &self.temp_dir {
            settings.temp_dir = v.clone();
        }
        if let Some(v) = self.append_matched_label {
            settings.append_matched_label = v;
        }
        if let Some(v) = self.append_archive_name {
            settings.append_archive_name = v;
        }
        if let Some(v) = &self.label_filter {
            settings.label_filter = v.clone();
        }
        if let Some(v) = self.auto_cleanup {
            settings.auto_cleanup = v;
        }
        if let Some(v) = self.cleanup_time {
            settings.cleanup_time = v.max(1);
        }
        if let Some(v) = self.max_extract_threads {
            settings.max_extract_threads = v.max(1);
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_cleanup_time() -> u32 {
    2
}

fn default_max_extract_threads() -> usize {
    2
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./auto-unpack.db")
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(30)
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_persisted_surface() {
        let settings = ExtractSettings::default();
        assert!(settings.extract_torrent_root);
        assert!(!settings.extract_in_place);
        assert!(!settings.extract_selected_folder);
        assert_eq!(settings.cleanup_time, 2);
        assert_eq!(settings.max_extract_threads, 2);
        assert_eq!(settings.placement(), PlacementMode::TorrentRoot);
    }

    #[test]
    fn in_place_takes_priority_over_other_modes() {
        let settings = ExtractSettings {
            extract_in_place: true,
            extract_torrent_root: true,
            extract_selected_folder: true,
            ..Default::default()
        };
        assert_eq!(settings.placement(), PlacementMode::InPlace);
    }

    #[test]
    fn torrent_root_takes_priority_over_selected_folder() {
        let settings = ExtractSettings {
            extract_torrent_root: true,
            extract_selected_folder: true,
            ..Default::default()
        };
        assert_eq!(settings.placement(), PlacementMode::TorrentRoot);
    }

    #[test]
    fn no_mode_flag_falls_back_to_selected_folder() {
        let settings = ExtractSettings {
            extract_torrent_root: false,
            ..Default::default()
        };
        assert_eq!(settings.placement(), PlacementMode::SelectedFolder);
    }

    #[test]
    fn label_filter_strips_whitespace_and_empty_entries() {
        let settings = ExtractSettings {
            label_filter: " movies , tv shows,, ".to_string(),
            ..Default::default()
        };
        assert_eq!(settings.label_filters(), vec!["movies", "tvshows"]);
    }

    #[test]
    fn empty_label_filter_yields_no_entries() {
        assert!(ExtractSettings::default().label_filters().is_empty());
    }

    #[test]
    fn cleanup_time_and_worker_count_are_floored() {
        let settings = ExtractSettings {
            cleanup_time: 0,
            max_extract_threads: 0,
            ..Default::default()
        };
        assert_eq!(settings.cleanup_hours(), 1);
        assert_eq!(settings.worker_count(), 1);
    }

    #[test]
    fn staging_root_ignores_missing_override() {
        let settings = ExtractSettings {
            temp_dir: Some(PathBuf::from("/definitely/not/a/real/dir")),
            ..Default::default()
        };
        assert_eq!(settings.staging_root(), std::env::temp_dir());
    }

    #[test]
    fn staging_root_uses_existing_override() {
        let dir = tempfile::tempdir().unwrap();
        let settings = ExtractSettings {
            temp_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        assert_eq!(settings.staging_root(), dir.path());
    }

    #[test]
    fn config_serializes_as_flat_key_value_map() {
        let json = serde_json::to_value(Config::default()).unwrap();
        let obj = json.as_object().unwrap();
        assert!(obj.contains_key("extract_path"));
        assert!(obj.contains_key("max_extract_threads"));
        assert!(obj.contains_key("search_path"));
        assert_eq!(json["persistence"]["sweep_interval"], 30);
    }

    #[test]
    fn settings_deserialize_with_missing_keys_uses_defaults() {
        let settings: ExtractSettings =
            serde_json::from_str(r#"{"extract_in_place": true}"#).unwrap();
        assert!(settings.extract_in_place);
        assert!(settings.extract_torrent_root);
        assert_eq!(settings.cleanup_time, 2);
    }

    #[test]
    fn config_update_applies_only_present_fields() {
        let mut settings = ExtractSettings::default();
        let update = ConfigUpdate {
            max_extract_threads: Some(4),
            auto_cleanup: Some(true),
            cleanup_time: Some(0),
            ..Default::default()
        };

        update.apply_to(&mut settings);

        assert_eq!(settings.max_extract_threads, 4);
        assert!(settings.auto_cleanup);
        assert_eq!(settings.cleanup_time, 1, "cleanup_time is floored at 1");
        assert!(settings.extract_torrent_root, "untouched field keeps value");
    }

    #[test]
    fn config_update_can_clear_temp_dir() {
        let mut settings = ExtractSettings {
            temp_dir: Some(PathBuf::from("/scratch")),
            ..Default::default()
        };
        ConfigUpdate {
            temp_dir: Some(None),
            ..Default::default()
        }
        .apply_to(&mut settings);
        assert_eq!(settings.temp_dir, None);
    }

    #[test]
    fn config_update_none_omits_field_entirely() {
        let json = serde_json::to_value(ConfigUpdate::default()).unwrap();
        assert!(json.as_object().unwrap().is_empty());
    }

    #[test]
    fn retention_policy_reflects_settings() {
        let settings = ExtractSettings {
            auto_cleanup: true,
            cleanup_time: 5,
            ..Default::default()
        };
        assert_eq!(
            settings.retention_policy(),
            RetentionPolicy {
                enabled: true,
                max_age_hours: 5
            }
        );
    }
}
