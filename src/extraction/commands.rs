//! External archiver discovery and the extension → command table

use crate::config::ToolsConfig;
use crate::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One archive family handled by a native Unix binary
struct NativeFamily {
    binary: &'static str,
    commands: &'static [(&'static str, &'static [&'static str])],
}

const NATIVE_FAMILIES: &[NativeFamily] = &[
    NativeFamily {
        binary: "unrar",
        commands: &[(".rar", &["x", "-o+", "-y"]), (".r00", &["x", "-o+", "-y"])],
    },
    NativeFamily {
        binary: "unzip",
        commands: &[(".zip", &["-o"])],
    },
    NativeFamily {
        binary: "tar",
        commands: &[
            (".tar", &["-xf"]),
            (".tar.gz", &["-xzf"]),
            (".tgz", &["-xzf"]),
            (".tar.bz2", &["-xjf"]),
            (".tbz", &["-xjf"]),
            (".tar.lzma", &["--lzma", "-xf"]),
            (".tlz", &["--lzma", "-xf"]),
            (".tar.xz", &["-xJf"]),
            (".txz", &["-xJf"]),
        ],
    },
    NativeFamily {
        binary: "7zr",
        commands: &[(".7z", &["x", "-y"])],
    },
];

/// Keys 7-Zip extracts in a single step
const SEVENZIP_SINGLE: &[&str] = &[".r00", ".rar", ".zip", ".tar", ".7z", ".xz", ".lzma"];

/// Tar-family keys 7-Zip can only unpack by piping the outer layer into a tar pass
const SEVENZIP_TAR: &[&str] = &[
    ".tar.bz2", ".tbz", ".tar.xz", ".txz", ".tar.gz", ".tgz", ".tar.lzma", ".tlz",
];

#[cfg(windows)]
const SEVENZIP_INSTALL_PATHS: &[&str] = &[
    r"C:\Program Files\7-Zip\7z.exe",
    r"C:\Program Files (x86)\7-Zip\7z.exe",
];

/// Immutable mapping from lowercase extension key to extraction command
///
/// Commands start with the resolved program path. The archive path is not
/// part of the stored command; it is appended when the pipeline is built.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandTable {
    primary: HashMap<String, Vec<String>>,
    secondary: HashMap<String, Vec<String>>,
}

impl CommandTable {
    /// Build the Unix table, keeping only families whose binary `lookup` finds
    pub fn native(lookup: impl Fn(&str) -> Option<PathBuf>) -> Self {
        let mut table = Self::default();

        for family in NATIVE_FAMILIES {
            match lookup(family.binary) {
                Some(path) => {
                    debug!(binary = family.binary, path = %path.display(), "found archiver");
                    let program = path.to_string_lossy().into_owned();
                    for (key, args) in family.commands {
                        let mut command = vec![program.clone()];
                        command.extend(args.iter().map(|a| a.to_string()));
                        table.insert(key, command);
                    }
                }
                None => {
                    for (key, _) in family.commands {
                        warn!(
                            binary = family.binary,
                            extension = key,
                            "{} not found, disabling extraction of {} files",
                            family.binary,
                            key
                        );
                    }
                }
            }
        }

        table
    }

    /// Build the 7-Zip table used where no native archivers exist
    pub fn sevenzip(exe: &Path) -> Self {
        let program = exe.to_string_lossy().into_owned();
        let single = vec![program.clone(), "x".into(), "-y".into(), "-aoa".into()];
        let outer = vec![
            program.clone(),
            "x".into(),
            "-y".into(),
            "-so".into(),
            "-aoa".into(),
        ];
        let inner = vec![
            program,
            "x".into(),
            "-y".into(),
            "-ttar".into(),
            "-si".into(),
            "-aoa".into(),
        ];

        let mut table = Self::default();
        for key in SEVENZIP_SINGLE {
            table.insert(key, single.clone());
        }
        for key in SEVENZIP_TAR {
            table.insert_two_stage(key, outer.clone(), inner.clone());
        }
        table
    }

    /// Register a single-stage command
    pub fn insert(&mut self, key: &str, command: Vec<String>) {
        let key = key.to_ascii_lowercase();
        self.secondary.remove(&key);
        self.primary.insert(key, command);
    }

    /// Register a command whose stdout feeds a second command
    pub fn insert_two_stage(&mut self, key: &str, primary: Vec<String>, secondary: Vec<String>) {
        let key = key.to_ascii_lowercase();
        self.primary.insert(key.clone(), primary);
        self.secondary.insert(key, secondary);
    }

    /// Primary command for `key`
    pub fn primary(&self, key: &str) -> Option<&[String]> {
        self.primary.get(key).map(Vec::as_slice)
    }

    /// Secondary (piped) command for `key`, if the format needs one
    pub fn secondary(&self, key: &str) -> Option<&[String]> {
        self.secondary.get(key).map(Vec::as_slice)
    }

    /// Whether `key` is extractable
    pub fn contains(&self, key: &str) -> bool {
        self.primary.contains_key(key)
    }

    /// Whether no format is extractable at all
    pub fn is_empty(&self) -> bool {
        self.primary.is_empty()
    }

    /// Number of extractable keys
    pub fn len(&self) -> usize {
        self.primary.len()
    }

    /// Extractable keys in sorted order
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.primary.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

/// Probes installed archivers and builds the [`CommandTable`]
///
/// Runs once at startup. Explicit paths in [`ToolsConfig`] win over PATH
/// lookup; `search_path = false` disables PATH lookup entirely.
pub struct CommandResolver<'a> {
    tools: &'a ToolsConfig,
}

impl<'a> CommandResolver<'a> {
    /// Create a resolver over the configured tool paths
    pub fn new(tools: &'a ToolsConfig) -> Self {
        Self { tools }
    }

    /// Probe binaries and build the table
    ///
    /// Fails with a configuration error when nothing can be extracted.
    pub fn resolve(&self) -> Result<CommandTable> {
        let table = self.build();

        if table.is_empty() {
            return Err(Error::config(
                "no extraction binaries found; archive extraction is unavailable",
                "tools",
            ));
        }

        info!(formats = ?table.keys(), "archive extraction available");
        Ok(table)
    }

    #[cfg(not(windows))]
    fn build(&self) -> CommandTable {
        CommandTable::native(|binary| self.locate(binary))
    }

    #[cfg(windows)]
    fn build(&self) -> CommandTable {
        match self.locate_sevenzip() {
            Some(exe) => {
                info!(path = %exe.display(), "using 7-Zip for extraction");
                CommandTable::sevenzip(&exe)
            }
            None => {
                warn!("7-Zip not found, archive extraction disabled");
                CommandTable::default()
            }
        }
    }

    /// Locate a Unix archiver by name
    pub fn locate(&self, binary: &str) -> Option<PathBuf> {
        let explicit = match binary {
            "unrar" => self.tools.unrar_path.as_ref(),
            "unzip" => self.tools.unzip_path.as_ref(),
            "tar" => self.tools.tar_path.as_ref(),
            "7zr" => self.tools.sevenzip_path.as_ref(),
            _ => None,
        };

        if let Some(path) = explicit {
            if path.is_file() {
                return Some(path.clone());
            }
            warn!(binary, path = %path.display(), "configured archiver path does not exist");
        }

        if self.tools.search_path {
            which::which(binary).ok()
        } else {
            None
        }
    }

    /// Locate 7-Zip: configured, bundled, PATH, then the standard install locations
    #[cfg(windows)]
    fn locate_sevenzip(&self) -> Option<PathBuf> {
        let configured = [
            self.tools.sevenzip_path.as_ref(),
            self.tools.bundled_sevenzip.as_ref(),
        ];
        if let Some(path) = configured.into_iter().flatten().find(|p| p.is_file()) {
            return Some(path.clone());
        }

        if self.tools.search_path
            && let Ok(path) = which::which("7z.exe")
        {
            return Some(path);
        }

        SEVENZIP_INSTALL_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|p| p.is_file())
    }
}
