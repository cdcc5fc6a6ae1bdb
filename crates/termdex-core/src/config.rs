//! Configuration for the termdex daemon.

use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use termdex_indexer::catalog::default_parallelism;
use termdex_indexer::{CatalogOptions, TextPattern, WalkOptions};
use tracing::{debug, warn};

/// Daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Unix socket path for IPC
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// PID file path
    #[serde(default = "default_pid_file")]
    pub pid_file: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// What to index and how
    #[serde(default)]
    pub index: IndexConfig,
}

/// Indexing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Root directories to index
    #[serde(default)]
    pub paths: Vec<PathBuf>,

    /// Substrings; a file is indexed if its path contains any of them
    #[serde(default, alias = "filePatterns")]
    pub file_patterns: Vec<String>,

    /// Extraction rules
    #[serde(default, alias = "textPatterns")]
    pub text_patterns: Vec<TextPattern>,

    /// Key of the term tree root
    #[serde(default = "default_sentinel_key")]
    pub sentinel_key: String,

    #[serde(default)]
    pub follow_symlinks: bool,

    /// Skip hidden files and honour .gitignore/.ignore
    #[serde(default)]
    pub respect_ignore_files: bool,

    /// Files scanned concurrently during a pass
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,

    /// Watch roots for changes
    #[serde(default = "default_true")]
    pub watch: bool,

    /// Run a full pass after a burst of relevant changes
    #[serde(default)]
    pub reindex_on_change: bool,

    /// Watcher debounce in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_socket_path() -> PathBuf {
    PathBuf::from("/tmp/termdex.sock")
}

fn default_pid_file() -> PathBuf {
    PathBuf::from("/tmp/termdex.pid")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_sentinel_key() -> String {
    termdex_indexer::tree::DEFAULT_SENTINEL_KEY.to_string()
}

fn default_true() -> bool {
    true
}

fn default_debounce_ms() -> u64 {
    500
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            pid_file: default_pid_file(),
            log_level: default_log_level(),
            index: IndexConfig::default(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            file_patterns: Vec::new(),
            text_patterns: Vec::new(),
            sentinel_key: default_sentinel_key(),
            follow_symlinks: false,
            respect_ignore_files: false,
            parallelism: default_parallelism(),
            watch: true,
            reindex_on_change: false,
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl DaemonConfig {
    /// Default config file location (`~/.termdex/config.yaml`).
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".termdex")
            .join("config.yaml")
    }

    /// Load the default config file, falling back to defaults
    pub fn load() -> Self {
        let config_path = Self::default_path();

        if !config_path.exists() {
            debug!(path = ?config_path, "No config file, using defaults");
            return Self::default();
        }

        match Self::load_from(&config_path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "Failed to load config file, using defaults");
                Self::default()
            }
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content).map_err(|e| CoreError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Parse YAML or JSON.
    ///
    /// A document with no `index` section but top-level `paths`,
    /// `filePatterns` or `textPatterns` is read as a bare index config.
    pub fn parse(content: &str) -> Result<Self, serde_yaml::Error> {
        let value: serde_yaml::Value = serde_yaml::from_str(content)?;

        let is_flat = value.as_mapping().is_some_and(|map| {
            !map.contains_key("index")
                && ["paths", "filePatterns", "file_patterns", "textPatterns", "text_patterns"]
                    .iter()
                    .any(|k| map.contains_key(*k))
        });

        if is_flat {
            let index: IndexConfig = serde_yaml::from_value(value)?;
            return Ok(Self {
                index,
                ..Self::default()
            });
        }

        if value.is_null() {
            return Ok(Self::default());
        }

        serde_yaml::from_value(value)
    }
}

impl IndexConfig {
    /// Options for building the catalog.
    pub fn to_catalog_options(&self) -> CatalogOptions {
        CatalogOptions {
            paths: self.paths.clone(),
            file_patterns: self.file_patterns.clone(),
            text_patterns: self.text_patterns.clone(),
            sentinel_key: self.sentinel_key.clone(),
            walk: WalkOptions {
                follow_symlinks: self.follow_symlinks,
                respect_ignore_files: self.respect_ignore_files,
            },
            parallelism: self.parallelism.max(1),
        }
    }
}
