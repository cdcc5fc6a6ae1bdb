//! Indexing orchestrator.
//!
//! [`Catalog`] owns the term tree and runs indexing passes over it. A pass
//! walks every configured root, scans matching files in parallel on the
//! blocking pool and folds each per-file index into the tree through a single
//! consumer. The tree sits behind one `RwLock`; a pass holds the write side
//! from discovery to the last merge, so readers see either the previous state
//! or the completed pass, never a partial one.

use crate::document::TermRecord;
use crate::scanner::{
    matches_file_pattern, FileIndex, FileScanner, RuleSet, TextPattern, WalkOptions, Walker,
};
use crate::tree::{TermTree, TreeSnapshot, DEFAULT_SENTINEL_KEY};
use crate::IndexerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, RwLock, Semaphore};
use tracing::{debug, info, warn};

/// Capacity of the scan-result channel between scanners and the merger.
const SCAN_CHANNEL_CAPACITY: usize = 100;

/// Catalog configuration. Fixed for the lifetime of the catalog.
#[derive(Debug, Clone)]
pub struct CatalogOptions {
    /// Root directories, walked in order
    pub paths: Vec<PathBuf>,
    /// A file is scanned if its path contains any of these substrings
    pub file_patterns: Vec<String>,
    /// Extraction rules, compiled once by [`Catalog::new`]
    pub text_patterns: Vec<TextPattern>,
    /// Key of the root node
    pub sentinel_key: String,
    /// Walker switches
    pub walk: WalkOptions,
    /// Maximum files scanned at once
    pub parallelism: usize,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            file_patterns: Vec::new(),
            text_patterns: Vec::new(),
            sentinel_key: DEFAULT_SENTINEL_KEY.to_string(),
            walk: WalkOptions::default(),
            parallelism: default_parallelism(),
        }
    }
}

/// Number of CPUs, or 1 if that cannot be determined.
pub fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// A file that failed during a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFailure {
    pub path: String,
    pub message: String,
}

/// Outcome of one indexing pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PassReport {
    /// Files attempted, failures included
    pub files_scanned: usize,
    /// Files that could not be read
    pub files_failed: usize,
    /// Tree nodes created by this pass
    pub nodes_created: usize,
    /// Discovered terms after the pass
    pub term_count: usize,
    /// Wall time of the pass in milliseconds
    pub elapsed_ms: u64,
    /// When the pass started
    pub started_at: Option<DateTime<Utc>>,
    /// Per-file failures
    pub errors: Vec<FileFailure>,
}

impl PassReport {
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }
}

/// Diagnostic dump of the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub tree: TreeSnapshot,
    pub base_paths: Vec<PathBuf>,
    pub last_pass: Option<PassReport>,
    pub taken_at: DateTime<Utc>,
}

impl CatalogSnapshot {
    /// Render as indented JSON.
    pub fn to_json_pretty(&self) -> Result<String, IndexerError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

struct CatalogState {
    tree: TermTree,
    last_report: Option<PassReport>,
    passes_completed: u64,
}

/// A scanned file on its way to the merger.
struct ScanOutcome {
    path: PathBuf,
    result: Result<FileIndex, IndexerError>,
}

/// The term index and the passes that build it.
pub struct Catalog {
    options: CatalogOptions,
    scanner: FileScanner,
    state: RwLock<CatalogState>,
}

impl Catalog {
    /// Create an empty catalog and compile its rules.
    ///
    /// Rules that fail to compile are logged and left out; construction
    /// never fails.
    pub fn new(options: CatalogOptions) -> Self {
        let rules = RuleSet::compile(&options.text_patterns);

        info!(
            roots = options.paths.len(),
            file_patterns = options.file_patterns.len(),
            rules = rules.len(),
            disabled_rules = rules.disabled_count(),
            "Catalog created"
        );

        let state = CatalogState {
            tree: TermTree::new(options.sentinel_key.clone()),
            last_report: None,
            passes_completed: 0,
        };

        Self {
            scanner: FileScanner::new(Arc::new(rules)),
            options,
            state: RwLock::new(state),
        }
    }

    pub fn options(&self) -> &CatalogOptions {
        &self.options
    }

    /// The compiled, active rules.
    pub fn rules(&self) -> &RuleSet {
        self.scanner.rules()
    }

    /// Whether a path would be picked up by a pass.
    pub fn is_indexed_path(&self, path: &Path) -> bool {
        matches_file_pattern(path, &self.options.file_patterns)
    }

    /// Walk, scan and merge every matching file under the configured roots.
    ///
    /// Unreadable files are recorded in the report and skipped. Readers wait
    /// until the pass finishes.
    pub async fn run_indexing_pass(&self) -> Result<PassReport, IndexerError> {
        let started = Instant::now();
        let started_at = Utc::now();
        let mut state = self.state.write().await;

        let files = self.discover().await?;
        info!(files = files.len(), "Indexing pass started");

        let (tx, mut rx) = mpsc::channel::<ScanOutcome>(SCAN_CHANNEL_CAPACITY);
        let producer = tokio::spawn(spawn_scans(
            files,
            self.scanner.clone(),
            Arc::new(Semaphore::new(self.options.parallelism.max(1))),
            tx,
        ));

        let mut report = PassReport {
            started_at: Some(started_at),
            ..PassReport::default()
        };

        while let Some(outcome) = rx.recv().await {
            report.files_scanned += 1;
            match outcome.result {
                Ok(index) => {
                    report.nodes_created += merge_file_index(&mut state.tree, index);
                }
                Err(e) => {
                    warn!(path = ?outcome.path, error = %e, "Skipping unreadable file");
                    report.files_failed += 1;
                    report.errors.push(FileFailure {
                        path: outcome.path.to_string_lossy().into_owned(),
                        message: e.to_string(),
                    });
                }
            }
        }

        producer.await?;

        report.term_count = state.tree.term_count();
        report.elapsed_ms = started.elapsed().as_millis() as u64;

        info!(
            files = report.files_scanned,
            failed = report.files_failed,
            nodes_created = report.nodes_created,
            nodes = state.tree.node_count(),
            elapsed_ms = report.elapsed_ms,
            "Indexing pass complete"
        );

        state.last_report = Some(report.clone());
        state.passes_completed += 1;

        Ok(report)
    }

    /// Exact, case-insensitive term lookup.
    pub async fn lookup_exact(&self, term: &str) -> Option<TermRecord> {
        let state = self.state.read().await;
        state.tree.find(term).cloned()
    }

    /// Every term containing `term`, ignoring case, in key order.
    pub async fn search_substring(&self, term: &str) -> Vec<TermRecord> {
        let state = self.state.read().await;
        state.tree.search(term).into_iter().cloned().collect()
    }

    /// A full copy of the tree for diagnostics.
    pub async fn snapshot(&self) -> CatalogSnapshot {
        let state = self.state.read().await;
        CatalogSnapshot {
            tree: state.tree.snapshot(),
            base_paths: self.options.paths.clone(),
            last_pass: state.last_report.clone(),
            taken_at: Utc::now(),
        }
    }

    /// Number of discovered terms.
    pub async fn term_count(&self) -> usize {
        self.state.read().await.tree.term_count()
    }

    /// Report of the most recent pass.
    pub async fn last_report(&self) -> Option<PassReport> {
        self.state.read().await.last_report.clone()
    }

    pub async fn passes_completed(&self) -> u64 {
        self.state.read().await.passes_completed
    }

    async fn discover(&self) -> Result<Vec<PathBuf>, IndexerError> {
        let roots = self.options.paths.clone();
        let patterns = self.options.file_patterns.clone();
        let walk = self.options.walk.clone();

        let files =
            tokio::task::spawn_blocking(move || discover_files(&roots, &patterns, &walk)).await?;
        Ok(files)
    }
}

/// Walk every root and keep paths that match a file pattern.
fn discover_files(roots: &[PathBuf], patterns: &[String], walk: &WalkOptions) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for root in roots {
        match Walker::new(root, walk.clone()).walk() {
            Ok(entries) => {
                let before = files.len();
                let mut bytes = 0u64;
                for entry in entries {
                    if matches_file_pattern(&entry.path, patterns) {
                        bytes += entry.size;
                        files.push(entry.path);
                    }
                }
                debug!(root = ?root, files = files.len() - before, bytes, "Root walked");
            }
            Err(e) => {
                warn!(root = ?root, error = %e, "Skipping index root");
            }
        }
    }

    files
}

/// Scan files on the blocking pool, bounded by `limit`.
async fn spawn_scans(
    files: Vec<PathBuf>,
    scanner: FileScanner,
    limit: Arc<Semaphore>,
    tx: mpsc::Sender<ScanOutcome>,
) {
    for path in files {
        let Ok(permit) = limit.clone().acquire_owned().await else {
            break;
        };
        let scanner = scanner.clone();
        let tx = tx.clone();

        tokio::task::spawn_blocking(move || {
            let result = scanner.scan_file(&path);
            drop(permit);
            if tx.blocking_send(ScanOutcome { path, result }).is_err() {
                debug!("Merger gone, dropping scan result");
            }
        });
    }
}

/// Fold one file's index into the tree. Returns the number of new nodes.
fn merge_file_index(tree: &mut TermTree, index: FileIndex) -> usize {
    index
        .into_iter()
        .map(|(key, document)| tree.insert_or_merge(TermRecord::with_document(key, document)))
        .filter(|created| *created)
        .count()
}
