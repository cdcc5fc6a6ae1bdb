//! Directory change watcher.
//!
//! One debounced `notify` watcher covers every index root. Events for
//! directories and for paths that match no file pattern are dropped before
//! they reach the channel.

use crate::scanner::matches_file_pattern;
use crate::IndexerError;
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebouncedEvent, Debouncer, RecommendedCache};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Kind of change seen on a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
    Renamed,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Created => "created",
            ChangeKind::Modified => "modified",
            ChangeKind::Deleted => "deleted",
            ChangeKind::Renamed => "renamed",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeKind {
    type Err = IndexerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "created" | "create" => Ok(ChangeKind::Created),
            "modified" | "modify" | "changed" => Ok(ChangeKind::Modified),
            "deleted" | "delete" | "removed" => Ok(ChangeKind::Deleted),
            "renamed" | "rename" => Ok(ChangeKind::Renamed),
            other => Err(IndexerError::Watcher(format!("unknown change type: {}", other))),
        }
    }
}

/// A change to a file under an index root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// Options for the file watcher.
#[derive(Debug, Clone)]
pub struct WatcherOptions {
    /// Quiet period before events are delivered
    pub debounce_duration: Duration,
    /// Only paths containing one of these substrings are reported
    pub file_patterns: Vec<String>,
}

impl Default for WatcherOptions {
    fn default() -> Self {
        Self {
            debounce_duration: Duration::from_millis(500),
            file_patterns: Vec::new(),
        }
    }
}

/// Debounced recursive watcher over a set of roots.
pub struct FileWatcher {
    rx: mpsc::Receiver<FileChange>,
    debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
}

impl FileWatcher {
    /// Create a watcher. No roots are watched until [`FileWatcher::watch`].
    pub fn new(options: WatcherOptions) -> Result<Self, IndexerError> {
        let (tx, rx) = mpsc::channel(1000);
        let patterns = options.file_patterns;

        let debouncer = new_debouncer(
            options.debounce_duration,
            None,
            move |result: Result<Vec<DebouncedEvent>, Vec<notify::Error>>| match result {
                Ok(events) => {
                    for event in events {
                        let Some(change) = convert_event(&event.event) else {
                            continue;
                        };
                        if !matches_file_pattern(&change.path, &patterns) {
                            continue;
                        }
                        if let Err(e) = tx.blocking_send(change) {
                            error!(error = %e, "Failed to forward change event");
                        }
                    }
                }
                Err(errors) => {
                    for e in errors {
                        warn!(error = %e, "Watcher error");
                    }
                }
            },
        )
        .map_err(|e| IndexerError::Watcher(e.to_string()))?;

        Ok(Self { rx, debouncer })
    }

    /// Start watching a root recursively.
    pub fn watch(&mut self, root: &Path) -> Result<(), IndexerError> {
        let root = root
            .canonicalize()
            .map_err(|_| IndexerError::NotFound(root.to_path_buf()))?;

        self.debouncer
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e: notify::Error| IndexerError::Watcher(e.to_string()))?;

        info!(path = ?root, "Started watching");

        Ok(())
    }

    /// Receive the next change.
    pub async fn next(&mut self) -> Option<FileChange> {
        self.rx.recv().await
    }
}

fn convert_event(event: &Event) -> Option<FileChange> {
    let path = event.paths.last()?.clone();

    if path.is_dir() {
        return None;
    }

    let kind = match &event.kind {
        EventKind::Create(_) => ChangeKind::Created,
        EventKind::Modify(ModifyKind::Name(_)) => ChangeKind::Renamed,
        EventKind::Modify(_) => ChangeKind::Modified,
        EventKind::Remove(_) => ChangeKind::Deleted,
        EventKind::Any | EventKind::Access(_) | EventKind::Other => return None,
    };

    debug!(path = ?path, kind = %kind, "File change detected");

    Some(FileChange { path, kind })
}

/// Collects changes until a quiet period has passed.
///
/// Used to turn a burst of edits into a single reindex.
pub struct ChangeBatcher {
    changes: Vec<FileChange>,
    quiet_period: Duration,
    last_change: Instant,
}

impl ChangeBatcher {
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            changes: Vec::new(),
            quiet_period,
            last_change: Instant::now(),
        }
    }

    /// Queue a change. A later change to the same path replaces the kind,
    /// except that a deletion is never downgraded.
    pub fn add(&mut self, change: FileChange) {
        self.last_change = Instant::now();

        match self.changes.iter_mut().find(|c| c.path == change.path) {
            Some(existing) if existing.kind == ChangeKind::Deleted => {}
            Some(existing) => existing.kind = change.kind,
            None => self.changes.push(change),
        }
    }

    /// True once changes are queued and none arrived for the quiet period.
    pub fn is_ready(&self) -> bool {
        !self.changes.is_empty() && self.last_change.elapsed() >= self.quiet_period
    }

    /// Drain the queued changes.
    pub fn take(&mut self) -> Vec<FileChange> {
        std::mem::take(&mut self.changes)
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}
