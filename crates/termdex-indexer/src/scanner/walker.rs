//! File system walker for indexing passes.

use crate::IndexerError;
use ignore::{WalkBuilder, WalkState};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use tracing::debug;

/// A discovered file entry.
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// Path to the file, joined onto the walk root
    pub path: PathBuf,
    /// File size in bytes (0 when metadata is unavailable)
    pub size: u64,
}

/// Walker behaviour switches.
#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    /// Follow symbolic links into directories
    pub follow_symlinks: bool,
    /// Skip hidden files and honour .gitignore/.ignore files
    pub respect_ignore_files: bool,
}

/// Recursive walker yielding every non-directory entry under a root.
///
/// Symlinks that are not followed are still yielded so that reading them
/// resolves the target, and a dangling link shows up as a read failure
/// rather than disappearing from the pass.
pub struct Walker {
    root: PathBuf,
    options: WalkOptions,
}

impl Walker {
    /// Create a new walker for the given root directory.
    pub fn new(root: &Path, options: WalkOptions) -> Self {
        Self {
            root: root.to_path_buf(),
            options,
        }
    }

    /// Walk the directory tree and return all discovered files.
    pub fn walk(&self) -> Result<Vec<FileEntry>, IndexerError> {
        if !self.root.exists() {
            return Err(IndexerError::NotFound(self.root.clone()));
        }

        let (tx, rx) = mpsc::channel();
        let respect = self.options.respect_ignore_files;

        let walker = WalkBuilder::new(&self.root)
            .follow_links(self.options.follow_symlinks)
            .hidden(respect)
            .git_ignore(respect)
            .git_global(respect)
            .git_exclude(respect)
            .ignore(respect)
            .parents(respect)
            .build_parallel();

        walker.run(|| {
            let tx = tx.clone();
            Box::new(move |result| {
                match result {
                    Ok(entry) => {
                        let is_dir = entry.file_type().map(|ft| ft.is_dir()).unwrap_or(true);
                        if !is_dir {
                            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                            let _ = tx.send(FileEntry {
                                path: entry.path().to_path_buf(),
                                size,
                            });
                        }
                    }
                    Err(e) => {
                        debug!(error = %e, "Walk error");
                    }
                }
                WalkState::Continue
            })
        });

        drop(tx);

        let mut entries: Vec<FileEntry> = rx.into_iter().collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));

        Ok(entries)
    }
}

/// Whether a path contains any of the configured file-pattern substrings.
pub fn matches_file_pattern(path: &Path, patterns: &[String]) -> bool {
    let path = path.to_string_lossy();
    patterns.iter().any(|p| path.contains(p.as_str()))
}
