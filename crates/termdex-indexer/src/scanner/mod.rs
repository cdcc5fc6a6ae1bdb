//! Per-file pattern scanning.
//!
//! A [`FileScanner`] runs every active rule over one file and folds the
//! matches into a [`FileIndex`]: key → the document record for that file.
//! Nothing here touches shared state, so many files can be scanned at once.

mod matcher;
mod walker;

pub use matcher::{ExtractionRule, RuleMatch, RuleSet, TextPattern};
pub use walker::{matches_file_pattern, FileEntry, WalkOptions, Walker};

use crate::document::{DocumentRecord, MatchRecord};
use crate::IndexerError;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Matches found in a single file, grouped by extracted key.
#[derive(Debug, Clone, Default)]
pub struct FileIndex {
    /// Document identifier of the scanned file
    pub document_name: String,
    /// Key → document record holding that key's matches
    pub entries: BTreeMap<String, DocumentRecord>,
}

impl FileIndex {
    /// Create an empty index for a document.
    pub fn new(document_name: impl Into<String>) -> Self {
        Self {
            document_name: document_name.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Record a match under `key`, creating the document record on first use.
    ///
    /// Duplicate locations are kept until [`FileIndex::dedup_locations`].
    pub(crate) fn record(&mut self, key: String, record: MatchRecord) {
        let document_name = &self.document_name;
        self.entries
            .entry(key)
            .or_insert_with(|| DocumentRecord::new(document_name.clone()))
            .matches
            .push(record);
    }

    /// Drop repeated locations under each key, keeping the first match.
    pub(crate) fn dedup_locations(&mut self) {
        for document in self.entries.values_mut() {
            document.dedup_locations();
        }
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up the document record for a key.
    pub fn get(&self, key: &str) -> Option<&DocumentRecord> {
        self.entries.get(key)
    }
}

impl IntoIterator for FileIndex {
    type Item = (String, DocumentRecord);
    type IntoIter = std::collections::btree_map::IntoIter<String, DocumentRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Scans file content with a shared rule set.
#[derive(Debug, Clone)]
pub struct FileScanner {
    rules: Arc<RuleSet>,
}

impl FileScanner {
    /// Create a scanner over the given rules.
    pub fn new(rules: Arc<RuleSet>) -> Self {
        Self { rules }
    }

    /// The rules this scanner applies.
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Read a file from disk and scan it.
    ///
    /// The document identifier is the path as given.
    pub fn scan_file(&self, path: &Path) -> Result<FileIndex, IndexerError> {
        let content = std::fs::read(path).map_err(|e| IndexerError::read(path, e))?;
        let index = self.scan_content(&path.to_string_lossy(), &content);

        debug!(path = ?path, keys = index.len(), "File scanned");

        Ok(index)
    }

    /// Scan in-memory content under a document identifier.
    pub fn scan_content(&self, document_name: &str, content: &[u8]) -> FileIndex {
        let mut index = FileIndex::new(document_name);

        for rule in self.rules.active() {
            for found in rule.find_matches(content) {
                index.record(found.key, found.record);
            }
        }
        index.dedup_locations();

        index
    }
}
