//! Index value types.
//!
//! A [`TermRecord`] is what lives in the term tree and what callers get back
//! from lookups. It owns one [`DocumentRecord`] per file that produced the
//! term, and each document owns the [`MatchRecord`]s found in it.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;

/// One occurrence of a rule's pattern in a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Byte offset of the start of the match
    pub location: usize,
    /// The full matched text
    #[serde(rename = "match")]
    pub matched: String,
    /// All capture groups, group 0 first
    pub captures: Vec<String>,
}

/// A document and the matches that produced one term in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Document identifier (file path). Compared case-sensitively.
    pub document_name: String,
    /// Matches in discovery order
    pub matches: Vec<MatchRecord>,
}

impl DocumentRecord {
    /// Create a document with no matches.
    pub fn new(document_name: impl Into<String>) -> Self {
        Self {
            document_name: document_name.into(),
            matches: Vec::new(),
        }
    }

    /// Whether a match at this byte offset is already recorded.
    pub fn has_match_at(&self, location: usize) -> bool {
        self.matches.iter().any(|m| m.location == location)
    }

    /// Append a match unless one at the same location exists.
    ///
    /// Returns `true` if the match was appended.
    pub fn add_match(&mut self, record: MatchRecord) -> bool {
        if self.has_match_at(record.location) {
            return false;
        }
        self.matches.push(record);
        true
    }

    /// Fold another record for the same document into this one.
    ///
    /// Returns the number of matches appended.
    pub fn absorb(&mut self, other: DocumentRecord) -> usize {
        let before = self.matches.len();
        let mut seen: HashSet<usize> = self.matches.iter().map(|m| m.location).collect();
        self.matches.extend(
            other
                .matches
                .into_iter()
                .filter(|m| seen.insert(m.location)),
        );
        self.matches.len() - before
    }

    /// Drop every match whose location was already seen, keeping the first.
    pub fn dedup_locations(&mut self) {
        let mut seen = HashSet::with_capacity(self.matches.len());
        self.matches.retain(|m| seen.insert(m.location));
    }
}

/// A term and every document it was found in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermRecord {
    /// The term as first discovered. Compared case-insensitively.
    pub key: String,
    /// Documents containing at least one match for this term
    pub documents: Vec<DocumentRecord>,
}

impl TermRecord {
    /// Create a term with no documents.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            documents: Vec::new(),
        }
    }

    /// Create a term holding a single document.
    pub fn with_document(key: impl Into<String>, document: DocumentRecord) -> Self {
        Self {
            key: key.into(),
            documents: vec![document],
        }
    }

    /// Find a document by its exact identifier.
    pub fn find_document(&self, document_name: &str) -> Option<&DocumentRecord> {
        self.documents
            .iter()
            .find(|d| d.document_name == document_name)
    }

    /// Merge incoming documents into this term.
    ///
    /// New documents are appended; known documents only gain matches at
    /// locations they don't already have.
    pub fn merge(&mut self, incoming: Vec<DocumentRecord>) {
        for document in incoming {
            match self
                .documents
                .iter_mut()
                .find(|d| d.document_name == document.document_name)
            {
                Some(existing) => {
                    existing.absorb(document);
                }
                None => self.documents.push(document),
            }
        }
    }

    /// A term with no documents is a placeholder, not a discovered term.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Total matches across all documents.
    pub fn match_count(&self) -> usize {
        self.documents.iter().map(|d| d.matches.len()).sum()
    }

    /// Case-insensitive ordering against a raw key.
    pub fn compare_key(&self, key: &str) -> Ordering {
        compare_keys(&self.key, key)
    }
}

impl PartialEq for TermRecord {
    fn eq(&self, other: &Self) -> bool {
        compare_keys(&self.key, &other.key) == Ordering::Equal
    }
}

impl Eq for TermRecord {}

impl PartialOrd for TermRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TermRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_keys(&self.key, &other.key)
    }
}

/// Compare two keys by their lower-cased form without allocating.
pub fn compare_keys(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

/// Lower-case a key one char at a time, the same fold [`compare_keys`] uses.
///
/// Unlike `str::to_lowercase` there is no final-sigma rule, so a substring
/// folds to a substring of the folded key.
pub fn fold_key(key: &str) -> String {
    key.chars().flat_map(char::to_lowercase).collect()
}

/// Case-insensitive substring test.
pub fn key_contains(key: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    fold_key(key).contains(&fold_key(needle))
}
