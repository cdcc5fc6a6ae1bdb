//! termdex indexer
//!
//! The indexing engine behind termdex:
//! - Regex extraction rules run over raw file bytes
//! - Per-file folding of matches by extracted key
//! - An ordered, case-insensitive term tree with substring search
//! - Parallel indexing passes merged under a single write lock
//! - Debounced directory watching

pub mod catalog;
pub mod document;
mod error;
pub mod scanner;
pub mod tree;
pub mod watcher;

pub use catalog::{Catalog, CatalogOptions, CatalogSnapshot, FileFailure, PassReport};
pub use document::{DocumentRecord, MatchRecord, TermRecord};
pub use error::IndexerError;
pub use scanner::{FileIndex, FileScanner, RuleSet, TextPattern, WalkOptions};
pub use tree::{TermNode, TermTree, TreeSnapshot};
pub use watcher::{ChangeBatcher, ChangeKind, FileChange, FileWatcher, WatcherOptions};
