//! IPC protocol definitions for termdex daemon communication.
//!
//! Uses MessagePack for efficient serialization over Unix sockets.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use termdex_indexer::{CatalogSnapshot, ChangeKind, PassReport, TermRecord};

/// Request from a client to the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Request {
    /// Exact, case-insensitive term lookup
    LookupTerm { term: String },

    /// Every term containing the given text
    SearchTerms { term: String },

    /// Run a full indexing pass and wait for it
    Reindex,

    /// Dump the term tree
    Snapshot,

    /// Report a file change (fire-and-forget)
    NotifyFileChange {
        path: PathBuf,
        change_type: ChangeKind,
    },

    /// Get daemon status
    Status,

    /// Graceful shutdown
    Shutdown,

    /// Ping for health check
    Ping,
}

impl Request {
    /// Short operation name for logs and latency tracking.
    pub fn operation(&self) -> &'static str {
        match self {
            Request::LookupTerm { .. } => "lookup_term",
            Request::SearchTerms { .. } => "search_terms",
            Request::Reindex => "reindex",
            Request::Snapshot => "snapshot",
            Request::NotifyFileChange { .. } => "notify_file_change",
            Request::Status => "status",
            Request::Shutdown => "shutdown",
            Request::Ping => "ping",
        }
    }
}

/// Response from daemon to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    /// Success with optional data
    Ok {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<ResponseData>,
    },

    /// Acknowledgment for fire-and-forget requests
    Ack,

    /// Error response
    Error { code: ErrorCode, message: String },
}

impl Response {
    /// Create a success response with no data
    pub fn ok() -> Self {
        Response::Ok { data: None }
    }

    /// Create a success response with data
    pub fn ok_with(data: ResponseData) -> Self {
        Response::Ok { data: Some(data) }
    }

    /// Create an acknowledgment response
    pub fn ack() -> Self {
        Response::Ack
    }

    /// Create an error response
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Response::Error {
            code,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }
}

/// Response data variants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseData {
    /// Exact lookup hit
    Term { term: TermRecord },

    /// Substring search hits, in key order
    Terms { terms: Vec<TermRecord> },

    /// Result of an indexing pass
    Pass { report: PassReport },

    /// Full tree dump
    Snapshot { snapshot: CatalogSnapshot },

    /// Daemon status
    Status(DaemonStatus),

    /// Pong response
    Pong { timestamp: i64 },
}

/// Daemon health and index summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub version: String,
    pub uptime_secs: u64,
    /// Discovered terms in the index
    pub term_count: usize,
    pub passes_completed: u64,
    #[serde(default)]
    pub last_pass: Option<PassReport>,
    /// Total requests handled
    #[serde(default)]
    pub requests_total: u64,
    /// Average request latency in milliseconds
    #[serde(default)]
    pub avg_latency_ms: f64,
    /// P99 request latency in milliseconds
    #[serde(default)]
    pub p99_latency_ms: f64,
}

/// Error codes for error responses
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Request format is invalid
    InvalidRequest,
    /// Term is not in the index
    NotFound,
    /// Internal daemon error
    InternalError,
    /// Operation timed out
    Timeout,
    /// Daemon is shutting down
    ShuttingDown,
}
