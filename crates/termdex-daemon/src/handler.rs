//! Request handler for daemon IPC.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use termdex_core::{LatencyTracker, Metrics};
use termdex_indexer::{Catalog, FileChange};
use termdex_ipc::{DaemonStatus, ErrorCode, Request, RequestHandler, Response, ResponseData};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

/// Handles incoming IPC requests
pub struct DaemonHandler {
    catalog: Arc<Catalog>,
    metrics: Arc<Metrics>,
    latency: LatencyTracker,
    /// Forwards reported file changes to the change loop
    changes_tx: Option<mpsc::Sender<FileChange>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl DaemonHandler {
    pub fn new(
        catalog: Arc<Catalog>,
        metrics: Arc<Metrics>,
        changes_tx: Option<mpsc::Sender<FileChange>>,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        Self {
            catalog,
            metrics,
            latency: LatencyTracker::default(),
            changes_tx,
            shutdown_tx,
        }
    }

    async fn dispatch(&self, request: Request) -> Response {
        match request {
            Request::LookupTerm { term } => {
                if term.trim().is_empty() {
                    return blank_term();
                }
                match self.catalog.lookup_exact(&term).await {
                    Some(record) => Response::ok_with(ResponseData::Term { term: record }),
                    None => Response::error(ErrorCode::NotFound, format!("Term not found: {}", term)),
                }
            }

            Request::SearchTerms { term } => {
                if term.trim().is_empty() {
                    return blank_term();
                }
                let terms = self.catalog.search_substring(&term).await;
                Response::ok_with(ResponseData::Terms { terms })
            }

            Request::Reindex => {
                self.metrics.record_reindex();
                match self.catalog.run_indexing_pass().await {
                    Ok(report) => Response::ok_with(ResponseData::Pass { report }),
                    Err(e) => {
                        warn!(error = %e, "Indexing pass failed");
                        Response::error(ErrorCode::InternalError, e.to_string())
                    }
                }
            }

            Request::Snapshot => Response::ok_with(ResponseData::Snapshot {
                snapshot: self.catalog.snapshot().await,
            }),

            Request::NotifyFileChange { path, change_type } => {
                if !self.catalog.is_indexed_path(&path) {
                    debug!(path = ?path, "Ignoring change outside file patterns");
                    return Response::ack();
                }

                let change = FileChange {
                    path,
                    kind: change_type,
                };
                match &self.changes_tx {
                    Some(tx) => {
                        if tx.try_send(change).is_err() {
                            warn!("Change queue full, dropping notification");
                        }
                    }
                    None => {
                        info!(path = ?change.path, kind = %change.kind, "Detected change in path");
                        self.metrics.record_file_change();
                    }
                }
                Response::ack()
            }

            Request::Status => Response::ok_with(ResponseData::Status(self.status().await)),

            Request::Ping => Response::ok_with(ResponseData::Pong {
                timestamp: chrono::Utc::now().timestamp(),
            }),

            Request::Shutdown => {
                info!("Shutdown requested");
                let _ = self.shutdown_tx.send(());
                Response::ok()
            }
        }
    }

    async fn status(&self) -> DaemonStatus {
        DaemonStatus {
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs: self.metrics.uptime_secs(),
            term_count: self.catalog.term_count().await,
            passes_completed: self.catalog.passes_completed().await,
            last_pass: self.catalog.last_report().await,
            requests_total: self.metrics.requests(),
            avg_latency_ms: as_millis_f64(self.metrics.avg_latency()),
            p99_latency_ms: as_millis_f64(self.latency.p99_all()),
        }
    }
}

#[async_trait]
impl RequestHandler for DaemonHandler {
    async fn handle(&self, request: Request) -> Response {
        let operation = request.operation();
        let started = Instant::now();

        let response = self.dispatch(request).await;

        let latency = started.elapsed();
        let success = !response.is_error();
        self.metrics.record_request(latency, success);
        self.latency.record(operation, latency);

        info!(
            operation,
            success,
            latency_us = latency.as_micros() as u64,
            "Request handled"
        );

        response
    }
}

fn blank_term() -> Response {
    Response::error(ErrorCode::InvalidRequest, "Search term must not be blank")
}

fn as_millis_f64(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::{tempdir, TempDir};
    use termdex_indexer::{CatalogOptions, ChangeKind, TextPattern};

    async fn indexed_handler() -> (TempDir, DaemonHandler, broadcast::Receiver<()>) {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "TODO:alice TODO:bob").unwrap();

        let catalog = Arc::new(Catalog::new(CatalogOptions {
            paths: vec![dir.path().to_path_buf()],
            file_patterns: vec![".txt".to_string()],
            text_patterns: vec![TextPattern::new(r"(?i)TODO:(\w+)", 1)],
            ..CatalogOptions::default()
        }));
        catalog.run_indexing_pass().await.unwrap();

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handler = DaemonHandler::new(catalog, Arc::new(Metrics::new()), None, shutdown_tx);
        (dir, handler, shutdown_rx)
    }

    fn error_code(response: &Response) -> Option<ErrorCode> {
        match response {
            Response::Error { code, .. } => Some(*code),
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_lookup_hit_and_miss() {
        let (_dir, handler, _rx) = indexed_handler().await;

        let hit = handler
            .handle(Request::LookupTerm {
                term: "ALICE".to_string(),
            })
            .await;
        assert!(matches!(
            hit,
            Response::Ok {
                data: Some(ResponseData::Term { .. })
            }
        ));

        let miss = handler
            .handle(Request::LookupTerm {
                term: "carol".to_string(),
            })
            .await;
        assert_eq!(error_code(&miss), Some(ErrorCode::NotFound));
    }

    #[tokio::test]
    async fn test_blank_terms_rejected() {
        let (_dir, handler, _rx) = indexed_handler().await;

        for request in [
            Request::LookupTerm {
                term: "  ".to_string(),
            },
            Request::SearchTerms {
                term: String::new(),
            },
        ] {
            let response = handler.handle(request).await;
            assert_eq!(error_code(&response), Some(ErrorCode::InvalidRequest));
        }
    }

    #[tokio::test]
    async fn test_search_without_hits_is_ok() {
        let (_dir, handler, _rx) = indexed_handler().await;

        let response = handler
            .handle(Request::SearchTerms {
                term: "zzz".to_string(),
            })
            .await;
        match response {
            Response::Ok {
                data: Some(ResponseData::Terms { terms }),
            } => assert!(terms.is_empty()),
            other => panic!("Expected terms, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_status_counts_requests() {
        let (_dir, handler, _rx) = indexed_handler().await;
        handler.handle(Request::Ping).await;
        handler.handle(Request::Ping).await;

        match handler.handle(Request::Status).await {
            Response::Ok {
                data: Some(ResponseData::Status(status)),
            } => {
                assert_eq!(status.version, env!("CARGO_PKG_VERSION"));
                assert_eq!(status.term_count, 2);
                assert_eq!(status.passes_completed, 1);
                assert_eq!(status.requests_total, 2);
            }
            other => panic!("Expected status, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_notify_file_change_is_acknowledged() {
        let (_dir, handler, _rx) = indexed_handler().await;

        let response = handler
            .handle(Request::NotifyFileChange {
                path: PathBuf::from("/notes/new.txt"),
                change_type: ChangeKind::Created,
            })
            .await;
        assert!(matches!(response, Response::Ack));
        assert_eq!(
            handler
                .metrics
                .file_changes
                .load(std::sync::atomic::Ordering::Relaxed),
            1
        );

        handler
            .handle(Request::NotifyFileChange {
                path: PathBuf::from("/notes/image.png"),
                change_type: ChangeKind::Created,
            })
            .await;
        assert_eq!(
            handler
                .metrics
                .file_changes
                .load(std::sync::atomic::Ordering::Relaxed),
            1
        );
    }

    #[tokio::test]
    async fn test_notify_forwards_to_change_loop() {
        let (_dir, handler, _rx) = indexed_handler().await;
        let (tx, mut rx) = mpsc::channel(4);
        let handler = DaemonHandler {
            changes_tx: Some(tx),
            ..handler
        };

        handler
            .handle(Request::NotifyFileChange {
                path: PathBuf::from("/notes/a.txt"),
                change_type: ChangeKind::Modified,
            })
            .await;

        let change = rx.try_recv().unwrap();
        assert_eq!(change.kind, ChangeKind::Modified);
    }

    #[tokio::test]
    async fn test_shutdown_broadcasts() {
        let (_dir, handler, mut rx) = indexed_handler().await;

        let response = handler.handle(Request::Shutdown).await;
        assert!(matches!(response, Response::Ok { data: None }));
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_reindex_returns_report() {
        let (_dir, handler, _rx) = indexed_handler().await;

        match handler.handle(Request::Reindex).await {
            Response::Ok {
                data: Some(ResponseData::Pass { report }),
            } => {
                assert_eq!(report.files_scanned, 1);
                assert_eq!(report.nodes_created, 0);
            }
            other => panic!("Expected pass report, got {:?}", other),
        }
    }
}
