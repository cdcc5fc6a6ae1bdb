//! Integration tests for termdex IPC communication.
//!
//! A catalog-backed handler is served over a real socket and queried with the
//! client's typed helpers.

use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;

use async_trait::async_trait;
use tempfile::tempdir;
use termdex_indexer::{Catalog, CatalogOptions, TextPattern};
use termdex_ipc::{
    DaemonStatus, ErrorCode, IpcClient, IpcError, IpcServer, Request, RequestHandler, Response,
    ResponseData,
};

struct CatalogHandler {
    catalog: Catalog,
}

#[async_trait]
impl RequestHandler for CatalogHandler {
    async fn handle(&self, request: Request) -> Response {
        match request {
            Request::LookupTerm { term } => match self.catalog.lookup_exact(&term).await {
                Some(term) => Response::ok_with(ResponseData::Term { term }),
                None => Response::error(ErrorCode::NotFound, format!("Term not found: {}", term)),
            },
            Request::SearchTerms { term } => Response::ok_with(ResponseData::Terms {
                terms: self.catalog.search_substring(&term).await,
            }),
            Request::Reindex => match self.catalog.run_indexing_pass().await {
                Ok(report) => Response::ok_with(ResponseData::Pass { report }),
                Err(e) => Response::error(ErrorCode::InternalError, e.to_string()),
            },
            Request::Snapshot => Response::ok_with(ResponseData::Snapshot {
                snapshot: self.catalog.snapshot().await,
            }),
            Request::Status => Response::ok_with(ResponseData::Status(DaemonStatus {
                version: "test".to_string(),
                term_count: self.catalog.term_count().await,
                passes_completed: self.catalog.passes_completed().await,
                last_pass: self.catalog.last_report().await,
                ..DaemonStatus::default()
            })),
            Request::Ping => Response::ok_with(ResponseData::Pong {
                timestamp: chrono::Utc::now().timestamp(),
            }),
            Request::NotifyFileChange { .. } | Request::Shutdown => Response::ack(),
        }
    }
}

async fn serve(dir: &std::path::Path) -> IpcClient {
    let notes = dir.join("notes");
    fs::create_dir_all(&notes).unwrap();
    fs::write(notes.join("a.txt"), "fix TODO:alice now").unwrap();
    fs::write(
        notes.join("b.txt"),
        "TODO:alice then TODO:bob then TODO:alice",
    )
    .unwrap();

    let catalog = Catalog::new(CatalogOptions {
        paths: vec![notes],
        file_patterns: vec![".txt".to_string()],
        text_patterns: vec![TextPattern::new(r"(?i)TODO:(\w+)", 1)],
        ..CatalogOptions::default()
    });

    let socket_path = dir.join("termdex.sock");
    let server = IpcServer::new(&socket_path, Arc::new(CatalogHandler { catalog }))
        .await
        .unwrap();
    tokio::spawn(async move {
        let _ = server.run().await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    IpcClient::with_socket_path(socket_path)
}

#[tokio::test]
async fn test_reindex_then_query() {
    let temp_dir = tempdir().unwrap();
    let client = serve(temp_dir.path()).await;

    assert!(client.lookup("alice").await.unwrap().is_none());

    let report = client.reindex().await.unwrap();
    assert_eq!(report.files_scanned, 2);
    assert_eq!(report.nodes_created, 2);

    let alice = client.lookup("Alice").await.unwrap().unwrap();
    assert_eq!(alice.documents.len(), 2);
    assert_eq!(alice.match_count(), 3);

    let hits = client.search("O").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].key, "bob");

    assert!(client.search("carol").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_status_and_snapshot() {
    let temp_dir = tempdir().unwrap();
    let client = serve(temp_dir.path()).await;
    client.reindex().await.unwrap();

    let status = client.get_status().await.unwrap();
    assert_eq!(status.term_count, 2);
    assert_eq!(status.passes_completed, 1);
    assert_eq!(status.last_pass.unwrap().files_scanned, 2);

    let snapshot = client.snapshot().await.unwrap();
    assert_eq!(snapshot.tree.node_count, 3);
    assert_eq!(snapshot.tree.nodes[snapshot.tree.root_id].value.key, "mn");
    assert_eq!(snapshot.base_paths.len(), 1);
}

#[tokio::test]
async fn test_raw_error_response() {
    let temp_dir = tempdir().unwrap();
    let client = serve(temp_dir.path()).await;

    let response = client
        .request(Request::LookupTerm {
            term: "nobody".to_string(),
        })
        .await
        .unwrap();

    match response {
        Response::Error { code, message } => {
            assert_eq!(code, ErrorCode::NotFound);
            assert!(message.contains("nobody"));
        }
        other => panic!("Expected error response, got {:?}", other),
    }
}

#[tokio::test]
async fn test_concurrent_clients() {
    let temp_dir = tempdir().unwrap();
    let client = serve(temp_dir.path()).await;
    client.reindex().await.unwrap();

    let barrier = Arc::new(Barrier::new(10));
    let mut handles = Vec::new();

    for i in 0..10 {
        let client = client.clone();
        let barrier = barrier.clone();

        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            if i % 2 == 0 {
                client.lookup("alice").await.map(|t| t.is_some())
            } else {
                client.search("b").await.map(|t| t.len() == 1)
            }
        }));
    }

    for handle in handles {
        assert!(handle.await.unwrap().unwrap());
    }
}

#[tokio::test]
async fn test_daemon_not_running() {
    let temp_dir = tempdir().unwrap();
    let client = IpcClient::with_socket_path(temp_dir.path().join("none.sock"));

    assert!(matches!(
        client.ping().await,
        Err(IpcError::DaemonNotRunning)
    ));
}
