//! IPC client for communicating with the termdex daemon.

use crate::{DaemonStatus, ErrorCode, IpcError, Request, Response, ResponseData};
use std::path::{Path, PathBuf};
use std::time::Duration;
use termdex_indexer::{CatalogSnapshot, ChangeKind, PassReport, TermRecord};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

/// Default socket path
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/termdex.sock";

/// Connection timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Request/response timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for requests that wait on a full indexing pass
const PASS_TIMEOUT: Duration = Duration::from_secs(600);

/// IPC client for communicating with the daemon
#[derive(Debug, Clone)]
pub struct IpcClient {
    socket_path: PathBuf,
}

impl IpcClient {
    /// Create a client with default socket path
    pub fn new() -> Self {
        Self::with_socket_path(DEFAULT_SOCKET_PATH)
    }

    /// Create a client with custom socket path
    pub fn with_socket_path<P: AsRef<Path>>(socket_path: P) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Check if daemon is running
    pub fn is_daemon_running(&self) -> bool {
        self.socket_path.exists()
    }

    /// Open a connection to the daemon
    pub async fn connect(&self) -> Result<ConnectedClient, IpcError> {
        if !self.socket_path.exists() {
            return Err(IpcError::DaemonNotRunning);
        }

        let stream = tokio::time::timeout(CONNECT_TIMEOUT, UnixStream::connect(&self.socket_path))
            .await
            .map_err(|_| IpcError::ConnectionFailed("Connection timed out".to_string()))??;

        Ok(ConnectedClient { stream })
    }

    /// Send a request and wait for response (opens new connection)
    pub async fn request(&self, request: Request) -> Result<Response, IpcError> {
        self.request_with_timeout(request, REQUEST_TIMEOUT).await
    }

    pub async fn request_with_timeout(
        &self,
        request: Request,
        timeout: Duration,
    ) -> Result<Response, IpcError> {
        let mut client = self.connect().await?;
        client.send_with_timeout(request, timeout).await
    }

    /// Send a fire-and-forget request (don't wait for response)
    pub async fn send_async(&self, request: &Request) -> Result<(), IpcError> {
        let mut client = self.connect().await?;
        client.write_request(request).await
    }

    /// Exact lookup. An unknown term is `Ok(None)`.
    pub async fn lookup(&self, term: &str) -> Result<Option<TermRecord>, IpcError> {
        let response = self
            .request(Request::LookupTerm {
                term: term.to_string(),
            })
            .await?;

        match response {
            Response::Ok {
                data: Some(ResponseData::Term { term }),
            } => Ok(Some(term)),
            Response::Error {
                code: ErrorCode::NotFound,
                ..
            } => Ok(None),
            other => Err(unexpected(other)),
        }
    }

    /// Substring search.
    pub async fn search(&self, term: &str) -> Result<Vec<TermRecord>, IpcError> {
        let response = self
            .request(Request::SearchTerms {
                term: term.to_string(),
            })
            .await?;

        match response {
            Response::Ok {
                data: Some(ResponseData::Terms { terms }),
            } => Ok(terms),
            other => Err(unexpected(other)),
        }
    }

    /// Run an indexing pass and wait for its report.
    pub async fn reindex(&self) -> Result<PassReport, IpcError> {
        let response = self
            .request_with_timeout(Request::Reindex, PASS_TIMEOUT)
            .await?;

        match response {
            Response::Ok {
                data: Some(ResponseData::Pass { report }),
            } => Ok(report),
            other => Err(unexpected(other)),
        }
    }

    /// Fetch a tree dump.
    ///
    /// Waits as long as a pass would, since a snapshot queues behind one.
    pub async fn snapshot(&self) -> Result<CatalogSnapshot, IpcError> {
        let response = self
            .request_with_timeout(Request::Snapshot, PASS_TIMEOUT)
            .await?;

        match response {
            Response::Ok {
                data: Some(ResponseData::Snapshot { snapshot }),
            } => Ok(snapshot),
            other => Err(unexpected(other)),
        }
    }

    /// Get daemon status
    pub async fn get_status(&self) -> Result<DaemonStatus, IpcError> {
        match self.request(Request::Status).await? {
            Response::Ok {
                data: Some(ResponseData::Status(status)),
            } => Ok(status),
            other => Err(unexpected(other)),
        }
    }

    /// Round-trip a ping; returns the daemon's timestamp.
    pub async fn ping(&self) -> Result<i64, IpcError> {
        match self.request(Request::Ping).await? {
            Response::Ok {
                data: Some(ResponseData::Pong { timestamp }),
            } => Ok(timestamp),
            other => Err(unexpected(other)),
        }
    }

    /// Report a file change.
    pub async fn notify_file_change(&self, path: &Path, kind: ChangeKind) -> Result<(), IpcError> {
        self.send_async(&Request::NotifyFileChange {
            path: path.to_path_buf(),
            change_type: kind,
        })
        .await
    }

    /// Ask the daemon to stop.
    pub async fn shutdown(&self) -> Result<(), IpcError> {
        match self.request(Request::Shutdown).await? {
            Response::Ok { .. } | Response::Ack => Ok(()),
            other => Err(unexpected(other)),
        }
    }
}

impl Default for IpcClient {
    fn default() -> Self {
        Self::new()
    }
}

fn unexpected(response: Response) -> IpcError {
    match response {
        Response::Error { code, message } => IpcError::Daemon { code, message },
        other => IpcError::UnexpectedResponse(format!("{:?}", other)),
    }
}

/// A connected IPC client that can send requests and receive responses
pub struct ConnectedClient {
    stream: UnixStream,
}

impl ConnectedClient {
    /// Send a request and wait for response
    pub async fn send(&mut self, request: Request) -> Result<Response, IpcError> {
        self.send_with_timeout(request, REQUEST_TIMEOUT).await
    }

    pub async fn send_with_timeout(
        &mut self,
        request: Request,
        timeout: Duration,
    ) -> Result<Response, IpcError> {
        tokio::time::timeout(timeout, self.do_send(request)).await?
    }

    async fn do_send(&mut self, request: Request) -> Result<Response, IpcError> {
        self.write_request(&request).await?;

        let mut len_buf = [0u8; 4];
        self.stream.read_exact(&mut len_buf).await?;
        let len = u32::from_le_bytes(len_buf) as usize;

        let mut response_buf = vec![0u8; len];
        self.stream.read_exact(&mut response_buf).await?;

        Ok(rmp_serde::from_slice(&response_buf)?)
    }

    async fn write_request(&mut self, request: &Request) -> Result<(), IpcError> {
        let request_bytes = rmp_serde::to_vec_named(request)?;
        let len_bytes = (request_bytes.len() as u32).to_le_bytes();

        self.stream.write_all(&len_bytes).await?;
        self.stream.write_all(&request_bytes).await?;
        self.stream.flush().await?;

        Ok(())
    }
}
