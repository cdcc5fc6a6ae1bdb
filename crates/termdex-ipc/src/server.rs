//! Unix socket IPC server for the termdex daemon.
//!
//! Handles incoming connections and dispatches requests to a handler.

use crate::{ErrorCode, IpcError, Request, Response};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, info};

/// Maximum request size (1MB)
pub const MAX_REQUEST_SIZE: usize = 1024 * 1024;

/// Time allowed for a client to send its request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

/// Trait for handling incoming requests
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Handle a request and return a response
    async fn handle(&self, request: Request) -> Response;
}

/// Unix socket IPC server
pub struct IpcServer {
    listener: UnixListener,
    socket_path: PathBuf,
    handler: Arc<dyn RequestHandler>,
}

impl IpcServer {
    /// Bind to the given socket path, replacing a stale socket file.
    pub async fn new<P: AsRef<Path>>(
        socket_path: P,
        handler: Arc<dyn RequestHandler>,
    ) -> Result<Self, IpcError> {
        let socket_path = socket_path.as_ref();

        if socket_path.exists() {
            std::fs::remove_file(socket_path)?;
        }

        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(socket_path)?;

        // User only
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        info!(socket = %socket_path.display(), "IPC server listening");

        Ok(Self {
            listener,
            socket_path: socket_path.to_path_buf(),
            handler,
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Accept connections until the task is dropped.
    pub async fn run(&self) -> Result<(), IpcError> {
        loop {
            match self.listener.accept().await {
                Ok((stream, _addr)) => {
                    let handler = self.handler.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, handler).await {
                            debug!(error = %e, "Connection error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "Accept error");
                }
            }
        }
    }
}

async fn handle_connection(
    mut stream: UnixStream,
    handler: Arc<dyn RequestHandler>,
) -> Result<(), IpcError> {
    let request = tokio::time::timeout(REQUEST_TIMEOUT, read_request(&mut stream)).await?;

    let request = match request {
        Ok(req) => req,
        Err(e) => {
            let response = Response::error(
                ErrorCode::InvalidRequest,
                format!("Failed to parse request: {}", e),
            );
            write_response(&mut stream, &response).await?;
            return Err(e);
        }
    };

    debug!(operation = request.operation(), "Received request");

    let response = handler.handle(request).await;
    write_response(&mut stream, &response).await
}

async fn read_request(stream: &mut UnixStream) -> Result<Request, IpcError> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await?;
    let len = u32::from_le_bytes(len_buf) as usize;

    if len > MAX_REQUEST_SIZE {
        return Err(IpcError::RequestTooLarge);
    }

    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await?;

    decode_request(&buf)
}

/// Decode a request body, MessagePack first, then JSON.
fn decode_request(buf: &[u8]) -> Result<Request, IpcError> {
    match rmp_serde::from_slice(buf) {
        Ok(request) => Ok(request),
        Err(msgpack_err) => serde_json::from_slice(buf).map_err(|_| msgpack_err.into()),
    }
}

async fn write_response(stream: &mut UnixStream, response: &Response) -> Result<(), IpcError> {
    let response_bytes = rmp_serde::to_vec_named(response)?;
    let len_bytes = (response_bytes.len() as u32).to_le_bytes();

    stream.write_all(&len_bytes).await?;
    stream.write_all(&response_bytes).await?;
    stream.flush().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ResponseData;
    use tempfile::tempdir;

    struct PingHandler;

    #[async_trait]
    impl RequestHandler for PingHandler {
        async fn handle(&self, request: Request) -> Response {
            match request {
                Request::Ping => Response::ok_with(ResponseData::Pong {
                    timestamp: chrono::Utc::now().timestamp(),
                }),
                _ => Response::ack(),
            }
        }
    }

    async fn exchange(stream: &mut UnixStream, body: &[u8]) -> Response {
        stream
            .write_all(&(body.len() as u32).to_le_bytes())
            .await
            .unwrap();
        stream.write_all(body).await.unwrap();

        let mut len_buf = [0u8; 4];
        stream.read_exact(&mut len_buf).await.unwrap();
        let mut buf = vec![0u8; u32::from_le_bytes(len_buf) as usize];
        stream.read_exact(&mut buf).await.unwrap();
        rmp_serde::from_slice(&buf).unwrap()
    }

    async fn start(socket_path: &Path) {
        let server = IpcServer::new(socket_path, Arc::new(PingHandler))
            .await
            .unwrap();
        tokio::spawn(async move {
            let _ = server.run().await;
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[test]
    fn test_decode_request_accepts_json() {
        let request = decode_request(br#"{"action":"search_terms","term":"li"}"#).unwrap();
        assert!(matches!(request, Request::SearchTerms { .. }));
        assert!(decode_request(b"\xc1garbage").is_err());
    }

    #[tokio::test]
    async fn test_server_ping_msgpack() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("server.sock");
        start(&socket_path).await;

        let mut stream = UnixStream::connect(&socket_path).await.unwrap();
        let body = rmp_serde::to_vec_named(&Request::Ping).unwrap();
        let response = exchange(&mut stream, &body).await;

        assert!(matches!(
            response,
            Response::Ok {
                data: Some(ResponseData::Pong { .. })
            }
        ));
    }

    #[tokio::test]
    async fn test_server_ping_json() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("server.sock");
        start(&socket_path).await;

        let mut stream = UnixStream::connect(&socket_path).await.unwrap();
        let response = exchange(&mut stream, br#"{"action":"ping"}"#).await;

        assert!(matches!(response, Response::Ok { .. }));
    }

    #[tokio::test]
    async fn test_server_rejects_garbage() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("server.sock");
        start(&socket_path).await;

        let mut stream = UnixStream::connect(&socket_path).await.unwrap();
        let response = exchange(&mut stream, b"not a request").await;

        assert!(matches!(
            response,
            Response::Error {
                code: ErrorCode::InvalidRequest,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_server_replaces_stale_socket() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("server.sock");
        std::fs::write(&socket_path, "stale").unwrap();

        let server = IpcServer::new(&socket_path, Arc::new(PingHandler)).await;
        assert!(server.is_ok());
    }
}
