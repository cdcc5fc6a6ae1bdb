//! termdex IPC protocol and client/server
//!
//! Request/response types and the Unix socket transport used between the
//! termdex daemon and its clients. Frames are a little-endian `u32` length
//! followed by a MessagePack body; servers also accept JSON bodies.

mod client;
mod error;
mod protocol;
mod server;

pub use client::{ConnectedClient, IpcClient, DEFAULT_SOCKET_PATH};
pub use error::IpcError;
pub use protocol::*;
pub use server::{IpcServer, RequestHandler, MAX_REQUEST_SIZE};
