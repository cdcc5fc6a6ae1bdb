//! termdex daemon
//!
//! Background process that keeps a term index of configured directories and
//! answers lookups over a Unix socket.

mod daemon;
mod handler;
mod signals;

pub use daemon::Daemon;
pub use handler::DaemonHandler;
