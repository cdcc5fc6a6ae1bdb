//! termdex core components
//!
//! Configuration loading and request metrics shared by the daemon.

mod config;
mod error;
mod metrics;

pub use config::{DaemonConfig, IndexConfig};
pub use error::CoreError;
pub use metrics::{LatencyTracker, Metrics};
