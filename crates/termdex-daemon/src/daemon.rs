//! Daemon lifecycle management.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use termdex_core::{DaemonConfig, Metrics};
use termdex_indexer::{Catalog, ChangeBatcher, FileChange, FileWatcher, WatcherOptions};
use termdex_ipc::IpcServer;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::handler::DaemonHandler;
use crate::signals;

/// Capacity of the queue feeding the change loop
const CHANGE_QUEUE_CAPACITY: usize = 1000;

/// The main daemon process
pub struct Daemon {
    config: DaemonConfig,
    shutdown_tx: broadcast::Sender<()>,
    pid_locked: AtomicBool,
}

impl Daemon {
    pub fn new(config: DaemonConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            shutdown_tx,
            pid_locked: AtomicBool::new(false),
        }
    }

    /// Sender that stops [`Daemon::run`] when signalled.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Index, then serve until shutdown.
    pub async fn run(&self) -> Result<()> {
        self.acquire_pid_lock()?;

        let result = self.serve().await;
        self.cleanup();
        result
    }

    async fn serve(&self) -> Result<()> {
        let index = &self.config.index;

        info!(
            socket = %self.config.socket_path.display(),
            roots = index.paths.len(),
            "Daemon starting"
        );

        let catalog = Arc::new(Catalog::new(index.to_catalog_options()));
        let metrics = Arc::new(Metrics::new());

        let report = catalog
            .run_indexing_pass()
            .await
            .context("Initial indexing pass failed")?;
        info!(
            files = report.files_scanned,
            nodes = report.nodes_created,
            elapsed_ms = report.elapsed_ms,
            "Initial index built"
        );

        let (changes_tx, changes_rx) = mpsc::channel(CHANGE_QUEUE_CAPACITY);
        let quiet_period = Duration::from_millis(index.debounce_ms);

        let mut tasks: Vec<JoinHandle<()>> = vec![tokio::spawn(process_changes(
            catalog.clone(),
            metrics.clone(),
            changes_rx,
            index.reindex_on_change,
            quiet_period,
        ))];

        if index.watch {
            match start_watcher(&self.config, changes_tx.clone()) {
                Ok(task) => tasks.push(task),
                Err(e) => warn!(error = %e, "File watching disabled"),
            }
        }

        let handler = Arc::new(DaemonHandler::new(
            catalog,
            metrics,
            Some(changes_tx),
            self.shutdown_tx.clone(),
        ));

        let ipc_server = IpcServer::new(&self.config.socket_path, handler)
            .await
            .context("Failed to create IPC server")?;

        let shutdown_rx = self.shutdown_tx.subscribe();

        tokio::select! {
            result = ipc_server.run() => {
                if let Err(e) = result {
                    error!(error = %e, "IPC server error");
                }
            }
            _ = signals::wait_for_shutdown(shutdown_rx) => {
                info!("Shutdown signal received");
            }
        }

        for task in tasks {
            task.abort();
        }

        Ok(())
    }

    /// Acquire PID lock to ensure single instance
    fn acquire_pid_lock(&self) -> Result<()> {
        let pid_file = &self.config.pid_file;

        if pid_file.exists() {
            if let Ok(pid_str) = std::fs::read_to_string(pid_file) {
                if let Ok(pid) = pid_str.trim().parse::<u32>() {
                    if is_process_running(pid) {
                        anyhow::bail!("Daemon already running (PID: {})", pid);
                    }
                }
            }
            debug!(path = ?pid_file, "Removing stale PID file");
            std::fs::remove_file(pid_file)?;
        }

        if let Some(parent) = pid_file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(pid_file, std::process::id().to_string())
            .with_context(|| format!("Failed to write PID file {}", pid_file.display()))?;
        self.pid_locked.store(true, Ordering::SeqCst);

        debug!(pid = std::process::id(), "PID lock acquired");

        Ok(())
    }

    fn cleanup(&self) {
        info!("Cleaning up...");

        if self.config.socket_path.exists() {
            let _ = std::fs::remove_file(&self.config.socket_path);
        }
        self.release_pid_lock();

        info!("Cleanup complete");
    }

    fn release_pid_lock(&self) {
        if self.pid_locked.swap(false, Ordering::SeqCst) {
            let _ = std::fs::remove_file(&self.config.pid_file);
        }
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        self.release_pid_lock();
    }
}

/// Watch every existing root and forward changes to the change loop.
fn start_watcher(
    config: &DaemonConfig,
    changes_tx: mpsc::Sender<FileChange>,
) -> Result<JoinHandle<()>> {
    let mut watcher = FileWatcher::new(WatcherOptions {
        debounce_duration: Duration::from_millis(config.index.debounce_ms),
        file_patterns: config.index.file_patterns.clone(),
    })?;

    for root in &config.index.paths {
        if let Err(e) = watcher.watch(root) {
            warn!(root = ?root, error = %e, "Cannot watch root");
        }
    }

    Ok(tokio::spawn(async move {
        while let Some(change) = watcher.next().await {
            if changes_tx.send(change).await.is_err() {
                break;
            }
        }
    }))
}

/// Log every change; with `reindex` set, run a full pass once a burst of
/// changes has gone quiet.
async fn process_changes(
    catalog: Arc<Catalog>,
    metrics: Arc<Metrics>,
    mut changes_rx: mpsc::Receiver<FileChange>,
    reindex: bool,
    quiet_period: Duration,
) {
    let mut batcher = ChangeBatcher::new(quiet_period);
    let mut tick = tokio::time::interval(quiet_period.max(Duration::from_millis(50)));

    loop {
        tokio::select! {
            change = changes_rx.recv() => {
                let Some(change) = change else { break };
                info!(path = ?change.path, kind = %change.kind, "Detected change in path");
                metrics.record_file_change();
                if reindex {
                    batcher.add(change);
                }
            }
            _ = tick.tick(), if reindex => {
                if !batcher.is_ready() {
                    continue;
                }
                let changes = batcher.take();
                info!(changes = changes.len(), "Reindexing after changes");
                metrics.record_reindex();
                if let Err(e) = catalog.run_indexing_pass().await {
                    warn!(error = %e, "Indexing pass after changes failed");
                }
            }
        }
    }
}

/// Check if a process is running by PID
fn is_process_running(pid: u32) -> bool {
    // Signal 0 only probes for existence
    unsafe { libc::kill(pid as i32, 0) == 0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use termdex_indexer::{CatalogOptions, ChangeKind, TextPattern};
    use tempfile::tempdir;

    fn config_in(dir: &std::path::Path) -> DaemonConfig {
        let mut config = DaemonConfig::default();
        config.socket_path = dir.join("termdex.sock");
        config.pid_file = dir.join("termdex.pid");
        config
    }

    #[test]
    fn test_is_process_running() {
        assert!(is_process_running(std::process::id()));
        assert!(!is_process_running(999_999_999));
    }

    #[test]
    fn test_pid_lock_refuses_live_process() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        std::fs::write(&config.pid_file, std::process::id().to_string()).unwrap();

        let daemon = Daemon::new(config.clone());
        assert!(daemon.acquire_pid_lock().is_err());
        drop(daemon);

        assert!(config.pid_file.exists());
    }

    #[test]
    fn test_pid_lock_replaces_stale_file() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        std::fs::write(&config.pid_file, "999999999").unwrap();

        let daemon = Daemon::new(config.clone());
        daemon.acquire_pid_lock().unwrap();
        assert_eq!(
            std::fs::read_to_string(&config.pid_file).unwrap(),
            std::process::id().to_string()
        );

        drop(daemon);
        assert!(!config.pid_file.exists());
    }

    #[tokio::test]
    async fn test_change_loop_reindexes_after_quiet_period() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "TODO:alice").unwrap();

        let catalog = Arc::new(Catalog::new(CatalogOptions {
            paths: vec![dir.path().to_path_buf()],
            file_patterns: vec![".txt".to_string()],
            text_patterns: vec![TextPattern::new(r"(?i)TODO:(\w+)", 1)],
            ..CatalogOptions::default()
        }));
        let metrics = Arc::new(Metrics::new());
        let (tx, rx) = mpsc::channel(8);

        let task = tokio::spawn(process_changes(
            catalog.clone(),
            metrics.clone(),
            rx,
            true,
            Duration::from_millis(20),
        ));

        tx.send(FileChange {
            path: PathBuf::from("a.txt"),
            kind: ChangeKind::Modified,
        })
        .await
        .unwrap();

        for _ in 0..100 {
            if catalog.passes_completed().await > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        task.abort();

        assert_eq!(catalog.passes_completed().await, 1);
        assert!(catalog.lookup_exact("alice").await.is_some());
    }

    #[tokio::test]
    async fn test_change_loop_without_reindex_only_counts() {
        let catalog = Arc::new(Catalog::new(CatalogOptions::default()));
        let metrics = Arc::new(Metrics::new());
        let (tx, rx) = mpsc::channel(8);

        let task = tokio::spawn(process_changes(
            catalog.clone(),
            metrics.clone(),
            rx,
            false,
            Duration::from_millis(10),
        ));

        tx.send(FileChange {
            path: PathBuf::from("a.txt"),
            kind: ChangeKind::Created,
        })
        .await
        .unwrap();
        drop(tx);
        task.await.unwrap();

        assert_eq!(metrics.file_changes.load(Ordering::Relaxed), 1);
        assert_eq!(catalog.passes_completed().await, 0);
    }
}
