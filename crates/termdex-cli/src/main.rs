//! termdex CLI
//!
//! Command-line interface for the termdex daemon: start and stop it, and
//! query its term index.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use termdex_indexer::{PassReport, TermRecord};
use termdex_ipc::{IpcClient, DEFAULT_SOCKET_PATH};

#[derive(Parser)]
#[command(name = "termdex")]
#[command(about = "termdex - regex term index over your text files")]
#[command(version)]
struct Cli {
    /// Daemon socket path
    #[arg(long, global = true, default_value = DEFAULT_SOCKET_PATH)]
    socket: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the termdex daemon
    Start {
        /// Run in foreground (for debugging)
        #[arg(short, long)]
        foreground: bool,

        /// Configuration file passed to the daemon
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Stop the termdex daemon
    Stop,

    /// Show daemon status
    Status,

    /// Check if daemon is running
    Ping,

    /// Look up a term exactly (case-insensitive)
    Lookup {
        term: String,

        /// Print the raw record as JSON
        #[arg(long)]
        json: bool,
    },

    /// List terms containing the given text
    Search {
        term: String,

        /// Print the raw records as JSON
        #[arg(long)]
        json: bool,
    },

    /// Re-run indexing over all configured paths
    Reindex,

    /// Dump the term tree as JSON
    Dump {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt().with_target(false).init();
    }

    let cli = Cli::parse();
    let client = IpcClient::with_socket_path(&cli.socket);

    match cli.command {
        Commands::Start { foreground, config } => cmd_start(&cli.socket, foreground, config).await,
        Commands::Stop => cmd_stop(&client).await,
        Commands::Status => cmd_status(&client).await,
        Commands::Ping => cmd_ping(&client).await,
        Commands::Lookup { term, json } => cmd_lookup(&client, &term, json).await,
        Commands::Search { term, json } => cmd_search(&client, &term, json).await,
        Commands::Reindex => cmd_reindex(&client).await,
        Commands::Dump { output } => cmd_dump(&client, output).await,
    }
}

fn daemon_command(socket: &Path, config: Option<PathBuf>) -> std::process::Command {
    let mut command = std::process::Command::new("termdex-daemon");
    command.arg("--socket").arg(socket);
    if let Some(config) = config {
        command.arg("--config").arg(config);
    }
    command
}

async fn cmd_start(socket: &Path, foreground: bool, config: Option<PathBuf>) -> Result<()> {
    if IpcClient::with_socket_path(socket).is_daemon_running() {
        println!("termdex daemon is already running.");
        return Ok(());
    }

    if foreground {
        println!("Starting termdex daemon in foreground...");
        println!("Press Ctrl+C to stop.");

        let status = daemon_command(socket, config)
            .status()
            .context("Failed to start daemon. Is termdex-daemon in PATH?")?;

        if !status.success() {
            anyhow::bail!("Daemon exited with error");
        }
    } else {
        let child = daemon_command(socket, config)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .context("Failed to start daemon. Is termdex-daemon in PATH?")?;

        println!("✓ termdex daemon started (PID: {})", child.id());
        println!("  The first index is built before the socket opens.");
    }

    Ok(())
}

async fn cmd_stop(client: &IpcClient) -> Result<()> {
    if !client.is_daemon_running() {
        println!("termdex daemon is not running.");
        return Ok(());
    }

    match client.shutdown().await {
        Ok(()) => {
            println!("✓ termdex daemon stopping...");

            tokio::time::sleep(std::time::Duration::from_millis(500)).await;

            if !client.is_daemon_running() {
                println!("✓ Daemon stopped.");
            }
        }
        Err(e) => {
            println!("Failed to stop daemon: {}", e);
        }
    }

    Ok(())
}

async fn cmd_status(client: &IpcClient) -> Result<()> {
    if !client.is_daemon_running() {
        println!("termdex daemon is not running.");
        println!("\nStart with: termdex start");
        return Ok(());
    }

    match client.get_status().await {
        Ok(status) => {
            println!("termdex daemon v{}", status.version);
            println!();
            println!("  Status:      Running");
            println!("  Uptime:      {}", format_duration(status.uptime_secs));
            println!("  Terms:       {}", status.term_count);
            println!("  Passes:      {}", status.passes_completed);
            if let Some(pass) = &status.last_pass {
                println!("  Last pass:   {}", summarize_pass(pass));
            }
            println!();
            println!("  Requests:    {}", status.requests_total);
            println!("  Avg Latency: {:.2}ms", status.avg_latency_ms);
            println!("  P99 Latency: {:.2}ms", status.p99_latency_ms);
        }
        Err(e) => {
            println!("Failed to get status: {}", e);
        }
    }

    Ok(())
}

async fn cmd_ping(client: &IpcClient) -> Result<()> {
    if !client.is_daemon_running() {
        println!("✗ Daemon not running");
        return Ok(());
    }

    let start = std::time::Instant::now();
    match client.ping().await {
        Ok(_) => {
            let elapsed = start.elapsed();
            println!("✓ Pong! ({:.2}ms)", elapsed.as_secs_f64() * 1000.0);
        }
        Err(e) => {
            println!("✗ Error: {}", e);
        }
    }

    Ok(())
}

async fn cmd_lookup(client: &IpcClient, term: &str, json: bool) -> Result<()> {
    match client.lookup(term).await.context("Lookup failed")? {
        Some(record) if json => println!("{}", serde_json::to_string_pretty(&record)?),
        Some(record) => print!("{}", render_term(&record)),
        None => println!("No such term: {}", term),
    }

    Ok(())
}

async fn cmd_search(client: &IpcClient, term: &str, json: bool) -> Result<()> {
    let records = client.search(term).await.context("Search failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No terms contain: {}", term);
        return Ok(());
    }

    for record in &records {
        println!(
            "{}  ({} documents, {} matches)",
            record.key,
            record.documents.len(),
            record.match_count()
        );
    }

    Ok(())
}

async fn cmd_reindex(client: &IpcClient) -> Result<()> {
    println!("Reindexing...");
    let report = client.reindex().await.context("Reindex failed")?;

    println!("✓ {}", summarize_pass(&report));
    for failure in &report.errors {
        println!("  ✗ {}: {}", failure.path, failure.message);
    }

    Ok(())
}

async fn cmd_dump(client: &IpcClient, output: Option<PathBuf>) -> Result<()> {
    let snapshot = client.snapshot().await.context("Snapshot failed")?;
    let json = snapshot.to_json_pretty()?;

    match output {
        Some(path) => {
            std::fs::write(&path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!(
                "✓ Wrote {} nodes to {}",
                snapshot.tree.node_count,
                path.display()
            );
        }
        None => println!("{}", json),
    }

    Ok(())
}

fn render_term(record: &TermRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}  ({} documents, {} matches)",
        record.key,
        record.documents.len(),
        record.match_count()
    );
    for document in &record.documents {
        let _ = writeln!(out, "  {}", document.document_name);
        for m in &document.matches {
            let _ = writeln!(out, "    @{:<8} {}", m.location, m.matched);
        }
    }
    out
}

fn summarize_pass(report: &PassReport) -> String {
    format!(
        "{} files ({} failed), {} new nodes in {}ms",
        report.files_scanned, report.files_failed, report.nodes_created, report.elapsed_ms
    )
}

fn format_duration(secs: u64) -> String {
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs < 86400 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else {
        format!("{}d {}h", secs / 86400, (secs % 86400) / 3600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use termdex_indexer::{DocumentRecord, MatchRecord};

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(42), "42s");
        assert_eq!(format_duration(125), "2m 5s");
        assert_eq!(format_duration(7260), "2h 1m");
        assert_eq!(format_duration(90000), "1d 1h");
    }

    #[test]
    fn test_render_term() {
        let mut document = DocumentRecord::new("a.txt");
        document.add_match(MatchRecord {
            location: 4,
            matched: "TODO:alice".to_string(),
            captures: vec![],
        });
        let rendered = render_term(&TermRecord::with_document("alice", document));

        assert!(rendered.starts_with("alice  (1 documents, 1 matches)"));
        assert!(rendered.contains("  a.txt\n"));
        assert!(rendered.contains("@4"));
        assert!(rendered.contains("TODO:alice"));
    }

    #[test]
    fn test_cli_parses_global_socket() {
        let cli = Cli::try_parse_from(["termdex", "lookup", "alice", "--socket", "/tmp/x.sock"])
            .unwrap();
        assert_eq!(cli.socket, PathBuf::from("/tmp/x.sock"));
        assert!(matches!(cli.command, Commands::Lookup { json: false, .. }));
    }
}
