//! patchwire command-line tools.
//!
//! Provides the `patchwire` binary for working with engine output offline:
//!
//! - `inspect` validates a single graph snapshot and prints its contents
//! - `replay` feeds a JSON-lines log of engine messages through the same
//!   sync layer the editor uses and prints every graph it ends up with
//!
//! Log verbosity follows `RUST_LOG`; logs go to stderr.

mod report;

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use patchwire_core::NodeLayout;
use patchwire_sync::{EditorContext, NodeGraph, NullTransport, SyncConfig, SyncError};

use crate::report::{snapshot_payload, GraphReport};

/// Exit code for a rejected snapshot or message.
const EXIT_INVALID: i32 = 1;
/// Exit code for unreadable input.
const EXIT_IO: i32 = 3;

/// Inspect and replay patchwire graph snapshots.
#[derive(Parser)]
#[command(name = "patchwire", about = "Inspect and replay patchwire graph snapshots")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a graph snapshot and list its nodes and connections.
    Inspect {
        /// A bare graph or a `graph/updateGraph` message, as JSON.
        path: PathBuf,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Apply a JSON-lines log of engine messages in order.
    Replay {
        /// One engine message per line; blank lines are skipped.
        path: PathBuf,

        /// Print the reports as JSON.
        #[arg(long)]
        json: bool,

        /// Stop at the first message that fails to apply.
        #[arg(long)]
        strict: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let exit_code = match cli.command {
        Commands::Inspect { path, json } => run_inspect(&path, json),
        Commands::Replay { path, json, strict } => run_replay(&path, json, strict).await,
    };
    process::exit(exit_code);
}

/// Execute the inspect subcommand.
///
/// Returns exit code: 0 = valid snapshot, 1 = rejected snapshot, 3 = I/O error.
fn run_inspect(path: &Path, json: bool) -> i32 {
    let value = match read_json(path) {
        Ok(value) => value,
        Err(code) => return code,
    };
    let (graph_index, payload) = match snapshot_payload(value) {
        Ok(parts) => parts,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return EXIT_INVALID;
        }
    };

    let mut graph = NodeGraph::new(graph_index, Arc::new(NullTransport), NodeLayout::default());
    if let Err(e) = graph.apply_json(payload) {
        eprintln!("Error: {}", e);
        return EXIT_INVALID;
    }

    print_reports(&[GraphReport::from_graph(&graph)], json);
    0
}

/// Execute the replay subcommand.
///
/// Returns exit code: 0 = every message applied, 1 = at least one message
/// rejected or invalid configuration, 3 = I/O error.
async fn run_replay(path: &Path, json: bool, strict: bool) -> i32 {
    let config = match SyncConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return EXIT_INVALID;
        }
    };
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            eprintln!("Error: failed to read '{}': {}", path.display(), e);
            return EXIT_IO;
        }
    };

    tracing::info!(path = %path.display(), "replaying engine log");
    let context = EditorContext::new(config, Arc::new(NullTransport));
    let mut failures = 0usize;
    for (number, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let result = match serde_json::from_str(line) {
            Ok(message) => context.graphs.handle_message(message).await,
            Err(e) => Err(SyncError::MalformedMessage(e)),
        };
        if let Err(e) = result {
            eprintln!("line {}: {}", number + 1, e);
            failures += 1;
            if strict {
                return EXIT_INVALID;
            }
        }
    }

    let mut reports = Vec::new();
    for graph_index in context.graphs.graph_indices().await {
        let Some(graph) = context.graphs.cached_graph(graph_index).await else {
            continue;
        };
        let parent = context.graphs.parent_of(graph_index).await;
        let report = GraphReport::from_graph(&*graph.lock().await).with_parent(parent);
        reports.push(report);
    }
    print_reports(&reports, json);

    let sockets = context.registry.read().await.len();
    if !json && sockets > 0 {
        println!("{} registered socket(s)", sockets);
    }

    if failures > 0 {
        eprintln!("{} message(s) rejected", failures);
        EXIT_INVALID
    } else {
        0
    }
}

fn read_json(path: &Path) -> Result<serde_json::Value, i32> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        eprintln!("Error: failed to read '{}': {}", path.display(), e);
        EXIT_IO
    })?;
    serde_json::from_str(&contents).map_err(|e| {
        eprintln!("Error: '{}' is not valid JSON: {}", path.display(), e);
        EXIT_INVALID
    })
}

fn print_reports(reports: &[GraphReport], json: bool) {
    if json {
        let out = serde_json::to_string_pretty(reports)
            .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize report: {}\"}}", e));
        println!("{}", out);
    } else {
        for report in reports {
            print!("{}", report);
        }
    }
}
