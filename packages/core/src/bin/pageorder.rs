//! Command-line driver for the ordering engine
//!
//! Loads a paged document from a JSON file of nodes into an in-memory store,
//! runs one reorder submission against it and prints the result.
//!
//! # Usage
//!
//! ```bash
//! # Flat submission
//! cargo run --bin pageorder -- book.json "p3,p1,p2"
//!
//! # Nested submission read from a file, dumping every node afterwards
//! cargo run --bin pageorder -- book.json @submission.json --dump
//! ```
//!
//! The outcome notice goes to stderr; the reordered document tree (and with
//! `--dump` the full node list) goes to stdout as JSON.
//!
//! # Configuration
//!
//! - `RUST_LOG` controls log output (default `info`)
//! - `PAGEORDER_MAX_DEPTH`, `PAGEORDER_MAX_ENTRIES`, `PAGEORDER_VERIFY_AFTER_APPLY`
//!   tune the engine (see `OrderingConfig::from_env`)

use anyhow::{bail, Context};
use pageorder_core::db::{InMemoryStore, NodeStore};
use pageorder_core::services::OrderService;
use pageorder_core::{Node, OrderingConfig};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: pageorder <document.json> <submission | @file> [--dump]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let dump = args.iter().any(|a| a == "--dump");
    let positional: Vec<&String> = args.iter().filter(|a| *a != "--dump").collect();
    let [document_path, submission_arg] = positional.as_slice() else {
        bail!(USAGE);
    };

    let config = OrderingConfig::from_env();
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    let submission = match submission_arg.strip_prefix('@') {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read submission from {}", path))?,
        None => submission_arg.to_string(),
    };

    let store = Arc::new(
        InMemoryStore::from_json_file(document_path.as_str())
            .await
            .with_context(|| format!("Failed to load document {}", document_path))?,
    );

    let roots: Vec<String> = store
        .list_nodes()
        .await?
        .into_iter()
        .filter(Node::is_root)
        .map(|n| n.id)
        .collect();
    let [root_id] = roots.as_slice() else {
        bail!(
            "{} must contain exactly one paged node, found {}",
            document_path,
            roots.len()
        );
    };

    let service = OrderService::with_config(store.clone(), config);
    let outcome = service.reorder(root_id, Some(&submission)).await?;
    eprintln!("{}", outcome.notice());

    let tree = service.document_tree(root_id).await?;
    println!("{}", serde_json::to_string_pretty(&tree)?);

    if dump {
        let mut nodes = store.list_nodes().await?;
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        println!("{}", serde_json::to_string_pretty(&nodes)?);
    }

    Ok(())
}
