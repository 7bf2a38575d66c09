//! # recall-gateway
//!
//! The process boundary of recall. A `recall-worker` process owns one index
//! database and one embedding model, and answers newline-delimited JSON
//! requests on stdin with JSON responses on stdout. Logs go to stderr.
//!
//! ## Architecture
//!
//! - [`protocol`]: request and response messages and the line codec
//! - [`session`]: the per-process state machine that serves requests
//! - [`client`]: spawns a worker and talks to it, relaying its log
//! - [`config`]: the TOML configuration both binaries read
//!
//! The indexing and search work itself lives in `recall-retriever`, with
//! chunking from `recall-context` and embeddings from `recall-embed`.
//!
//! ## Protocol
//!
//! ```text
//! worker → {"status":"ready"}
//! client → {"cmd":"init","db_path":"/home/me/.recall"}
//! worker → {"status":"ok","db_path":"/home/me/.recall","count":0}
//! client → {"cmd":"index_dir","path":"/home/me/notes"}
//! worker → {"status":"ok","indexed":12,"skipped":3,"filtered":3,"unchanged":0,"failed":0}
//! client → {"cmd":"search","query":"sqlite tuning","limit":2}
//! worker → {"status":"ok","results":[{"id":"…","score":0.71,"text":"…","path":"…","filename":"…","chunk_idx":0}, …]}
//! client → {"cmd":"quit"}
//! worker → {"status":"ok"}
//! ```
//!
//! ## Using the worker from Rust
//!
//! ```no_run
//! use recall_gateway::client::WorkerClient;
//! use recall_gateway::protocol::Request;
//! use std::path::Path;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let mut worker = WorkerClient::spawn(Path::new("recall-worker"), ["--db", ".recall"]).await?;
//! worker.request(&Request::Init { db_path: None }).await?;
//! let response = worker
//!     .request(&Request::Search { query: "release checklist".into(), limit: Some(3) })
//!     .await?;
//! println!("{:?}", response.results);
//! worker.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod protocol;
pub mod session;

pub use config::RecallConfig;
pub use session::Session;

use anyhow::Result;
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Install a stderr `fmt` subscriber. `RUST_LOG` overrides `default_filter`.
pub fn init_tracing(default_filter: &str) {
    use std::io::IsTerminal;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();
}

/// Serve the worker protocol on this process's stdin and stdout until quit or EOF.
pub async fn run_worker(config: RecallConfig) -> Result<()> {
    let mut session = Session::new(config)?;
    info!(
        "Starting recall worker (db: {})",
        session
            .config()
            .session
            .db_path
            .as_ref()
            .map_or_else(|| "from init".to_string(), |p| p.display().to_string())
    );

    let stdin = BufReader::new(tokio::io::stdin());
    session.serve(stdin, tokio::io::stdout()).await
}
