use anyhow::Result;
use clap::Parser;
use recall_gateway::{RecallConfig, init_tracing, run_worker};
use std::path::PathBuf;

/// recall worker: serves index and search requests as JSON lines on stdin/stdout
#[derive(Parser, Debug)]
#[command(name = "recall-worker", version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Database directory used when init names none
    #[arg(long, value_name = "DIR")]
    db: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries protocol lines, so logs go to stderr
    init_tracing("info");

    let args = Args::parse();
    let mut config = RecallConfig::load_or_default(args.config.as_deref())?;
    if let Some(db) = args.db {
        config = config.with_db_path(db);
    }

    run_worker(config).await
}
