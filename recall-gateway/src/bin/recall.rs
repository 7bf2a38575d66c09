use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use recall_gateway::client::WorkerClient;
use recall_gateway::protocol::{Request, Response};
use recall_gateway::{RecallConfig, init_tracing};
use recall_retriever::retrieval::query::SearchResult;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::info;

const DEFAULT_DB_DIR: &str = ".recall";
const JSON_SEARCH_LIMIT: usize = 10;
const PREVIEW_CHARS: usize = 300;

/// Local semantic memory: index text files, then search them by meaning
#[derive(Parser, Debug)]
#[command(name = "recall", version)]
struct Cli {
    /// Database directory [default: .recall]
    #[arg(long, global = true, value_name = "DIR")]
    db: Option<PathBuf>,

    /// TOML configuration file, also handed to the worker
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Worker executable [default: recall-worker next to this binary]
    #[arg(long, global = true, value_name = "PATH")]
    worker: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Index a file, or every matching file below a directory
    Index {
        path: PathBuf,
        /// Re-embed files even when their content is unchanged
        #[arg(long)]
        force: bool,
        /// Extensions to index in a directory, comma separated
        #[arg(long, value_delimiter = ',')]
        extensions: Vec<String>,
    },
    /// Search indexed text
    #[command(visible_aliases = ["query", "q"])]
    Search {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Show index statistics
    Stats,
    /// Remove every indexed chunk and fingerprint
    Clear,
    /// Search and print the raw response as JSON
    Json {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
        #[arg(short, long, default_value_t = JSON_SEARCH_LIMIT)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() {
    // Worker logs are relayed at info; keep them quiet unless asked for
    init_tracing("warn");

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = RecallConfig::load_or_default(cli.config.as_deref())?;
    let db = cli
        .db
        .or_else(|| config.session.db_path.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_DIR));
    let db = std::path::absolute(&db)
        .with_context(|| format!("Invalid database path {}", db.display()))?;

    let worker = match cli.worker {
        Some(worker) => worker,
        None => default_worker_path()?,
    };
    let mut args: Vec<OsString> = vec!["--db".into(), db.clone().into_os_string()];
    if let Some(config_path) = &cli.config {
        args.push("--config".into());
        args.push(config_path.clone().into_os_string());
    }

    let mut client = WorkerClient::spawn(&worker, &args).await?;
    let outcome = execute(&mut client, &db, cli.command).await;
    let closed = client.close().await;
    outcome?;
    closed
}

async fn execute(client: &mut WorkerClient, db: &Path, command: Commands) -> Result<()> {
    let init = expect_ok(
        client
            .request(&Request::Init {
                db_path: Some(db.to_path_buf()),
            })
            .await?,
    )?;
    info!("Database ready ({} chunks indexed)", init.count.unwrap_or(0));

    match command {
        Commands::Index {
            path,
            force,
            extensions,
        } => {
            let path = std::path::absolute(&path)?;
            let metadata = tokio::fs::metadata(&path)
                .await
                .with_context(|| format!("Cannot read {}", path.display()))?;

            if metadata.is_dir() {
                let request = Request::IndexDir {
                    path,
                    force,
                    extensions: (!extensions.is_empty()).then_some(extensions),
                };
                let response = expect_ok(client.request(&request).await?)?;
                println!(
                    "Indexed {} files ({} skipped)",
                    response.indexed.unwrap_or(0),
                    response.skipped.unwrap_or(0)
                );
                for failure in response.failures.iter().flatten() {
                    eprintln!("Failed: {}: {}", failure.path.display(), failure.error);
                }
            } else {
                let response = expect_ok(client.request(&Request::IndexFile { path, force }).await?)?;
                println!("Status: {}", response.status);
                if let Some(chunks) = response.chunks.filter(|&c| c > 0) {
                    println!("Chunks: {chunks}");
                }
            }
        }
        Commands::Search { query, limit } => {
            let request = Request::Search {
                query: query.join(" "),
                limit,
            };
            let response = expect_ok(client.request(&request).await?)?;
            print_results(response.results.as_deref().unwrap_or_default());
        }
        Commands::Stats => {
            let response = expect_ok(client.request(&Request::Stats).await?)?;
            println!("Indexed chunks: {}", response.count.unwrap_or(0));
            println!("Tracked files: {}", response.files.unwrap_or(0));
        }
        Commands::Clear => {
            expect_ok(client.request(&Request::Clear).await?)?;
            println!("Database cleared.");
        }
        Commands::Json { query, limit } => {
            let request = Request::Search {
                query: query.join(" "),
                limit: Some(limit),
            };
            let response = expect_ok(client.request(&request).await?)?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }
    Ok(())
}

fn expect_ok(response: Response) -> Result<Response> {
    if response.is_error() {
        bail!("{}", response.error_message());
    }
    Ok(response)
}

fn default_worker_path() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("Cannot locate the recall executable")?;
    let dir = exe
        .parent()
        .context("The recall executable has no parent directory")?;
    Ok(dir.join(format!("recall-worker{}", std::env::consts::EXE_SUFFIX)))
}

fn print_results(results: &[SearchResult]) {
    if results.is_empty() {
        println!("No results found.");
        return;
    }
    for (i, result) in results.iter().enumerate() {
        println!("\n--- Result {} ({:.2}) ---", i + 1, result.score);
        println!("File: {}", result.filename);
        println!("Path: {}", result.path);
        println!("Content:\n{}", preview(&result.text));
    }
}

fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
