//! Runs the real `recall-worker` binary through `WorkerClient`.

use anyhow::Result;
use recall_gateway::client::WorkerClient;
use recall_gateway::protocol::{Request, Status};
use std::path::{Path, PathBuf};
use tempfile::tempdir;

const HASH_CONFIG: &str = r#"
[embedding]
provider = "hash"
dimension = 64

[session]
search_limit = 3
"#;

fn worker_binary() -> &'static Path {
    Path::new(env!("CARGO_BIN_EXE_recall-worker"))
}

async fn spawn(dir: &Path) -> Result<(WorkerClient, PathBuf)> {
    let config = dir.join("recall.toml");
    tokio::fs::write(&config, HASH_CONFIG).await?;
    let db = dir.join("db");

    let mut args = vec!["--config".into(), config.into_os_string()];
    args.extend(["--db".into(), db.clone().into_os_string()]);
    let client = WorkerClient::spawn(worker_binary(), &args).await?;
    Ok((client, db))
}

#[tokio::test]
async fn test_worker_round_trip() -> Result<()> {
    let dir = tempdir()?;
    let (mut client, db) = spawn(dir.path()).await?;

    let init = client.request(&Request::Init { db_path: None }).await?;
    assert_eq!(init.status, Status::Ok);
    assert_eq!(init.db_path, Some(db.display().to_string()));
    assert_eq!(init.count, Some(0));

    let notes = dir.path().join("notes");
    tokio::fs::create_dir_all(&notes).await?;
    for (name, text) in [
        ("wal.md", "sqlite write ahead log checkpoints"),
        ("fruit.md", "mangoes and papayas"),
        ("tea.md", "green tea steeping times"),
        ("bikes.md", "fixing a bicycle chain"),
    ] {
        tokio::fs::write(notes.join(name), text).await?;
    }

    let report = client
        .request(&Request::IndexDir {
            path: notes.clone(),
            force: false,
            extensions: None,
        })
        .await?;
    assert_eq!(report.indexed, Some(4));
    assert_eq!(report.skipped, Some(0));

    let search = client
        .request(&Request::Search {
            query: "write ahead log".to_string(),
            limit: None,
        })
        .await?;
    let results = search.results.unwrap_or_default();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].filename, "wal.md");

    let stats = client.request(&Request::Stats).await?;
    assert_eq!(stats.count, Some(4));

    client.close().await
}

#[tokio::test]
async fn test_worker_error_responses() -> Result<()> {
    let dir = tempdir()?;
    let (mut client, _db) = spawn(dir.path()).await?;

    let response = client.request(&Request::Stats).await?;
    assert!(response.is_error());
    assert_eq!(response.error_message(), "not initialized");

    client.request(&Request::Init { db_path: None }).await?;
    let response = client
        .request(&Request::IndexFile {
            path: dir.path().join("nowhere.md"),
            force: false,
        })
        .await?;
    assert_eq!(response.status, Status::Error);

    client.close().await
}

#[tokio::test]
async fn test_missing_worker_binary() {
    let result = WorkerClient::spawn(Path::new("/nonexistent/recall-worker"), ["--db", "x"]).await;
    assert!(result.is_err());
}
