//! Drives `Session::serve` line by line over in-memory pipes, the way a client
//! process sees the worker.

use anyhow::{Context, Result};
use recall_embed::HashEmbedProvider;
use recall_gateway::protocol::{Response, Status};
use recall_gateway::{RecallConfig, Session};
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines};
use tokio::task::JoinHandle;

struct Worker {
    input: DuplexStream,
    output: Lines<BufReader<DuplexStream>>,
    task: JoinHandle<Result<()>>,
}

impl Worker {
    async fn start(config: RecallConfig) -> Result<Self> {
        let (input, server_input) = tokio::io::duplex(64 * 1024);
        let (server_output, output) = tokio::io::duplex(64 * 1024);

        let mut session =
            Session::new(config)?.with_provider(Arc::new(HashEmbedProvider::with_dimension(64)));
        let task = tokio::spawn(async move {
            session
                .serve(BufReader::new(server_input), server_output)
                .await
        });

        let mut worker = Self {
            input,
            output: BufReader::new(output).lines(),
            task,
        };
        assert_eq!(worker.recv().await?, Response::ready());
        Ok(worker)
    }

    async fn send(&mut self, line: &str) -> Result<()> {
        self.input.write_all(line.as_bytes()).await?;
        self.input.write_all(b"\n").await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Response> {
        let line = self
            .output
            .next_line()
            .await?
            .context("worker closed its output")?;
        Ok(serde_json::from_str(&line)?)
    }

    async fn call(&mut self, line: &str) -> Result<Response> {
        self.send(line).await?;
        self.recv().await
    }

    /// Wait for the session to end and check it wrote nothing more.
    async fn finished(mut self) -> Result<()> {
        self.task.await??;
        assert!(self.output.next_line().await?.is_none());
        Ok(())
    }
}

fn init_line(db: &Path) -> String {
    serde_json::json!({"cmd": "init", "db_path": db}).to_string()
}

fn text_of_len(len: usize) -> String {
    "the quick brown fox jumps over the lazy dog "
        .chars()
        .cycle()
        .take(len)
        .collect()
}

#[tokio::test]
async fn test_requests_before_init_and_quit() -> Result<()> {
    let mut worker = Worker::start(RecallConfig::default()).await?;

    let response = worker.call(r#"{"cmd":"stats"}"#).await?;
    assert_eq!(response.status, Status::Error);
    assert_eq!(response.error.as_deref(), Some("not initialized"));

    let response = worker.call(r#"{"cmd":"search","query":"fox"}"#).await?;
    assert_eq!(response.error.as_deref(), Some("not initialized"));

    assert_eq!(worker.call(r#"{"cmd":"quit"}"#).await?, Response::ok());
    worker.finished().await
}

#[tokio::test]
async fn test_unknown_command_keeps_serving() -> Result<()> {
    let dir = tempdir()?;
    let mut worker = Worker::start(RecallConfig::default()).await?;

    let response = worker.call(r#"{"cmd":"explode"}"#).await?;
    assert!(response.is_error());
    assert!(response.error_message().contains("explode"));

    let response = worker.call(r#"{"query":"no command"}"#).await?;
    assert!(response.is_error());

    // Blank lines get no response
    worker.send("").await?;
    worker.send("   ").await?;

    let response = worker.call(&init_line(&dir.path().join("db"))).await?;
    assert_eq!(response.status, Status::Ok);
    assert_eq!(response.count, Some(0));

    drop(worker.input);
    worker.task.await??;
    Ok(())
}

#[tokio::test]
async fn test_malformed_line_terminates() -> Result<()> {
    let mut worker = Worker::start(RecallConfig::default()).await?;

    let response = worker.call("{this is not json").await?;
    assert!(response.is_error());
    assert!(response.error_message().starts_with("malformed request"));

    worker.finished().await
}

#[tokio::test]
async fn test_invalid_utf8_line_is_answered_then_terminates() -> Result<()> {
    let mut worker = Worker::start(RecallConfig::default()).await?;

    worker.input.write_all(&[b'{', 0xff, 0xfe, b'}', b'\n']).await?;
    let response = worker.recv().await?;
    assert!(response.is_error());
    assert_eq!(response.error_message(), "malformed request: invalid UTF-8");

    worker.finished().await
}

#[tokio::test]
async fn test_end_of_input_terminates() -> Result<()> {
    let worker = Worker::start(RecallConfig::default()).await?;
    let Worker {
        input,
        mut output,
        task,
    } = worker;
    drop(input);
    task.await??;
    assert!(output.next_line().await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_index_search_stats_clear() -> Result<()> {
    let dir = tempdir()?;
    let notes = dir.path().join("notes");
    tokio::fs::create_dir_all(notes.join("node_modules")).await?;
    tokio::fs::write(notes.join("long.md"), text_of_len(1200)).await?;
    tokio::fs::write(notes.join("fruit.txt"), "mangoes and papayas ripen in summer").await?;
    tokio::fs::write(notes.join("logo.png"), [0u8, 1, 2, 3]).await?;
    tokio::fs::write(notes.join("node_modules").join("dep.md"), "vendored").await?;

    let mut worker = Worker::start(RecallConfig::default()).await?;
    worker.call(&init_line(&dir.path().join("db"))).await?;

    let request = serde_json::json!({"cmd": "index_file", "path": notes.join("long.md")});
    let response = worker.call(&request.to_string()).await?;
    assert_eq!(response.status, Status::Indexed);
    assert_eq!(response.chunks, Some(3));

    let response = worker.call(&request.to_string()).await?;
    assert_eq!(response.status, Status::Unchanged);
    assert_eq!(response.reason.as_deref(), Some("unchanged"));

    let request = serde_json::json!({"cmd": "index_dir", "path": &notes});
    let response = worker.call(&request.to_string()).await?;
    assert_eq!(response.status, Status::Ok);
    assert_eq!(response.indexed, Some(1));
    assert_eq!(response.unchanged, Some(1));
    // logo.png and node_modules/
    assert_eq!(response.filtered, Some(2));
    assert_eq!(response.skipped, Some(3));
    assert_eq!(response.failed, Some(0));

    let response = worker.call(r#"{"cmd":"stats"}"#).await?;
    assert_eq!(response.count, Some(4));
    assert_eq!(response.files, Some(2));

    let response = worker
        .call(r#"{"cmd":"search","query":"mangoes papayas summer","limit":2}"#)
        .await?;
    let results = response.results.context("search returns results")?;
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].filename, "fruit.txt");
    assert!(results[0].score >= results[1].score);

    // Default limit comes from the config
    let response = worker.call(r#"{"cmd":"search","query":"fox"}"#).await?;
    assert_eq!(response.results.map(|r| r.len()), Some(4));

    assert_eq!(worker.call(r#"{"cmd":"clear"}"#).await?, Response::ok());
    let response = worker.call(r#"{"cmd":"stats"}"#).await?;
    assert_eq!(response.count, Some(0));
    assert_eq!(response.files, Some(0));

    assert_eq!(worker.call(r#"{"cmd":"quit"}"#).await?, Response::ok());
    worker.finished().await
}

#[tokio::test]
async fn test_index_dir_extension_override() -> Result<()> {
    let dir = tempdir()?;
    let notes = dir.path().join("notes");
    tokio::fs::create_dir_all(&notes).await?;
    tokio::fs::write(notes.join("a.md"), "markdown notes").await?;
    tokio::fs::write(notes.join("b.rst"), "restructured notes").await?;

    let config = RecallConfig::default().with_db_path(dir.path().join("db"));
    let mut worker = Worker::start(config).await?;
    worker.call(r#"{"cmd":"init"}"#).await?;

    let request = serde_json::json!({"cmd": "index_dir", "path": &notes, "extensions": [".rst"]});
    let response = worker.call(&request.to_string()).await?;
    assert_eq!(response.indexed, Some(1));
    assert_eq!(response.filtered, Some(1));
    Ok(())
}

#[tokio::test]
async fn test_index_errors_are_responses() -> Result<()> {
    let dir = tempdir()?;
    let mut worker = Worker::start(RecallConfig::default()).await?;
    worker.call(&init_line(&dir.path().join("db"))).await?;

    let missing = serde_json::json!({"cmd": "index_file", "path": dir.path().join("gone.md")});
    let response = worker.call(&missing.to_string()).await?;
    assert!(response.is_error());
    assert!(response.reason.is_some());

    let binary = dir.path().join("blob.md");
    tokio::fs::write(&binary, [0xffu8, 0xfe, 0x00, 0x80]).await?;
    let request = serde_json::json!({"cmd": "index_file", "path": &binary});
    let response = worker.call(&request.to_string()).await?;
    assert!(response.is_error());

    // Still serving after failures
    let response = worker.call(r#"{"cmd":"stats"}"#).await?;
    assert_eq!(response.status, Status::Ok);
    assert_eq!(response.count, Some(0));
    Ok(())
}

#[tokio::test]
async fn test_state_survives_a_restart() -> Result<()> {
    let dir = tempdir()?;
    let db = dir.path().join("db");
    let file = dir.path().join("kept.md");
    tokio::fs::write(&file, "written once, indexed once").await?;
    let index_line = serde_json::json!({"cmd": "index_file", "path": &file}).to_string();

    let mut first = Worker::start(RecallConfig::default()).await?;
    first.call(&init_line(&db)).await?;
    assert_eq!(first.call(&index_line).await?.status, Status::Indexed);
    first.call(r#"{"cmd":"quit"}"#).await?;
    first.finished().await?;

    let mut second = Worker::start(RecallConfig::default()).await?;
    let response = second.call(&init_line(&db)).await?;
    assert_eq!(response.count, Some(1));
    assert_eq!(second.call(&index_line).await?.status, Status::Unchanged);
    Ok(())
}
