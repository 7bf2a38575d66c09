//! Client side of the worker protocol: spawns `recall-worker` as a child
//! process and exchanges one JSON line per request.

use crate::protocol::{Request, Response, Status, write_message};
use anyhow::{Context, Result, bail};
use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Target under which worker stderr lines are re-logged
pub const WORKER_LOG_TARGET: &str = "recall::worker";

pub struct WorkerClient {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    log_relay: JoinHandle<()>,
}

impl WorkerClient {
    /// Start the worker and wait for its ready line.
    pub async fn spawn<I, S>(program: &Path, args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start worker {}", program.display()))?;

        let stdin = child.stdin.take().context("Worker stdin was not captured")?;
        let stdout = child.stdout.take().context("Worker stdout was not captured")?;
        let stderr = child.stderr.take().context("Worker stderr was not captured")?;
        let log_relay = tokio::spawn(relay_worker_log(stderr));

        let mut client = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            log_relay,
        };

        let first = client
            .read_response()
            .await
            .context("Worker exited before it was ready")?;
        if first.status != Status::Ready {
            bail!(
                "Worker sent {} instead of ready: {}",
                first.status,
                first.error_message()
            );
        }
        debug!("Worker {} is ready", program.display());
        Ok(client)
    }

    /// Send one request and wait for its response.
    pub async fn request(&mut self, request: &Request) -> Result<Response> {
        write_message(&mut self.stdin, request)
            .await
            .with_context(|| format!("Failed to send {}", request.name()))?;
        self.read_response()
            .await
            .with_context(|| format!("No response to {}", request.name()))
    }

    async fn read_response(&mut self) -> Result<Response> {
        let line = self
            .stdout
            .next_line()
            .await?
            .context("Worker closed its output")?;
        serde_json::from_str(&line).with_context(|| format!("Unreadable worker response: {line}"))
    }

    /// Send `quit`, wait for the worker to exit, then drain its log.
    pub async fn close(mut self) -> Result<()> {
        let ack = self.request(&Request::Quit).await;
        drop(self.stdin);

        let status = self
            .child
            .wait()
            .await
            .context("Failed to wait for worker exit")?;
        if let Err(e) = self.log_relay.await {
            warn!("Worker log relay stopped abnormally: {e}");
        }

        ack?;
        if !status.success() {
            bail!("Worker exited with {status}");
        }
        Ok(())
    }
}

async fn relay_worker_log(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => info!(target: WORKER_LOG_TARGET, "{line}"),
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to read worker log: {e}");
                break;
            }
        }
    }
}
