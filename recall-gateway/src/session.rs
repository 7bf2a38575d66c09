//! A worker session: one database, one embedding provider, many requests.
//!
//! ```text
//! Starting ──init──→ Ready ──request──→ Serving ──┐
//!    │                 │                  ↑ └─────┘ request
//!    │                 │                  │
//!    └─────────────────┴──────────────────┴──quit / EOF / malformed line──→ Terminated
//! ```
//!
//! Requests are handled strictly one at a time, in arrival order, and every
//! request line gets exactly one response line.

use crate::config::RecallConfig;
use crate::protocol::{ProtocolError, Request, Response, decode_request, write_message};
use anyhow::{Context, Result};
use recall_embed::{EmbeddingProvider, create_provider};
use recall_retriever::retrieval::indexer::Indexer;
use recall_retriever::retrieval::query::QueryEngine;
use recall_retriever::storage::SqliteStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Accepting requests; no database open yet
    Starting,
    /// `init` succeeded, no other request handled yet
    Ready,
    /// At least one request answered against the open database
    Serving,
    Terminated,
}

/// Everything `init` opens
struct Backend {
    db_path: PathBuf,
    store: Arc<SqliteStore>,
    indexer: Indexer,
    engine: QueryEngine,
}

impl Backend {
    async fn init_response(&self) -> Result<Response> {
        let stats = self.indexer.stats().await?;
        Ok(Response {
            db_path: Some(self.db_path.display().to_string()),
            count: Some(stats.count),
            ..Response::ok()
        })
    }
}

pub struct Session {
    config: RecallConfig,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    backend: Option<Backend>,
    serving: bool,
    terminated: bool,
}

impl Session {
    /// Create a session in the starting phase. The embedding provider is built
    /// on the first `init` unless one is supplied with [`Session::with_provider`].
    pub fn new(config: RecallConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            embedder: None,
            backend: None,
            serving: false,
            terminated: false,
        })
    }

    pub fn with_provider(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn config(&self) -> &RecallConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        if self.terminated {
            Phase::Terminated
        } else if self.backend.is_some() {
            if self.serving {
                Phase::Serving
            } else {
                Phase::Ready
            }
        } else {
            Phase::Starting
        }
    }

    /// Path of the open database, once initialized
    pub fn db_path(&self) -> Option<&Path> {
        self.backend.as_ref().map(|b| b.db_path.as_path())
    }

    /// Answer one request. Failures become `error` responses.
    pub async fn handle(&mut self, request: Request) -> Response {
        let name = request.name();
        if self.backend.is_none() && !matches!(request, Request::Init { .. } | Request::Quit) {
            debug!("Rejected {name} before init");
            return Response::error("not initialized");
        }

        let is_init = matches!(request, Request::Init { .. });
        let result = self.dispatch(request).await;
        if !is_init && self.backend.is_some() {
            self.serving = true;
        }
        match result {
            Ok(response) => response,
            Err(e) => {
                warn!("{name} failed: {e:#}");
                Response::failure(format!("{e:#}"))
            }
        }
    }

    async fn dispatch(&mut self, request: Request) -> Result<Response> {
        match request {
            Request::Init { db_path } => self.init(db_path).await,
            Request::Quit => {
                info!("Quit requested");
                self.terminated = true;
                Ok(Response::ok())
            }
            Request::IndexFile { path, force } => {
                let report = self.backend()?.indexer.index_file(&path, force).await?;
                Ok(Response::from_file_report(report))
            }
            Request::IndexDir {
                path,
                force,
                extensions,
            } => {
                let report = self
                    .backend()?
                    .indexer
                    .index_dir(&path, force, extensions.as_deref())
                    .await?;
                Ok(Response::from_directory_report(report))
            }
            Request::Search { query, limit } => {
                let limit = limit.unwrap_or(self.config.session.search_limit);
                let results = self.backend()?.engine.search(&query, limit).await?;
                Ok(Response {
                    results: Some(results),
                    ..Response::ok()
                })
            }
            Request::Stats => {
                let stats = self.backend()?.indexer.stats().await?;
                Ok(Response {
                    count: Some(stats.count),
                    files: Some(stats.files),
                    ..Response::ok()
                })
            }
            Request::Clear => {
                self.backend()?.indexer.clear().await?;
                Ok(Response::ok())
            }
        }
    }

    fn backend(&self) -> Result<&Backend> {
        self.backend.as_ref().context("not initialized")
    }

    async fn init(&mut self, db_path: Option<PathBuf>) -> Result<Response> {
        let Some(db_path) = db_path.or_else(|| self.config.session.db_path.clone()) else {
            return Ok(Response::error("init requires db_path"));
        };

        if let Some(backend) = &self.backend {
            if backend.db_path != db_path {
                return Ok(Response::error(format!(
                    "already initialized with {}",
                    backend.db_path.display()
                )));
            }
            debug!("Repeated init for {}", db_path.display());
            return backend.init_response().await;
        }

        let embedder = match self.embedder.clone() {
            Some(embedder) => embedder,
            None => {
                info!(
                    "Loading {} embedding provider",
                    self.config.embedding.provider
                );
                let embedder = create_provider(&self.config.embedding)
                    .await
                    .context("Failed to create embedding provider")?;
                self.embedder = Some(Arc::clone(&embedder));
                embedder
            }
        };

        let store = Arc::new(
            SqliteStore::open(&db_path)
                .await
                .with_context(|| format!("Failed to open database at {}", db_path.display()))?,
        );
        let indexer = Indexer::new(
            store.clone(),
            Arc::clone(&embedder),
            &self.config.indexer_config(),
        )?;
        let engine = QueryEngine::new(store.clone(), embedder);

        let backend = Backend {
            db_path,
            store,
            indexer,
            engine,
        };
        let response = backend.init_response().await?;
        info!(
            "Opened {} with {} chunks",
            backend.db_path.display(),
            response.count.unwrap_or(0)
        );
        self.backend = Some(backend);
        Ok(response)
    }

    /// Write the ready line, then answer request lines until quit, EOF or a
    /// malformed line. The database is closed before returning.
    pub async fn serve<R, W>(&mut self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let result = self.serve_lines(reader, &mut writer).await;
        self.shutdown().await;
        result
    }

    async fn serve_lines<R, W>(&mut self, mut reader: R, writer: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        write_message(writer, &Response::ready()).await?;
        info!("Worker ready");

        let mut line = Vec::new();
        while self.phase() != Phase::Terminated {
            line.clear();
            let read = reader
                .read_until(b'\n', &mut line)
                .await
                .context("Failed to read request")?;
            if read == 0 {
                info!("Input closed");
                break;
            }

            let decoded = match std::str::from_utf8(&line) {
                Ok(text) if text.trim().is_empty() => continue,
                Ok(text) => decode_request(text.trim()),
                Err(_) => Err(ProtocolError::Malformed("invalid UTF-8".to_string())),
            };
            let response = match decoded {
                Ok(request) => self.handle(request).await,
                Err(err) if err.is_fatal() => {
                    warn!("{err}, terminating session");
                    self.terminated = true;
                    Response::error(err.to_string())
                }
                Err(err) => {
                    debug!("Rejected request: {err}");
                    Response::error(err.to_string())
                }
            };
            write_message(writer, &response)
                .await
                .context("Failed to write response")?;
        }
        Ok(())
    }

    async fn shutdown(&mut self) {
        self.terminated = true;
        if let Some(backend) = self.backend.take() {
            backend.store.close().await;
            debug!("Closed {}", backend.db_path.display());
        }
    }
}
