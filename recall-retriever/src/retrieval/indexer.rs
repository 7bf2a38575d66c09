//! Orchestrates file discovery, change detection, chunking, embedding and storage.
//!
//! ## Pipeline Flow
//!
//! ```text
//! path → FileFilter → ChangeTracker ─unchanged─→ report
//!                          │
//!                       reindex
//!                          ↓
//!                  Chunker → EmbeddingProvider → VectorStore (delete, upsert)
//!                                                     ↓
//!                                          ChangeTracker::commit
//! ```
//!
//! A file's entries are always replaced wholesale: old entries for the path are
//! deleted before the new chunk set is upserted, so a file that shrank leaves no
//! stale chunks behind. The old fingerprint is dropped before the delete and the
//! new one committed last, so a failure anywhere in between leaves the path
//! untracked and the next run reindexes it.

use super::change_tracker::ChangeTracker;
use super::file_filter::{FileFilter, FilterConfig};
use crate::storage::{FingerprintStore, IndexEntry, IndexStore, VectorStore, chunk_id};
use anyhow::{Context, Result, bail};
use recall_context::{ChunkConfig, Chunker};
use recall_embed::EmbeddingProvider;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Chunking and directory-walk settings for an [`Indexer`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    pub chunking: ChunkConfig,
    pub filter: FilterConfig,
}

impl IndexerConfig {
    pub fn with_chunking(mut self, window: usize, overlap: usize) -> Self {
        self.chunking = ChunkConfig { window, overlap };
        self
    }

    pub fn with_extensions<S: Into<String>>(
        mut self,
        extensions: impl IntoIterator<Item = S>,
    ) -> Self {
        self.filter.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }
}

/// What happened to a single file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Indexed,
    Unchanged,
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileStatus::Indexed => write!(f, "indexed"),
            FileStatus::Unchanged => write!(f, "unchanged"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub status: FileStatus,
    /// Chunks stored for the file; 0 when unchanged
    pub chunks: usize,
}

/// A file or directory the walk could not process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Counters for one directory walk. `skipped` is `filtered + unchanged + failed`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DirectoryReport {
    pub indexed: usize,
    pub skipped: usize,
    /// Files rejected by the extension or hidden rules, plus one per pruned
    /// hidden or excluded directory. Files below a pruned directory are never
    /// visited and are not counted.
    pub filtered: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub failures: Vec<FileFailure>,
}

impl DirectoryReport {
    fn skip_filtered(&mut self) {
        self.filtered += 1;
        self.skipped += 1;
    }

    fn record(&mut self, status: FileStatus) {
        match status {
            FileStatus::Indexed => self.indexed += 1,
            FileStatus::Unchanged => {
                self.unchanged += 1;
                self.skipped += 1;
            }
        }
    }

    fn failure(&mut self, path: PathBuf, error: &anyhow::Error) {
        self.failed += 1;
        self.skipped += 1;
        self.failures.push(FileFailure {
            path,
            error: format!("{error:#}"),
        });
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    /// Stored index entries
    pub count: usize,
    /// Files with a recorded fingerprint
    pub files: usize,
}

pub struct Indexer {
    store: Arc<dyn IndexStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    tracker: ChangeTracker,
    chunker: Chunker,
    filter: FileFilter,
}

impl Indexer {
    /// Create an indexer over `store`, rejecting invalid chunking parameters.
    pub fn new(
        store: Arc<dyn IndexStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: &IndexerConfig,
    ) -> Result<Self> {
        config
            .chunking
            .validate()
            .context("Invalid chunking configuration")?;

        Ok(Self {
            tracker: ChangeTracker::new(Arc::clone(&store)),
            store,
            embedder,
            chunker: Chunker::new(config.chunking),
            filter: FileFilter::new(&config.filter),
        })
    }

    pub fn chunk_config(&self) -> ChunkConfig {
        self.chunker.config()
    }

    /// Index one file, skipping it when its content is unchanged and `force` is off.
    pub async fn index_file(&self, path: &Path, force: bool) -> Result<FileReport> {
        let path = tokio::fs::canonicalize(path)
            .await
            .with_context(|| format!("Failed to resolve {}", path.display()))?;
        let metadata = tokio::fs::metadata(&path).await?;
        if !metadata.is_file() {
            bail!("Not a file: {}", path.display());
        }

        let source_path = path.to_string_lossy().into_owned();
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let check = self.tracker.check(&source_path, &bytes, force).await?;
        if !check.reindex {
            debug!("Unchanged, skipping: {}", path.display());
            return Ok(FileReport {
                path,
                status: FileStatus::Unchanged,
                chunks: 0,
            });
        }

        let text = String::from_utf8(bytes)
            .map_err(|_| anyhow::anyhow!("Not valid UTF-8 text: {}", path.display()))?;
        let chunks = self.chunker.chunks(&text);

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = if texts.is_empty() {
            Vec::new()
        } else {
            self.embedder
                .embed_texts(&texts)
                .await
                .with_context(|| format!("Failed to embed {}", path.display()))?
                .embeddings
        };
        if embeddings.len() != chunks.len() {
            bail!(
                "Embedding provider returned {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            );
        }

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexEntry {
                id: chunk_id(&source_path, chunk.ordinal),
                source_path: source_path.clone(),
                filename: filename.clone(),
                chunk_idx: chunk.ordinal,
                text: chunk.text,
                embedding,
            })
            .collect();
        let chunk_count = entries.len();

        self.tracker.forget(&source_path).await?;
        let removed = self.store.delete_by_source(&source_path).await?;
        self.store.upsert(entries).await?;
        self.tracker.commit(&source_path, check.fingerprint).await?;

        info!(
            "Indexed {} ({} chunks, replaced {})",
            path.display(),
            chunk_count,
            removed
        );
        Ok(FileReport {
            path,
            status: FileStatus::Indexed,
            chunks: chunk_count,
        })
    }

    /// Walk `root` and index every allowed file below it.
    ///
    /// `extensions` replaces the configured allow-list for this walk. Failures on
    /// individual files or subdirectories are recorded and the walk continues.
    pub async fn index_dir(
        &self,
        root: &Path,
        force: bool,
        extensions: Option<&[String]>,
    ) -> Result<DirectoryReport> {
        let root = tokio::fs::canonicalize(root)
            .await
            .with_context(|| format!("Failed to resolve {}", root.display()))?;
        if !tokio::fs::metadata(&root).await?.is_dir() {
            bail!("Not a directory: {}", root.display());
        }

        let filter = match extensions {
            Some(exts) if !exts.is_empty() => self.filter.with_extensions(exts),
            _ => self.filter.clone(),
        };

        info!("Indexing directory: {}", root.display());
        let mut report = DirectoryReport::default();
        let mut dir_stack = vec![root.clone()];

        while let Some(current_dir) = dir_stack.pop() {
            let mut entries = match read_dir_sorted(&current_dir).await {
                Ok(entries) => entries,
                Err(e) if current_dir == root => return Err(e),
                Err(e) => {
                    warn!("Failed to read directory {}: {:#}", current_dir.display(), e);
                    report.failure(current_dir, &e);
                    continue;
                }
            };

            // Reverse so the stack pops subdirectories in name order
            let mut subdirs = Vec::new();
            for (path, file_type) in entries.drain(..) {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();

                if file_type.is_dir() {
                    if filter.allows_dir(&name) {
                        subdirs.push(path);
                    } else {
                        debug!("Skipping directory: {}", path.display());
                        report.skip_filtered();
                    }
                    continue;
                }

                let is_file = file_type.is_file()
                    || (file_type.is_symlink()
                        && tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_file()));
                if !is_file || !filter.allows_file(&path) {
                    debug!("Filtered: {}", path.display());
                    report.skip_filtered();
                    continue;
                }

                match self.index_file(&path, force).await {
                    Ok(file) => report.record(file.status),
                    Err(e) => {
                        warn!("Failed to index {}: {:#}", path.display(), e);
                        report.failure(path, &e);
                    }
                }
            }
            dir_stack.extend(subdirs.into_iter().rev());
        }

        info!(
            "Indexed {} files under {} ({} skipped: {} filtered, {} unchanged, {} failed)",
            report.indexed,
            root.display(),
            report.skipped,
            report.filtered,
            report.unchanged,
            report.failed
        );
        Ok(report)
    }

    /// Remove all entries and forget every fingerprint.
    pub async fn clear(&self) -> Result<()> {
        self.store.clear().await?;
        self.tracker.reset().await?;
        info!("Index cleared");
        Ok(())
    }

    pub async fn stats(&self) -> Result<IndexStats> {
        Ok(IndexStats {
            count: self.store.count().await?,
            files: self.store.tracked_files().await?,
        })
    }
}

async fn read_dir_sorted(dir: &Path) -> Result<Vec<(PathBuf, std::fs::FileType)>> {
    let mut read_dir = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to read directory {}", dir.display()))?;

    let mut entries = Vec::new();
    while let Some(entry) = read_dir.next_entry().await? {
        let file_type = entry.file_type().await?;
        entries.push((entry.path(), file_type));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(entries)
}
