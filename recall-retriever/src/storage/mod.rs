//! Storage abstraction layer for recall-retriever
//!
//! The indexer and query engine only see these traits, so any backend that can
//! keep vectors with metadata and a per-file fingerprint table can be plugged in.
//!
//! ## Key Components
//!
//! - **VectorStore**: index entries, similarity query, deletion by source file
//! - **FingerprintStore**: last successfully indexed content hash per file
//! - **IndexStore**: both of the above, implemented by every backend
//!
//! ## Architecture
//!
//! ```text
//! VectorStore ──────┐
//!                   ├─ IndexStore ─┬─ SqliteStore (on disk, WAL)
//! FingerprintStore ─┘              └─ InMemoryStore (tests, scratch sessions)
//! ```

use anyhow::Result;
use async_trait::async_trait;
use half::f16;

pub mod memory_store;
pub mod sqlite_store;

pub use memory_store::InMemoryStore;
pub use sqlite_store::SqliteStore;

/// The persisted unit: one embedded chunk of one source file.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    /// Stable chunk ID, see [`chunk_id`]
    pub id: String,
    /// Absolute path of the source file
    pub source_path: String,
    /// File name component of `source_path`
    pub filename: String,
    /// Ordinal of the chunk within its file
    pub chunk_idx: usize,
    /// Raw chunk text
    pub text: String,
    pub embedding: Vec<f16>,
}

/// An entry returned by [`VectorStore::query`] with its cosine similarity.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEntry {
    pub entry: IndexEntry,
    pub score: f32,
}

/// A tracked file's last successfully indexed fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFingerprint {
    pub path: String,
    /// Lowercase hex BLAKE3 digest of the file bytes
    pub hash: String,
    pub extension: Option<String>,
}

/// Persistence of embedded chunks.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert entries, replacing any existing entry with the same ID.
    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<()>;

    /// Remove every entry whose source path equals `source_path`.
    async fn delete_by_source(&self, source_path: &str) -> Result<usize>;

    /// Up to `limit` entries ordered by descending similarity to `vector`.
    /// Equal scores keep insertion order.
    async fn query(&self, vector: &[f16], limit: usize) -> Result<Vec<ScoredEntry>>;

    /// Total stored entries
    async fn count(&self) -> Result<usize>;

    /// Remove all entries
    async fn clear(&self) -> Result<()>;
}

/// Persistence of per-file content fingerprints.
#[async_trait]
pub trait FingerprintStore: Send + Sync {
    async fn fingerprint(&self, path: &str) -> Result<Option<FileFingerprint>>;

    async fn record_fingerprint(&self, fingerprint: FileFingerprint) -> Result<()>;

    /// Drop the fingerprint of one path, if any
    async fn forget_fingerprint(&self, path: &str) -> Result<()>;

    async fn tracked_files(&self) -> Result<usize>;

    /// Forget every fingerprint so all files look new
    async fn clear_fingerprints(&self) -> Result<()>;
}

/// A backend providing both vector and fingerprint storage.
pub trait IndexStore: VectorStore + FingerprintStore {}

impl<T: VectorStore + FingerprintStore> IndexStore for T {}

/// Derive the stable ID of chunk `ordinal` of `source_path`.
///
/// The first 16 hex chars of the path's BLAKE3 digest, `_`, then the ordinal.
pub fn chunk_id(source_path: &str, ordinal: usize) -> String {
    let digest = blake3::hash(source_path.as_bytes()).to_hex();
    format!("{}_{}", &digest.as_str()[..16], ordinal)
}

/// Cosine similarity of two vectors. Mismatched lengths and zero vectors score 0.
pub fn cosine_similarity(a: &[f16], b: &[f16]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot_product = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (x.to_f32(), y.to_f32());
        dot_product += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot_product / (norm_a.sqrt() * norm_b.sqrt())
}

/// Score `entries` (given in insertion order) against `vector` and keep the best `limit`.
pub(crate) fn rank(
    entries: impl IntoIterator<Item = IndexEntry>,
    vector: &[f16],
    limit: usize,
) -> Vec<ScoredEntry> {
    if limit == 0 {
        return Vec::new();
    }

    let mut scored: Vec<ScoredEntry> = entries
        .into_iter()
        .map(|entry| {
            let score = cosine_similarity(vector, &entry.embedding);
            ScoredEntry { entry, score }
        })
        .collect();

    // sort_by is stable, so ties stay in insertion order
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(limit);
    scored
}
