//! Natural-language search over the index.

use crate::storage::{IndexStore, VectorStore};
use anyhow::{Context, Result};
use recall_embed::EmbeddingProvider;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Results returned when a request does not name a limit
pub const DEFAULT_SEARCH_LIMIT: usize = 5;

/// One ranked chunk. Built per query, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    /// Cosine similarity between the query and the chunk
    pub score: f32,
    pub text: String,
    pub path: String,
    pub filename: String,
    pub chunk_idx: usize,
}

pub struct QueryEngine {
    store: Arc<dyn IndexStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl QueryEngine {
    pub fn new(store: Arc<dyn IndexStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, embedder }
    }

    /// Embed `query` and return up to `limit` chunks by descending score.
    ///
    /// An empty query is embedded like any other text. An empty index gives an
    /// empty result list.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let vector = self
            .embedder
            .embed_text(query)
            .await
            .context("Failed to embed query")?;

        let hits = self.store.query(&vector, limit).await?;
        tracing::debug!("Query {:?} matched {} entries", query, hits.len());

        Ok(hits
            .into_iter()
            .map(|hit| SearchResult {
                id: hit.entry.id,
                score: hit.score,
                text: hit.entry.text,
                path: hit.entry.source_path,
                filename: hit.entry.filename,
                chunk_idx: hit.entry.chunk_idx,
            })
            .collect())
    }
}
