//! Deterministic feature-hashing embedder.
//!
//! Every lowercase alphanumeric token of the input is hashed with FNV-1a into
//! one of `dimension` buckets, with the sign taken from the top hash bit. Texts
//! sharing words end up with positive cosine similarity. The vectors carry no
//! semantics beyond token overlap, but they need no model files and are stable
//! across processes and platforms, which makes this provider the one used for
//! offline operation and tests.

use crate::config::EmbedConfig;
use crate::error::Result;
use crate::provider::{EmbeddingProvider, EmbeddingResult, to_f16};
use async_trait::async_trait;
use fnv::FnvHasher;
use half::f16;
use std::hash::Hasher;

#[derive(Debug, Clone)]
pub struct HashEmbedProvider {
    dimension: usize,
    normalize: bool,
}

impl HashEmbedProvider {
    pub fn new(config: EmbedConfig) -> Self {
        Self {
            dimension: config.dimension.max(1),
            normalize: config.normalize,
        }
    }

    /// Hashing provider with `dimension` buckets and normalized output
    pub fn with_dimension(dimension: usize) -> Self {
        Self::new(EmbedConfig::hashing(dimension))
    }

    fn embed_one(&self, text: &str) -> Vec<f16> {
        let mut buckets = vec![0.0f32; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = FnvHasher::default();
            hasher.write(token.to_lowercase().as_bytes());
            let hash = hasher.finish();

            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            buckets[bucket] += sign;
        }
        to_f16(buckets, self.normalize)
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedProvider {
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        let embeddings: Vec<Vec<f16>> = texts.iter().map(|t| self.embed_one(t)).collect();
        Ok(EmbeddingResult {
            embeddings,
            dimension: self.dimension,
        })
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        "hash"
    }
}
