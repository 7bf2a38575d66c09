//! Configuration for embedding providers

use crate::error::{EmbedError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default model used by [`ProviderKind::FastEmbed`]
pub const DEFAULT_MODEL_NAME: &str = "all-MiniLM-L6-v2";

/// Default vector width for [`ProviderKind::Hash`]
pub const DEFAULT_HASH_DIMENSION: usize = 384;

/// Which embedding backend to construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Local ONNX sentence-transformer model through fastembed
    #[default]
    FastEmbed,
    /// Deterministic feature-hashing embedder, no model files needed
    Hash,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::FastEmbed => write!(f, "fastembed"),
            ProviderKind::Hash => write!(f, "hash"),
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fastembed" | "fast_embed" | "fast-embed" | "onnx" => Ok(ProviderKind::FastEmbed),
            "hash" | "hashing" => Ok(ProviderKind::Hash),
            _ => Err(format!(
                "Invalid embedding provider: '{s}'. Valid values are: fastembed, hash"
            )),
        }
    }
}

/// Configuration for embedding providers.
///
/// Deserialized from the `[embedding]` table of the recall config file; every
/// field has a default so a partial table is fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedConfig {
    /// Backend to construct
    pub provider: ProviderKind,
    /// Name of the fastembed model, e.g. `all-MiniLM-L6-v2`
    pub model_name: String,
    /// Where fastembed keeps downloaded model files (fastembed's default when unset)
    pub cache_dir: Option<PathBuf>,
    /// Maximum number of texts handed to the model at once
    pub batch_size: usize,
    /// Whether to L2-normalize embeddings
    pub normalize: bool,
    /// Output width of the hashing provider
    pub dimension: usize,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::FastEmbed,
            model_name: DEFAULT_MODEL_NAME.to_string(),
            cache_dir: None,
            batch_size: 32,
            normalize: true,
            dimension: DEFAULT_HASH_DIMENSION,
        }
    }
}

impl EmbedConfig {
    /// Configuration for a fastembed model by name
    pub fn fastembed(model_name: impl Into<String>) -> Self {
        Self {
            provider: ProviderKind::FastEmbed,
            model_name: model_name.into(),
            ..Self::default()
        }
    }

    /// Configuration for the hashing provider with the given width
    pub fn hashing(dimension: usize) -> Self {
        Self {
            provider: ProviderKind::Hash,
            dimension,
            ..Self::default()
        }
    }

    /// Set the batch size for embedding generation (builder style)
    pub fn with_batch_size(self, batch_size: usize) -> Self {
        Self { batch_size, ..self }
    }

    /// Set whether to normalize embeddings (builder style)
    pub fn with_normalize(self, normalize: bool) -> Self {
        Self { normalize, ..self }
    }

    /// Set the model cache directory (builder style)
    pub fn with_cache_dir(self, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: Some(cache_dir.into()),
            ..self
        }
    }

    /// Get the model name
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Check the configuration for values no provider can work with
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            tracing::error!("Embedding batch_size is 0");
            return Err(EmbedError::invalid_config("batch_size must be at least 1"));
        }
        match self.provider {
            ProviderKind::Hash if self.dimension == 0 => {
                Err(EmbedError::invalid_config("dimension must be at least 1"))
            }
            ProviderKind::FastEmbed if self.model_name.trim().is_empty() => {
                Err(EmbedError::invalid_config("model_name must not be empty"))
            }
            _ => {
                tracing::debug!("Embedding config valid for provider {}", self.provider);
                Ok(())
            }
        }
    }
}
