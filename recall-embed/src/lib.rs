//! # recall-embed
//!
//! Text embedding providers for the recall semantic-memory layer.
//!
//! Everything that turns text into vectors sits behind the [`EmbeddingProvider`]
//! trait, so the indexer and query engine never know which model they talk to.
//!
//! ## Providers
//!
//! - [`FastEmbedProvider`]: local ONNX sentence-transformer models via fastembed
//!   (`all-MiniLM-L6-v2` by default). Loaded models are cached per process.
//! - [`HashEmbedProvider`]: deterministic feature hashing, no model files.
//!
//! ## Quick Start
//!
//! ```no_run
//! use recall_embed::{EmbedConfig, create_provider};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let provider = create_provider(&EmbedConfig::default()).await?;
//!
//! let texts = vec!["Hello world".to_string(), "How are you?".to_string()];
//! let result = provider.embed_texts(&texts).await?;
//!
//! println!("Generated {} embeddings of dimension {}", result.len(), result.dimension);
//! # Ok(())
//! # }
//! ```
//!
//! ## Memory Usage
//!
//! Embeddings are half precision (f16) and L2-normalized by default, so a dot
//! product of two vectors is their cosine similarity.

pub mod config;
pub mod error;
pub mod hashing;
pub mod provider;

pub use config::{EmbedConfig, ProviderKind};
pub use error::{EmbedError, Result};
pub use hashing::HashEmbedProvider;
pub use provider::{EmbeddingProvider, EmbeddingResult, FastEmbedProvider, create_provider};
