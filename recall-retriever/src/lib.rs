//! recall-retriever: file indexing and semantic search over a local vector store
//!
//! Files are split into overlapping chunks, embedded, and stored with their
//! source metadata. Queries are embedded the same way and answered by cosine
//! similarity over the stored vectors.
//!
//! ## Key Modules
//!
//! - **[`retrieval`]**: change tracking, file filtering, the indexer and the query engine
//! - **[`storage`]**: the vector/fingerprint store traits with SQLite and in-memory backends
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use recall_embed::HashEmbedProvider;
//! use recall_retriever::retrieval::{indexer::{Indexer, IndexerConfig}, query::QueryEngine};
//! use recall_retriever::storage::SqliteStore;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = Arc::new(SqliteStore::open(Path::new("/tmp/recall-db")).await?);
//! let embedder = Arc::new(HashEmbedProvider::with_dimension(384));
//!
//! let indexer = Indexer::new(store.clone(), embedder.clone(), &IndexerConfig::default())?;
//! indexer.index_dir(Path::new("./notes"), false, None).await?;
//!
//! let engine = QueryEngine::new(store, embedder);
//! for hit in engine.search("what did I decide about caching?", 5).await? {
//!     println!("{:.3} {}#{}", hit.score, hit.path, hit.chunk_idx);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Files → FileFilter → ChangeTracker → Chunker → EmbeddingProvider → IndexStore
//!                                                                       ↓
//!                                         Query → EmbeddingProvider → QueryEngine
//! ```

pub mod retrieval;
pub mod storage;
