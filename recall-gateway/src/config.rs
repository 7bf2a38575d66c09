//! TOML configuration shared by the worker and the CLI.
//!
//! Every table and key is optional; a missing file section falls back to the
//! built-in defaults.
//!
//! ```toml
//! [session]
//! db_path = "/home/me/.recall"
//! search_limit = 5
//!
//! [chunking]
//! window = 500
//! overlap = 50
//!
//! [index]
//! extensions = ["md", "txt", "rs"]
//! excluded_dirs = ["node_modules", "target"]
//!
//! [embedding]
//! provider = "fast_embed"
//! model_name = "all-MiniLM-L6-v2"
//! ```

use anyhow::{Context, Result, bail};
use recall_context::ChunkConfig;
use recall_embed::EmbedConfig;
use recall_retriever::retrieval::file_filter::FilterConfig;
use recall_retriever::retrieval::indexer::IndexerConfig;
use recall_retriever::retrieval::query::DEFAULT_SEARCH_LIMIT;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecallConfig {
    pub session: SessionConfig,
    pub chunking: ChunkConfig,
    pub index: FilterConfig,
    pub embedding: EmbedConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Database directory used when `init` does not name one
    pub db_path: Option<PathBuf>,
    /// Result count for `search` requests without a `limit`
    pub search_limit: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            search_limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

impl RecallConfig {
    /// Read and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// `path` when given, built-in defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.chunking.validate().context("Invalid [chunking] section")?;
        self.embedding
            .validate()
            .context("Invalid [embedding] section")?;
        if self.session.search_limit == 0 {
            bail!("session.search_limit must be >= 1");
        }
        Ok(())
    }

    pub fn with_db_path(mut self, db_path: impl Into<PathBuf>) -> Self {
        self.session.db_path = Some(db_path.into());
        self
    }

    pub fn indexer_config(&self) -> IndexerConfig {
        IndexerConfig {
            chunking: self.chunking,
            filter: self.index.clone(),
        }
    }
}
