//! Error types for the embedding system

pub type Result<T> = std::result::Result<T, EmbedError>;

/// Everything that can go wrong turning text into vectors.
///
/// The indexer treats every variant as fatal to the command that triggered it;
/// nothing here is retried internally.
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    #[error("Invalid embedding configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Unsupported fastembed model: '{name}'")]
    UnknownModel { name: String },

    /// `embed_texts` was called on a provider whose model was never loaded
    #[error("Embedding model not initialized")]
    NotInitialized,

    #[error("Failed to load model {model}: {source}")]
    ModelLoad {
        model: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Embedding inference failed: {source}")]
    Inference {
        #[source]
        source: anyhow::Error,
    },

    /// The model produced a different number of vectors than it was given texts
    #[error("Expected {expected} embeddings, model returned {actual}")]
    MissingOutput { expected: usize, actual: usize },

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Model produced non-finite values")]
    NonFinite,

    #[error("Lock poisoned: {what}")]
    Poisoned { what: &'static str },

    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// A `spawn_blocking` model call panicked or was cancelled
    #[error("Async task failed: {source}")]
    AsyncTask {
        #[from]
        source: tokio::task::JoinError,
    },

    #[error("External error: {source}")]
    External {
        #[from]
        source: anyhow::Error,
    },
}

impl EmbedError {
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    pub fn model_load(model: impl Into<String>, source: anyhow::Error) -> Self {
        Self::ModelLoad {
            model: model.into(),
            source,
        }
    }

    /// Configuration and model-selection problems, as opposed to runtime failures
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig { .. } | Self::UnknownModel { .. }
        )
    }
}
