//! Error types for the `mkr-retrieval` crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in collection, database, and retrieval operations.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// A collection name was not registered in the database.
    #[error("Collection not found: {name}")]
    CollectionNotFound {
        /// The requested collection name.
        name: String,
    },

    /// Caller-supplied data violated an input contract (length mismatch,
    /// wrong vector dimension, invalid collection name, ...).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A configuration validation error or precondition violation.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Persisted state is missing or malformed.
    #[error("Corrupt state at {}: {message}", path.display())]
    CorruptState {
        /// The file or directory that failed to load.
        path: PathBuf,
        /// A description of the failure.
        message: String,
    },

    /// The operation is not available for this backend.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred while scoring query/passage pairs.
    #[error("Reranker error ({reranker}): {message}")]
    RerankerError {
        /// The cross-encoder that produced the error.
        reranker: String,
        /// A description of the failure.
        message: String,
    },

    /// A reranker was asked to score without a candidate list.
    #[error("Reranker requires an explicit candidate id list")]
    MissingCandidates,

    /// An I/O error while reading or writing persisted state.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A JSON (de)serialization error.
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

/// A convenience result type for retrieval operations.
pub type Result<T> = std::result::Result<T, RetrievalError>;
