//! Error types for the `mkr-eval` crate.

use mkr_retrieval::RetrievalError;
use thiserror::Error;

/// Errors that can occur while loading qrels or running a benchmark.
#[derive(Debug, Error)]
pub enum EvalError {
    /// The retriever under evaluation failed.
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    /// A qrel line could not be parsed.
    #[error("Invalid qrel at line {line}: {message}")]
    InvalidQrel {
        /// 1-based line number in the qrels file.
        line: usize,
        /// A description of the failure.
        message: String,
    },

    /// A benchmark configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An I/O error while reading qrels.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON serialization error while writing a report.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A convenience result type for evaluation operations.
pub type Result<T> = std::result::Result<T, EvalError>;
