//! Document retrieval over persisted collections.
//!
//! This crate provides:
//! - Named collections backed by a BM25 index, a dense vector index, or plain
//!   content storage
//! - A [`Database`] registry that persists collections under one root
//! - Composable retrievers: sparse, dense, hybrid fusion, multistage cascades,
//!   and cross-encoder reranking
//! - Passage-to-document aggregation
//!
//! All retrievers return scores normalized to `[0, 1]` with the best result at
//! `1.0`.

mod aggregate;
mod collection;
mod config;
mod database;
mod document;
mod embedding;
mod error;
mod hybrid;
mod ingest;
mod lexical;
mod multistage;
mod normalize;
mod persist;
mod reranker;
mod retriever;
mod tokenizer;
mod vector;

pub use aggregate::{
    DEFAULT_PASSAGE_DEPTH_FACTOR, DocumentResult, DocumentRetriever, aggregate_passages,
    passage_document_id,
};
pub use collection::{Collection, Query};
pub use config::{
    Bm25Params, Bm25Variant, DatabaseConfig, IndexConfig, LexicalConfig, LexicalConfigBuilder,
    Metric, VectorConfig,
};
pub use database::Database;
pub use document::{Document, Metadata, RetrievalResult, content_hash};
pub use embedding::{EmbeddingProvider, HashEmbeddingProvider, l2_normalize};
pub use error::{Result, RetrievalError};
pub use hybrid::{HybridRetriever, fuse};
pub use ingest::{CorpusRecord, read_corpus};
pub use lexical::{LexicalIndex, TermCounts};
pub use multistage::MultistageRetriever;
pub use normalize::{normalize_results, normalize_scores};
pub use reranker::{CrossEncoder, KeywordOverlapScorer, Reranker};
pub use retriever::{DenseRetriever, Retriever, SparseRetriever};
pub use tokenizer::{SimpleTokenizer, Tokenizer};
pub use vector::VectorIndex;
