//! Retrieval evaluation for `mkr-retrieval`.
//!
//! This crate provides:
//! - Query relevance labels and a JSONL loader
//! - A hit-rank accumulator with Recall@k and MRR
//! - A benchmark runner producing an [`EvaluationReport`]

mod benchmark;
mod error;
mod metrics;
mod qrels;

pub use benchmark::{
    Benchmark, BenchmarkConfig, BenchmarkConfigBuilder, DEFAULT_DEPTH, DEFAULT_RECALL_CUTOFFS,
    EvaluationReport,
};
pub use error::{EvalError, Result};
pub use metrics::{Metrics, first_hit_rank};
pub use qrels::{Qrel, load_qrels_jsonl};
