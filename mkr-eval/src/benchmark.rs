//! Benchmark runner.
//!
//! Each question is retrieved once at the evaluation depth; the rank of the
//! first relevant id is recorded and every metric is derived from those ranks.

use std::collections::BTreeMap;

use mkr_retrieval::{DocumentRetriever, Retriever};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::{EvalError, Result};
use crate::metrics::{Metrics, first_hit_rank};
use crate::qrels::Qrel;

/// Default retrieval depth per question.
pub const DEFAULT_DEPTH: usize = 1000;

/// Default Recall@k cutoffs.
pub const DEFAULT_RECALL_CUTOFFS: &[usize] = &[1, 3, 5, 10, 30, 50, 100, 1000];

/// Benchmark settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    /// Number of results retrieved per question. Also the MRR depth.
    pub depth: usize,
    /// Cutoffs reported as Recall@k.
    pub recall_cutoffs: Vec<usize>,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self { depth: DEFAULT_DEPTH, recall_cutoffs: DEFAULT_RECALL_CUTOFFS.to_vec() }
    }
}

impl BenchmarkConfig {
    /// Create a builder starting from the defaults.
    pub fn builder() -> BenchmarkConfigBuilder {
        BenchmarkConfigBuilder { config: Self::default() }
    }
}

/// Builder for [`BenchmarkConfig`] with validation on [`build()`](Self::build).
#[derive(Debug, Clone)]
pub struct BenchmarkConfigBuilder {
    config: BenchmarkConfig,
}

impl BenchmarkConfigBuilder {
    /// Set the retrieval depth.
    pub fn depth(mut self, depth: usize) -> Self {
        self.config.depth = depth;
        self
    }

    /// Set the Recall@k cutoffs.
    pub fn recall_cutoffs(mut self, cutoffs: impl Into<Vec<usize>>) -> Self {
        self.config.recall_cutoffs = cutoffs.into();
        self
    }

    /// Build the configuration. Cutoffs are sorted and deduplicated.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::ConfigError`] if `depth == 0` or there are no
    /// cutoffs.
    pub fn build(mut self) -> Result<BenchmarkConfig> {
        if self.config.depth == 0 {
            return Err(EvalError::ConfigError("depth must be greater than 0".to_string()));
        }
        if self.config.recall_cutoffs.is_empty() {
            return Err(EvalError::ConfigError("recall_cutoffs must not be empty".to_string()));
        }
        self.config.recall_cutoffs.sort_unstable();
        self.config.recall_cutoffs.dedup();
        Ok(self.config)
    }
}

/// Aggregate metrics of one benchmark run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Retrieval depth used.
    pub depth: usize,
    /// Questions that were retrieved and scored.
    pub evaluated: usize,
    /// Questions skipped because they had no relevant ids.
    pub skipped: usize,
    /// Mean reciprocal rank at `depth`.
    pub mrr: f64,
    /// Recall@k per configured cutoff.
    pub recall: BTreeMap<usize, f64>,
    /// Raw first-hit ranks.
    pub metrics: Metrics,
}

impl EvaluationReport {
    fn from_metrics(config: &BenchmarkConfig, metrics: Metrics, skipped: usize) -> Self {
        let recall = config.recall_cutoffs.iter().map(|k| (*k, metrics.recall(*k))).collect();
        Self {
            depth: config.depth,
            evaluated: metrics.len(),
            skipped,
            mrr: metrics.mrr(config.depth),
            recall,
            metrics,
        }
    }
}

/// Runs qrels against a retriever.
#[derive(Debug, Clone, Default)]
pub struct Benchmark {
    config: BenchmarkConfig,
}

impl Benchmark {
    /// Create a benchmark with `config`.
    pub fn new(config: BenchmarkConfig) -> Self {
        Self { config }
    }

    /// The benchmark configuration.
    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    /// Evaluate `retriever` on collection `corpus`, matching result ids
    /// against each qrel's document ids.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::Retrieval`] on the first retrieval failure.
    pub fn evaluate(
        &self,
        retriever: &mut Retriever,
        corpus: &str,
        qrels: &[Qrel],
    ) -> Result<EvaluationReport> {
        let depth = self.config.depth;
        let name = retriever.name();
        self.run(name, qrels, |question| {
            let results = retriever.retrieve(corpus, question, depth, None)?;
            Ok(results.into_iter().map(|r| r.id).collect())
        })
    }

    /// Evaluate a [`DocumentRetriever`], matching aggregated document ids.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::Retrieval`] on the first retrieval failure.
    pub fn evaluate_documents(
        &self,
        retriever: &mut DocumentRetriever,
        corpus: &str,
        qrels: &[Qrel],
    ) -> Result<EvaluationReport> {
        let depth = self.config.depth;
        self.run("documents", qrels, |question| {
            let results = retriever.retrieve(corpus, question, depth)?;
            Ok(results.into_iter().map(|d| d.id).collect())
        })
    }

    fn run(
        &self,
        name: &str,
        qrels: &[Qrel],
        mut retrieve: impl FnMut(&str) -> Result<Vec<String>>,
    ) -> Result<EvaluationReport> {
        let mut metrics = Metrics::new();
        let mut skipped = 0;
        for qrel in qrels {
            if qrel.document_ids.is_empty() {
                debug!(question = %qrel.question, "skipping question without relevant ids");
                skipped += 1;
                continue;
            }
            let ids = retrieve(&qrel.question).inspect_err(|e| {
                error!(retriever = name, question = %qrel.question, error = %e, "retrieval failed");
            })?;
            metrics.record(first_hit_rank(ids.iter().map(String::as_str), &qrel.document_ids));
        }
        let report = EvaluationReport::from_metrics(&self.config, metrics, skipped);
        info!(
            retriever = name,
            evaluated = report.evaluated,
            skipped,
            mrr = report.mrr,
            "benchmark finished"
        );
        Ok(report)
    }
}
