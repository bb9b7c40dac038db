//! Weighted fusion of a dense and a sparse retriever.
//!
//! Both inputs are normalized, then each id gets
//! `sparse_weight * sparse + (1 - sparse_weight) * dense`, with a missing side
//! counting as zero. Ties on the combined score fall back to the rank on the
//! side with the larger weight (sparse when the weights are equal), then to
//! the rank on the other side. Ids that only appear on a side with zero weight
//! are dropped, so the boundary weights reproduce the pure retrievers.

use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::debug;

use crate::document::RetrievalResult;
use crate::error::{Result, RetrievalError};
use crate::normalize::normalize_results;
use crate::retriever::Retriever;

/// Linear score fusion of two retrievers.
#[derive(Debug)]
pub struct HybridRetriever {
    dense: Box<Retriever>,
    sparse: Box<Retriever>,
    sparse_weight: f32,
}

impl HybridRetriever {
    /// Fuse `dense` and `sparse` with the given weight on the sparse side.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::ConfigError`] if `sparse_weight` is outside
    /// `[0, 1]`.
    pub fn new(dense: Retriever, sparse: Retriever, sparse_weight: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&sparse_weight) {
            return Err(RetrievalError::ConfigError(format!(
                "sparse_weight must be within [0, 1], got {sparse_weight}"
            )));
        }
        Ok(Self { dense: Box::new(dense), sparse: Box::new(sparse), sparse_weight })
    }

    /// Weight applied to the sparse side.
    pub fn sparse_weight(&self) -> f32 {
        self.sparse_weight
    }

    pub(crate) fn retrieve(
        &mut self,
        corpus: &str,
        query: &str,
        top_k: usize,
        candidate_ids: Option<&[String]>,
    ) -> Result<Vec<RetrievalResult>> {
        let dense = self.dense.retrieve(corpus, query, top_k, candidate_ids)?;
        let sparse = self.sparse.retrieve(corpus, query, top_k, candidate_ids)?;
        debug!(corpus, dense = dense.len(), sparse = sparse.len(), "fusing hybrid results");
        Ok(fuse(dense, sparse, self.sparse_weight, top_k))
    }
}

struct Fused {
    result: RetrievalResult,
    dense_rank: Option<usize>,
    sparse_rank: Option<usize>,
    dense: f32,
    sparse: f32,
}

/// Fuse two ranked lists. Inputs are normalized here, so raw lists are fine.
pub fn fuse(
    mut dense: Vec<RetrievalResult>,
    mut sparse: Vec<RetrievalResult>,
    sparse_weight: f32,
    top_k: usize,
) -> Vec<RetrievalResult> {
    normalize_results(&mut dense);
    normalize_results(&mut sparse);

    let mut fused: Vec<Fused> = Vec::with_capacity(dense.len() + sparse.len());
    let mut positions: HashMap<String, usize> = HashMap::new();
    for (rank, result) in dense.into_iter().enumerate() {
        if positions.contains_key(&result.id) {
            continue;
        }
        positions.insert(result.id.clone(), fused.len());
        let dense = result.score;
        fused.push(Fused { result, dense_rank: Some(rank), sparse_rank: None, dense, sparse: 0.0 });
    }
    for (rank, result) in sparse.into_iter().enumerate() {
        match positions.get(&result.id) {
            Some(&position) => {
                let entry = &mut fused[position];
                if entry.sparse_rank.is_none() {
                    entry.sparse_rank = Some(rank);
                    entry.sparse = result.score;
                }
            }
            None => {
                positions.insert(result.id.clone(), fused.len());
                let sparse = result.score;
                fused.push(Fused {
                    result,
                    dense_rank: None,
                    sparse_rank: Some(rank),
                    dense: 0.0,
                    sparse,
                });
            }
        }
    }

    let dense_weight = 1.0 - sparse_weight;
    fused.retain(|f| {
        (f.dense_rank.is_some() && dense_weight > 0.0)
            || (f.sparse_rank.is_some() && sparse_weight > 0.0)
    });
    for f in &mut fused {
        f.result.score = sparse_weight * f.sparse + dense_weight * f.dense;
    }

    let sparse_first = sparse_weight >= 0.5;
    fused.sort_by(|a, b| {
        b.result
            .score
            .total_cmp(&a.result.score)
            .then_with(|| compare_ranks(a, b, sparse_first))
            .then_with(|| compare_ranks(a, b, !sparse_first))
    });
    fused.truncate(top_k);

    let mut results: Vec<RetrievalResult> = fused.into_iter().map(|f| f.result).collect();
    normalize_results(&mut results);
    results
}

// Present ranks sort before absent ones.
fn compare_ranks(a: &Fused, b: &Fused, sparse: bool) -> Ordering {
    let rank = |f: &Fused| if sparse { f.sparse_rank } else { f.dense_rank };
    rank(a).unwrap_or(usize::MAX).cmp(&rank(b).unwrap_or(usize::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Metadata;

    fn result(id: &str, score: f32) -> RetrievalResult {
        RetrievalResult { id: id.into(), content: id.into(), metadata: Metadata::new(), score }
    }

    fn ids(results: &[RetrievalResult]) -> Vec<&str> {
        results.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn combines_weighted_scores() {
        let dense = vec![result("a", 1.0), result("b", 0.5)];
        let sparse = vec![result("b", 1.0), result("c", 0.5)];
        let fused = fuse(dense, sparse, 0.5, 10);
        // a = 0.5, b = 0.75, c = 0.25 before renormalization
        assert_eq!(ids(&fused), vec!["b", "a", "c"]);
        assert_eq!(fused[0].score, 1.0);
        assert!((fused[1].score - 0.5 / 0.75).abs() < 1e-6);
    }

    #[test]
    fn boundary_weights_reproduce_single_side() {
        let dense = vec![result("a", 0.9), result("b", 0.9), result("c", 0.1)];
        let sparse = vec![result("c", 3.0), result("d", 1.0)];

        let only_dense = fuse(dense.clone(), sparse.clone(), 0.0, 10);
        assert_eq!(ids(&only_dense), vec!["a", "b", "c"]);

        let only_sparse = fuse(dense, sparse, 1.0, 10);
        assert_eq!(ids(&only_sparse), vec!["c", "d"]);
    }

    #[test]
    fn ties_follow_dominant_side_rank() {
        let dense = vec![result("x", 1.0), result("y", 1.0)];
        let sparse = vec![result("y", 1.0), result("x", 1.0)];
        assert_eq!(ids(&fuse(dense.clone(), sparse.clone(), 0.5, 2)), vec!["y", "x"]);
        assert_eq!(ids(&fuse(dense, sparse, 0.4, 2)), vec!["x", "y"]);
    }

    #[test]
    fn rejects_out_of_range_weight() {
        let dir = tempfile::tempdir().unwrap();
        let make = || {
            let db = crate::database::Database::corpus(dir.path()).unwrap();
            Retriever::Rerank(crate::reranker::Reranker::new(
                db,
                std::sync::Arc::new(crate::reranker::KeywordOverlapScorer::default()),
            ))
        };
        assert!(matches!(
            HybridRetriever::new(make(), make(), 1.5),
            Err(RetrievalError::ConfigError(_))
        ));
        assert!(HybridRetriever::new(make(), make(), f32::NAN).is_err());
        assert!(HybridRetriever::new(make(), make(), 0.3).is_ok());
    }
}
