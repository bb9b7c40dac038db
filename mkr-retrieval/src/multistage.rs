//! Cascaded retrieval.

use tracing::debug;

use crate::document::RetrievalResult;
use crate::error::{Result, RetrievalError};
use crate::retriever::Retriever;

/// Runs stages in order: stage 0 sees the caller's candidates, each later
/// stage is restricted to the ids returned by the previous one. Stage `i`
/// keeps `top_ks[i]` results and the final list is cut to the call's `top_k`.
#[derive(Debug)]
pub struct MultistageRetriever {
    stages: Vec<Retriever>,
    top_ks: Vec<usize>,
}

impl MultistageRetriever {
    /// Build a cascade where stage `i` keeps `top_ks[i]` results.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::ConfigError`] if there are no stages, the
    /// number of stages and `top_ks` differ, or the first stage is a
    /// reranker (which cannot produce candidates on its own).
    pub fn new(stages: Vec<Retriever>, top_ks: Vec<usize>) -> Result<Self> {
        if stages.is_empty() {
            return Err(RetrievalError::ConfigError("multistage needs at least one stage".into()));
        }
        if stages.len() != top_ks.len() {
            return Err(RetrievalError::ConfigError(format!(
                "{} stages but {} top_k values",
                stages.len(),
                top_ks.len()
            )));
        }
        if matches!(stages[0], Retriever::Rerank(_)) {
            return Err(RetrievalError::ConfigError(
                "the first stage cannot be a reranker".into(),
            ));
        }
        Ok(Self { stages, top_ks })
    }

    /// Per-stage result limits.
    pub fn top_ks(&self) -> &[usize] {
        &self.top_ks
    }

    pub(crate) fn retrieve(
        &mut self,
        corpus: &str,
        query: &str,
        top_k: usize,
        candidate_ids: Option<&[String]>,
    ) -> Result<Vec<RetrievalResult>> {
        let mut candidates: Option<Vec<String>> = candidate_ids.map(<[String]>::to_vec);
        let mut results = Vec::new();
        for (stage, (retriever, stage_k)) in self.stages.iter_mut().zip(&self.top_ks).enumerate() {
            results = retriever.retrieve(corpus, query, *stage_k, candidates.as_deref())?;
            debug!(
                corpus,
                stage,
                retriever = retriever.name(),
                top_k = *stage_k,
                returned = results.len(),
                "stage finished"
            );
            candidates = Some(results.iter().map(|r| r.id.clone()).collect());
        }
        results.truncate(top_k);
        Ok(results)
    }
}
