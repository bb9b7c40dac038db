//! Cross-encoder reranking of candidate lists.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::database::Database;
use crate::document::RetrievalResult;
use crate::error::{Result, RetrievalError};
use crate::ingest::CorpusRecord;
use crate::normalize::normalize_results;
use crate::tokenizer::{SimpleTokenizer, Tokenizer};

/// A model that scores `(query, passage)` pairs jointly.
///
/// Implementations can wrap cross-encoder networks, LLM judges, or plain
/// heuristics. Higher scores mean more relevant.
pub trait CrossEncoder: Send + Sync {
    /// Identifier used in logs and errors.
    fn name(&self) -> &str;

    /// Score every passage against `query`, returning one score per passage
    /// in input order.
    fn score(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>>;
}

/// Scores passages by the fraction of distinct query terms they contain.
///
/// Terms shorter than `min_term_len` characters are ignored so stop words do
/// not dominate.
///
/// # Example
///
/// ```rust,ignore
/// use mkr_retrieval::{CrossEncoder, KeywordOverlapScorer};
///
/// let scorer = KeywordOverlapScorer::default();
/// let scores = scorer.score("rust ownership", &["ownership in rust", "python"])?;
/// assert!(scores[0] > scores[1]);
/// ```
pub struct KeywordOverlapScorer {
    tokenizer: Arc<dyn Tokenizer>,
    min_term_len: usize,
}

impl fmt::Debug for KeywordOverlapScorer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeywordOverlapScorer")
            .field("tokenizer", &self.tokenizer.name())
            .field("min_term_len", &self.min_term_len)
            .finish()
    }
}

impl Default for KeywordOverlapScorer {
    fn default() -> Self {
        Self::new(Arc::new(SimpleTokenizer), 3)
    }
}

impl KeywordOverlapScorer {
    /// Create a scorer using `tokenizer` and ignoring terms shorter than
    /// `min_term_len`.
    pub fn new(tokenizer: Arc<dyn Tokenizer>, min_term_len: usize) -> Self {
        Self { tokenizer, min_term_len }
    }
}

impl CrossEncoder for KeywordOverlapScorer {
    fn name(&self) -> &str {
        "keyword-overlap"
    }

    fn score(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>> {
        let terms: HashSet<String> = self
            .tokenizer
            .segment(query)
            .into_iter()
            .filter(|t| t.chars().count() >= self.min_term_len)
            .collect();
        if terms.is_empty() {
            return Ok(vec![0.0; passages.len()]);
        }
        Ok(passages
            .iter()
            .map(|passage| {
                let tokens: HashSet<String> = self.tokenizer.segment(passage).into_iter().collect();
                let matched = terms.iter().filter(|t| tokens.contains(*t)).count();
                matched as f32 / terms.len() as f32
            })
            .collect())
    }
}

/// Re-scores candidate ids with a [`CrossEncoder`], fetching their text from
/// a [`Database`].
///
/// Any backend works as the content source; a content-only database is the
/// usual choice.
pub struct Reranker {
    database: Database,
    scorer: Arc<dyn CrossEncoder>,
}

impl fmt::Debug for Reranker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reranker")
            .field("database", &self.database)
            .field("scorer", &self.scorer.name())
            .finish()
    }
}

impl Reranker {
    /// Create a reranker reading content from `database`.
    pub fn new(database: Database, scorer: Arc<dyn CrossEncoder>) -> Self {
        Self { database, scorer }
    }

    /// The content database.
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Store `records` in the collection `corpus` so candidates can be
    /// resolved to text. Returns the number of new documents.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::InvalidInput`] if the database needs
    /// vectors.
    pub fn add_corpus(&mut self, corpus: &str, records: &[CorpusRecord]) -> Result<usize> {
        let documents: Vec<_> = records.iter().map(CorpusRecord::to_document).collect();
        let added = self.database.create_or_get(corpus)?.add_documents(&documents, None)?;
        info!(corpus, records = records.len(), added, "stored rerank corpus");
        Ok(added)
    }

    /// Persist pending changes.
    pub fn save(&mut self) -> Result<()> {
        self.database.save()
    }

    pub(crate) fn retrieve(
        &mut self,
        corpus: &str,
        query: &str,
        top_k: usize,
        candidate_ids: Option<&[String]>,
    ) -> Result<Vec<RetrievalResult>> {
        let candidates = candidate_ids.ok_or(RetrievalError::MissingCandidates)?;
        let collection = self.database.get(corpus)?;

        let mut seen = HashSet::new();
        let unique: Vec<String> =
            candidates.iter().filter(|id| seen.insert(*id)).cloned().collect();
        let documents = collection.documents(&unique);
        if documents.len() < unique.len() {
            debug!(
                corpus,
                candidates = unique.len(),
                found = documents.len(),
                "dropped unknown candidates"
            );
        }
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let passages: Vec<&str> = documents.iter().map(|d| d.content.as_str()).collect();
        let scores = self.scorer.score(query, &passages).inspect_err(|e| {
            error!(corpus, reranker = self.scorer.name(), error = %e, "reranking failed");
        })?;
        if scores.len() != documents.len() {
            return Err(RetrievalError::RerankerError {
                reranker: self.scorer.name().to_string(),
                message: format!("{} scores for {} passages", scores.len(), documents.len()),
            });
        }

        let mut results: Vec<RetrievalResult> = documents
            .iter()
            .zip(scores)
            .map(|(document, score)| {
                let score = if score.is_finite() { score } else { 0.0 };
                RetrievalResult::from_document(document, score)
            })
            .collect();
        // Stable: equal scores keep candidate order.
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(top_k);
        normalize_results(&mut results);
        debug!(corpus, top_k, returned = results.len(), "reranked candidates");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Metadata;
    use crate::retriever::Retriever;

    struct FixedScorer(Vec<f32>);

    impl CrossEncoder for FixedScorer {
        fn name(&self) -> &str {
            "fixed"
        }

        fn score(&self, _query: &str, passages: &[&str]) -> Result<Vec<f32>> {
            Ok(self.0.iter().copied().take(passages.len()).collect())
        }
    }

    fn setup(root: &std::path::Path, scorer: Arc<dyn CrossEncoder>) -> (Retriever, Vec<String>) {
        let mut reranker = Reranker::new(Database::corpus(root).unwrap(), scorer);
        let records: Vec<CorpusRecord> = ["rust ownership", "python typing", "rust traits"]
            .iter()
            .map(|t| CorpusRecord::new(*t, Metadata::new()))
            .collect();
        reranker.add_corpus("wiki", &records).unwrap();
        let ids = records.iter().map(CorpusRecord::id).collect();
        (Retriever::Rerank(reranker), ids)
    }

    #[test]
    fn keyword_overlap_counts_distinct_terms() {
        let scorer = KeywordOverlapScorer::default();
        let scores =
            scorer.score("Rust ownership is fun", &["ownership in rust", "rust", "go"]).unwrap();
        assert!((scores[0] - 2.0 / 3.0).abs() < 1e-6);
        assert!((scores[1] - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(scores[2], 0.0);
    }

    #[test]
    fn requires_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let (mut reranker, _) = setup(dir.path(), Arc::new(KeywordOverlapScorer::default()));
        assert!(matches!(
            reranker.retrieve("wiki", "rust", 2, None),
            Err(RetrievalError::MissingCandidates)
        ));
    }

    #[test]
    fn reorders_candidates_and_drops_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let (mut reranker, ids) = setup(dir.path(), Arc::new(KeywordOverlapScorer::default()));
        let candidates =
            vec![ids[1].clone(), "missing".to_string(), ids[0].clone(), ids[1].clone()];
        let results = reranker.retrieve("wiki", "rust ownership", 5, Some(&candidates)).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, ids[0]);
        assert_eq!(results[0].score, 1.0);
        assert_eq!(results[1].score, 0.0);
    }

    #[test]
    fn ties_keep_candidate_order() {
        let dir = tempfile::tempdir().unwrap();
        let (mut reranker, ids) = setup(dir.path(), Arc::new(FixedScorer(vec![0.5, 0.5, 0.5])));
        let candidates = vec![ids[2].clone(), ids[0].clone(), ids[1].clone()];
        let results = reranker.retrieve("wiki", "q", 2, Some(&candidates)).unwrap();
        assert_eq!(results.iter().map(|r| r.id.clone()).collect::<Vec<_>>(), candidates[..2]);
    }

    #[test]
    fn score_count_mismatch_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let (mut reranker, ids) = setup(dir.path(), Arc::new(FixedScorer(vec![0.5])));
        assert!(matches!(
            reranker.retrieve("wiki", "q", 2, Some(&ids)),
            Err(RetrievalError::RerankerError { .. })
        ));
    }
}
