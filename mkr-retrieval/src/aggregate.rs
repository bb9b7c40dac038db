//! Passage-to-document aggregation.
//!
//! Passage ids have the form `<document id>-<index>`. Scores of passages that
//! share a document id are summed, and documents are ranked by that sum.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::document::{Metadata, RetrievalResult};
use crate::error::{Result, RetrievalError};
use crate::retriever::Retriever;

/// Default multiplier from requested documents to fetched passages.
pub const DEFAULT_PASSAGE_DEPTH_FACTOR: usize = 10;

/// A document ranked by the summed score of its passages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentResult {
    /// The document id shared by the passages.
    pub id: String,
    /// Sum of passage scores.
    pub score: f32,
    /// Metadata of the highest-ranked passage.
    pub metadata: Metadata,
    /// Contributing passages in retrieval order.
    pub passages: Vec<RetrievalResult>,
}

/// The document id of a passage id: the text before the last `-` when what
/// follows is a non-negative integer, otherwise the whole id.
///
/// ```rust
/// use mkr_retrieval::passage_document_id;
///
/// assert_eq!(passage_document_id("wiki-page-12"), "wiki-page");
/// assert_eq!(passage_document_id("wiki-page"), "wiki-page");
/// ```
pub fn passage_document_id(passage_id: &str) -> &str {
    match passage_id.rsplit_once('-') {
        Some((document, index))
            if !document.is_empty()
                && !index.is_empty()
                && index.bytes().all(|b| b.is_ascii_digit()) =>
        {
            document
        }
        _ => passage_id,
    }
}

/// Group passages by document id, sum their scores, and return the `top_k`
/// best documents. Ties keep the order in which documents first appeared.
pub fn aggregate_passages(passages: Vec<RetrievalResult>, top_k: usize) -> Vec<DocumentResult> {
    let mut documents: Vec<DocumentResult> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for passage in passages {
        let id = passage_document_id(&passage.id).to_string();
        match positions.get(&id) {
            Some(&position) => {
                let document = &mut documents[position];
                document.score += passage.score;
                document.passages.push(passage);
            }
            None => {
                positions.insert(id.clone(), documents.len());
                documents.push(DocumentResult {
                    id,
                    score: passage.score,
                    metadata: passage.metadata.clone(),
                    passages: vec![passage],
                });
            }
        }
    }
    documents.sort_by(|a, b| b.score.total_cmp(&a.score));
    documents.truncate(top_k);
    documents
}

/// Wraps a passage [`Retriever`] and returns documents.
#[derive(Debug)]
pub struct DocumentRetriever {
    retriever: Retriever,
    passage_depth_factor: usize,
}

impl DocumentRetriever {
    /// Wrap `retriever` with the default passage depth factor.
    pub fn new(retriever: Retriever) -> Self {
        Self { retriever, passage_depth_factor: DEFAULT_PASSAGE_DEPTH_FACTOR }
    }

    /// Fetch `top_k * factor` passages per query.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::ConfigError`] if `factor` is zero.
    pub fn with_passage_depth_factor(mut self, factor: usize) -> Result<Self> {
        if factor == 0 {
            return Err(RetrievalError::ConfigError(
                "passage_depth_factor must be greater than 0".into(),
            ));
        }
        self.passage_depth_factor = factor;
        Ok(self)
    }

    /// The wrapped passage retriever.
    pub fn retriever_mut(&mut self) -> &mut Retriever {
        &mut self.retriever
    }

    /// Retrieve passages and aggregate them into at most `top_k` documents.
    pub fn retrieve(
        &mut self,
        corpus: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<DocumentResult>> {
        let depth = top_k.saturating_mul(self.passage_depth_factor);
        let passages = self.retriever.retrieve(corpus, query, depth, None)?;
        let fetched = passages.len();
        let documents = aggregate_passages(passages, top_k);
        debug!(corpus, passages = fetched, documents = documents.len(), "aggregated passages");
        Ok(documents)
    }
}
