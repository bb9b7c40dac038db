//! The retriever algebra.
//!
//! A [`Retriever`] is a closed set of strategies sharing one signature:
//! `(corpus, query, top_k, candidate_ids) -> ranked results`. Every variant
//! returns scores normalized to `[0, 1]` with the best result at `1.0`.
//!
//! # Example
//!
//! ```rust,ignore
//! use mkr_retrieval::{Database, LexicalConfig, Retriever, SimpleTokenizer, SparseRetriever};
//!
//! let tokenizer = Arc::new(SimpleTokenizer);
//! let database = Database::lexical("index/sparse", LexicalConfig::default(), tokenizer)?;
//! let mut retriever = Retriever::from(SparseRetriever::new(database)?);
//! let results = retriever.retrieve("wiki", "rust ownership", 10, None)?;
//! ```

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::collection::Query;
use crate::config::IndexConfig;
use crate::database::Database;
use crate::document::{Metadata, RetrievalResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{Result, RetrievalError};
use crate::hybrid::HybridRetriever;
use crate::ingest::CorpusRecord;
use crate::multistage::MultistageRetriever;
use crate::normalize::normalize_results;
use crate::reranker::Reranker;

/// A retrieval strategy.
#[derive(Debug)]
pub enum Retriever {
    /// BM25 over a lexical database.
    Sparse(SparseRetriever),
    /// Inner-product search over a vector database.
    Dense(DenseRetriever),
    /// Weighted fusion of a dense and a sparse retriever.
    Hybrid(HybridRetriever),
    /// A cascade where each stage re-scores the previous stage's output.
    Multistage(MultistageRetriever),
    /// Cross-encoder re-scoring of given candidates.
    Rerank(Reranker),
}

impl Retriever {
    /// Retrieve at most `top_k` results for `query` from the collection
    /// `corpus`, optionally restricted to `candidate_ids`.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::CollectionNotFound`] if `corpus` is not
    /// registered, [`RetrievalError::MissingCandidates`] if a reranker is
    /// called without candidates, and any backend error.
    pub fn retrieve(
        &mut self,
        corpus: &str,
        query: &str,
        top_k: usize,
        candidate_ids: Option<&[String]>,
    ) -> Result<Vec<RetrievalResult>> {
        match self {
            Self::Sparse(retriever) => retriever.retrieve(corpus, query, top_k, candidate_ids),
            Self::Dense(retriever) => retriever.retrieve(corpus, query, top_k, candidate_ids),
            Self::Hybrid(retriever) => retriever.retrieve(corpus, query, top_k, candidate_ids),
            Self::Multistage(retriever) => retriever.retrieve(corpus, query, top_k, candidate_ids),
            Self::Rerank(reranker) => reranker.retrieve(corpus, query, top_k, candidate_ids),
        }
    }

    /// Short strategy name used in logs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sparse(_) => "sparse",
            Self::Dense(_) => "dense",
            Self::Hybrid(_) => "hybrid",
            Self::Multistage(_) => "multistage",
            Self::Rerank(_) => "rerank",
        }
    }

    /// Build a two-stage cascade: `first` fetches `top_ks[0]` candidates and
    /// `reranker` keeps `top_ks[1]` of them.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::ConfigError`] if `first` is itself a reranker.
    pub fn two_stage(first: Retriever, reranker: Reranker, top_ks: [usize; 2]) -> Result<Self> {
        MultistageRetriever::new(vec![first, Self::Rerank(reranker)], top_ks.to_vec())
            .map(Self::Multistage)
    }
}

impl From<SparseRetriever> for Retriever {
    fn from(retriever: SparseRetriever) -> Self {
        Self::Sparse(retriever)
    }
}

impl From<DenseRetriever> for Retriever {
    fn from(retriever: DenseRetriever) -> Self {
        Self::Dense(retriever)
    }
}

impl From<HybridRetriever> for Retriever {
    fn from(retriever: HybridRetriever) -> Self {
        Self::Hybrid(retriever)
    }
}

impl From<MultistageRetriever> for Retriever {
    fn from(retriever: MultistageRetriever) -> Self {
        Self::Multistage(retriever)
    }
}

impl From<Reranker> for Retriever {
    fn from(reranker: Reranker) -> Self {
        Self::Rerank(reranker)
    }
}

/// Lexical retrieval over a BM25 [`Database`].
#[derive(Debug)]
pub struct SparseRetriever {
    database: Database,
}

impl SparseRetriever {
    /// Wrap a lexical database.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::ConfigError`] if the database is not lexical.
    pub fn new(database: Database) -> Result<Self> {
        if !matches!(database.config().index, IndexConfig::Lexical(_)) {
            return Err(RetrievalError::ConfigError(format!(
                "sparse retriever needs a lexical database, got {}",
                database.config().index.kind()
            )));
        }
        Ok(Self { database })
    }

    /// The underlying database.
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Index `records` into the collection `corpus`, creating it if needed.
    ///
    /// The indexed text is the record's title (when present) followed by its
    /// content. Records whose id is already stored are skipped. Returns the
    /// number of new documents.
    pub fn add_corpus(&mut self, corpus: &str, records: &[CorpusRecord]) -> Result<usize> {
        let ids: Vec<String> = records.iter().map(CorpusRecord::id).collect();
        let texts: Vec<String> = records.iter().map(CorpusRecord::lexical_text).collect();
        let metadatas: Vec<Metadata> = records.iter().map(|r| r.metadata.clone()).collect();
        let added = self.database.create_or_get(corpus)?.add(&ids, &texts, &metadatas, None)?;
        info!(corpus, records = records.len(), added, "indexed sparse corpus");
        Ok(added)
    }

    /// Persist pending changes.
    pub fn save(&mut self) -> Result<()> {
        self.database.save()
    }

    fn retrieve(
        &mut self,
        corpus: &str,
        query: &str,
        top_k: usize,
        candidate_ids: Option<&[String]>,
    ) -> Result<Vec<RetrievalResult>> {
        let collection = self.database.get(corpus)?;
        let mut results = collection.search(Query::Text(query), top_k, candidate_ids)?;
        normalize_results(&mut results);
        debug!(corpus, top_k, returned = results.len(), "sparse retrieval");
        Ok(results)
    }
}

/// Dense retrieval over a vector [`Database`] with a query encoder.
pub struct DenseRetriever {
    database: Database,
    encoder: Arc<dyn EmbeddingProvider>,
}

impl fmt::Debug for DenseRetriever {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DenseRetriever")
            .field("database", &self.database)
            .field("encoder", &self.encoder.name())
            .finish()
    }
}

impl DenseRetriever {
    /// Wrap a vector database with the encoder that produced its vectors.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::ConfigError`] if the database is not a
    /// vector database or the encoder's name or dimensionality differs from
    /// the database configuration.
    pub fn new(database: Database, encoder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let IndexConfig::Vector(config) = &database.config().index else {
            return Err(RetrievalError::ConfigError(format!(
                "dense retriever needs a vector database, got {}",
                database.config().index.kind()
            )));
        };
        if config.model != encoder.name() || config.dimensions != encoder.dimensions() {
            return Err(RetrievalError::ConfigError(format!(
                "encoder '{}' ({} dimensions) does not match database model '{}' ({} dimensions)",
                encoder.name(),
                encoder.dimensions(),
                config.model,
                config.dimensions
            )));
        }
        Ok(Self { database, encoder })
    }

    /// The underlying database.
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Encode and index `records` into the collection `corpus` in batches of
    /// `batch_size`, creating the collection if needed.
    ///
    /// Only records whose id is not yet stored are encoded. Returns the
    /// number of new documents.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::InvalidInput`] if `batch_size` is zero and
    /// [`RetrievalError::EmbeddingError`] if the encoder fails or returns the
    /// wrong number of vectors.
    pub fn add_corpus(
        &mut self,
        corpus: &str,
        records: &[CorpusRecord],
        batch_size: usize,
    ) -> Result<usize> {
        if batch_size == 0 {
            return Err(RetrievalError::InvalidInput("batch_size must be greater than 0".into()));
        }
        let collection = self.database.create_or_get(corpus)?;

        let mut seen = HashSet::new();
        let pending: Vec<(String, &CorpusRecord)> = records
            .iter()
            .map(|record| (record.id(), record))
            .filter(|(id, _)| !collection.contains(id) && seen.insert(id.clone()))
            .collect();

        let mut added = 0;
        for batch in pending.chunks(batch_size) {
            let texts: Vec<&str> = batch.iter().map(|(_, r)| r.content.as_str()).collect();
            let vectors = self
                .encoder
                .embed_batch(&texts)
                .inspect_err(|e| error!(corpus, error = %e, "embedding failed during indexing"))?;
            if vectors.len() != batch.len() {
                return Err(RetrievalError::EmbeddingError {
                    provider: self.encoder.name().to_string(),
                    message: format!("{} vectors for {} texts", vectors.len(), batch.len()),
                });
            }
            let ids: Vec<String> = batch.iter().map(|(id, _)| id.clone()).collect();
            let contents: Vec<String> = batch.iter().map(|(_, r)| r.content.clone()).collect();
            let metadatas: Vec<Metadata> = batch.iter().map(|(_, r)| r.metadata.clone()).collect();
            added += collection.add(&ids, &contents, &metadatas, Some(&vectors))?;
            debug!(corpus, batch = batch.len(), added, "encoded batch");
        }
        info!(corpus, records = records.len(), added, "indexed dense corpus");
        Ok(added)
    }

    /// Persist pending changes.
    pub fn save(&mut self) -> Result<()> {
        self.database.save()
    }

    fn retrieve(
        &mut self,
        corpus: &str,
        query: &str,
        top_k: usize,
        candidate_ids: Option<&[String]>,
    ) -> Result<Vec<RetrievalResult>> {
        let collection = self.database.get(corpus)?;
        let embedding = self.encoder.embed(query)?;
        let mut results = collection.search(Query::Vector(&embedding), top_k, candidate_ids)?;
        normalize_results(&mut results);
        debug!(corpus, top_k, returned = results.len(), "dense retrieval");
        Ok(results)
    }
}
