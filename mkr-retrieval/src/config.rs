//! Configuration for collections and databases.
//!
//! Every collection persists its [`IndexConfig`] next to its documents so a
//! reloaded collection scores exactly like the one that was saved.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RetrievalError};

/// The BM25 family member used by a lexical collection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Bm25Variant {
    /// Okapi BM25. Non-positive IDFs are floored at `epsilon * mean_idf`, and
    /// never below a small positive minimum.
    #[default]
    Okapi,
    /// BM25L: shifts the length-normalized term frequency by `delta`.
    L,
    /// BM25+: adds a `delta` lower bound to every matching query term.
    Plus,
}

impl Bm25Variant {
    /// Default parameters for this variant.
    pub fn default_params(self) -> Bm25Params {
        match self {
            Self::Okapi => Bm25Params { k1: 1.5, b: 0.75, delta: 0.0, epsilon: 0.25 },
            Self::L => Bm25Params { k1: 1.5, b: 0.75, delta: 0.5, epsilon: 0.0 },
            Self::Plus => Bm25Params { k1: 1.5, b: 0.75, delta: 1.0, epsilon: 0.0 },
        }
    }
}

impl std::str::FromStr for Bm25Variant {
    type Err = RetrievalError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "okapi" | "bm25_okapi" => Ok(Self::Okapi),
            "l" | "bm25_l" => Ok(Self::L),
            "plus" | "bm25_plus" => Ok(Self::Plus),
            other => Err(RetrievalError::ConfigError(format!("unknown BM25 variant: {other}"))),
        }
    }
}

/// Free parameters of the BM25 scoring function.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Bm25Params {
    /// Term frequency saturation.
    pub k1: f64,
    /// Document length normalization strength in `[0, 1]`.
    pub b: f64,
    /// Lower-bound shift used by BM25L and BM25+.
    pub delta: f64,
    /// Floor for non-positive Okapi IDFs, as a fraction of the mean IDF.
    pub epsilon: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Bm25Variant::Okapi.default_params()
    }
}

/// Configuration of a lexical (BM25) collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LexicalConfig {
    /// Identifier of the tokenizer that segmented the indexed text.
    pub tokenizer: String,
    /// The BM25 variant.
    pub variant: Bm25Variant,
    /// Scoring parameters.
    pub params: Bm25Params,
}

impl Default for LexicalConfig {
    fn default() -> Self {
        Self {
            tokenizer: crate::tokenizer::SimpleTokenizer::NAME.to_string(),
            variant: Bm25Variant::Okapi,
            params: Bm25Params::default(),
        }
    }
}

impl LexicalConfig {
    /// Create a new builder for constructing a [`LexicalConfig`].
    pub fn builder() -> LexicalConfigBuilder {
        LexicalConfigBuilder::default()
    }
}

/// Builder for constructing a validated [`LexicalConfig`].
#[derive(Debug, Clone, Default)]
pub struct LexicalConfigBuilder {
    config: LexicalConfig,
    params_overridden: bool,
}

impl LexicalConfigBuilder {
    /// Set the tokenizer identifier.
    pub fn tokenizer(mut self, name: impl Into<String>) -> Self {
        self.config.tokenizer = name.into();
        self
    }

    /// Select the BM25 variant. Resets parameters to the variant's defaults
    /// unless [`params`](Self::params) was already called.
    pub fn variant(mut self, variant: Bm25Variant) -> Self {
        self.config.variant = variant;
        if !self.params_overridden {
            self.config.params = variant.default_params();
        }
        self
    }

    /// Override the scoring parameters.
    pub fn params(mut self, params: Bm25Params) -> Self {
        self.config.params = params;
        self.params_overridden = true;
        self
    }

    /// Build the [`LexicalConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::ConfigError`] if:
    /// - the tokenizer identifier is empty
    /// - `k1`, `delta` or `epsilon` is negative
    /// - `b` is outside `[0, 1]`
    pub fn build(self) -> Result<LexicalConfig> {
        let LexicalConfig { tokenizer, params, .. } = &self.config;
        if tokenizer.trim().is_empty() {
            return Err(RetrievalError::ConfigError("tokenizer must not be empty".to_string()));
        }
        if params.k1 < 0.0 || params.delta < 0.0 || params.epsilon < 0.0 {
            return Err(RetrievalError::ConfigError(format!(
                "k1 ({}), delta ({}) and epsilon ({}) must be non-negative",
                params.k1, params.delta, params.epsilon
            )));
        }
        if !(0.0..=1.0).contains(&params.b) {
            return Err(RetrievalError::ConfigError(format!(
                "b ({}) must be within [0, 1]",
                params.b
            )));
        }
        Ok(self.config)
    }
}

/// Similarity used by a vector collection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Raw inner product. Vectors are assumed to be L2-normalized already.
    #[default]
    InnerProduct,
    /// Cosine similarity. Stored and query vectors are L2-normalized first.
    Cosine,
}

/// Configuration of a vector collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorConfig {
    /// Identifier of the encoder that produced the vectors.
    pub model: String,
    /// Vector dimensionality.
    pub dimensions: usize,
    /// Similarity metric.
    #[serde(default)]
    pub metric: Metric,
}

impl VectorConfig {
    /// Create a vector configuration, validating the dimensionality.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::ConfigError`] if `dimensions == 0` or the
    /// model identifier is empty.
    pub fn new(model: impl Into<String>, dimensions: usize, metric: Metric) -> Result<Self> {
        let model = model.into();
        if model.trim().is_empty() {
            return Err(RetrievalError::ConfigError("model must not be empty".to_string()));
        }
        if dimensions == 0 {
            return Err(RetrievalError::ConfigError(
                "dimensions must be greater than zero".to_string(),
            ));
        }
        Ok(Self { model, dimensions, metric })
    }
}

/// The backend of a collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndexConfig {
    /// BM25 term matching over tokenized text.
    Lexical(LexicalConfig),
    /// Exact inner-product search over dense vectors.
    Vector(VectorConfig),
    /// Content-only storage with no scoring structure (used for reranking).
    Corpus,
}

impl IndexConfig {
    /// Short backend name used in logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Lexical(_) => "lexical",
            Self::Vector(_) => "vector",
            Self::Corpus => "corpus",
        }
    }
}

/// Configuration of a [`Database`](crate::database::Database).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    /// Storage root holding the manifest and the collection directories.
    pub root: PathBuf,
    /// Backend configuration applied to every collection created here.
    pub index: IndexConfig,
}

impl DatabaseConfig {
    /// Create a database configuration.
    pub fn new(root: impl Into<PathBuf>, index: IndexConfig) -> Self {
        Self { root: root.into(), index }
    }
}
