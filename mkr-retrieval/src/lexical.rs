//! BM25 scoring over tokenized documents.
//!
//! [`LexicalIndex`] keeps one term-frequency table per stored document, in
//! insertion order. Corpus statistics (IDF table, average document length)
//! are an explicit cache guarded by a dirty flag: [`push`](LexicalIndex::push)
//! marks them stale and the next scoring call rebuilds them.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{Bm25Variant, LexicalConfig};

/// Smallest IDF a present term can carry under Okapi.
const MIN_OKAPI_IDF: f64 = 1e-6;

/// Term counts of one indexed document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TermCounts {
    /// Occurrences of each token in the document.
    pub frequencies: HashMap<String, u32>,
    /// Total number of tokens in the document.
    pub length: u32,
}

impl TermCounts {
    /// Count the tokens of one document.
    pub fn from_tokens(tokens: &[String]) -> Self {
        let mut frequencies = HashMap::new();
        for token in tokens {
            *frequencies.entry(token.clone()).or_insert(0) += 1;
        }
        Self { frequencies, length: tokens.len() as u32 }
    }
}

#[derive(Debug, Clone, Default)]
struct CorpusStats {
    idf: HashMap<String, f64>,
    avg_length: f64,
}

/// A BM25 index over the documents of one collection.
#[derive(Debug, Clone)]
pub struct LexicalIndex {
    config: LexicalConfig,
    documents: Vec<TermCounts>,
    stats: CorpusStats,
    dirty: bool,
}

impl LexicalIndex {
    /// Create an empty index.
    pub fn new(config: LexicalConfig) -> Self {
        Self::from_parts(config, Vec::new())
    }

    /// Rebuild an index from persisted term counts.
    pub fn from_parts(config: LexicalConfig, documents: Vec<TermCounts>) -> Self {
        Self { config, documents, stats: CorpusStats::default(), dirty: true }
    }

    /// The configuration this index scores with.
    pub fn config(&self) -> &LexicalConfig {
        &self.config
    }

    /// Per-document term counts in insertion order.
    pub fn documents(&self) -> &[TermCounts] {
        &self.documents
    }

    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the index holds no documents.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Whether corpus statistics must be rebuilt before the next search.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Append one tokenized document and invalidate corpus statistics.
    pub fn push(&mut self, tokens: &[String]) {
        self.documents.push(TermCounts::from_tokens(tokens));
        self.dirty = true;
    }

    /// Score the documents at `rows` (or every document when `None`) against
    /// the query tokens. Statistics always come from the full corpus.
    pub fn score(&mut self, query: &[String], rows: Option<&[usize]>) -> Vec<(usize, f32)> {
        self.refresh();
        match rows {
            Some(rows) => rows
                .iter()
                .filter(|row| **row < self.documents.len())
                .map(|row| (*row, self.score_document(query, *row)))
                .collect(),
            None => (0..self.documents.len())
                .map(|row| (row, self.score_document(query, row)))
                .collect(),
        }
    }

    fn refresh(&mut self) {
        if !self.dirty {
            return;
        }
        let total_length: u64 = self.documents.iter().map(|d| u64::from(d.length)).sum();
        let avg_length = if self.documents.is_empty() {
            0.0
        } else {
            total_length as f64 / self.documents.len() as f64
        };

        let mut document_frequency: BTreeMap<&str, u32> = BTreeMap::new();
        for document in &self.documents {
            for term in document.frequencies.keys() {
                *document_frequency.entry(term.as_str()).or_insert(0) += 1;
            }
        }

        let n = self.documents.len() as f64;
        let mut idf = HashMap::with_capacity(document_frequency.len());
        match self.config.variant {
            Bm25Variant::Okapi => {
                let mut sum = 0.0;
                let mut negative = Vec::new();
                for (term, df) in &document_frequency {
                    let df = f64::from(*df);
                    let value = ((n - df + 0.5) / (df + 0.5)).ln();
                    sum += value;
                    if value <= 0.0 {
                        negative.push(*term);
                    }
                    idf.insert((*term).to_string(), value);
                }
                let mean = if document_frequency.is_empty() {
                    0.0
                } else {
                    sum / document_frequency.len() as f64
                };
                // A matching term must never score at or below a missing one.
                let floor = (self.config.params.epsilon * mean).max(MIN_OKAPI_IDF);
                for term in negative {
                    idf.insert(term.to_string(), floor);
                }
            }
            Bm25Variant::L => {
                for (term, df) in &document_frequency {
                    idf.insert((*term).to_string(), ((n + 1.0) / (f64::from(*df) + 0.5)).ln());
                }
            }
            Bm25Variant::Plus => {
                for (term, df) in &document_frequency {
                    idf.insert((*term).to_string(), ((n + 1.0) / f64::from(*df)).ln());
                }
            }
        }

        debug!(
            documents = self.documents.len(),
            terms = idf.len(),
            avg_length,
            "rebuilt BM25 statistics"
        );
        self.stats = CorpusStats { idf, avg_length };
        self.dirty = false;
    }

    fn score_document(&self, query: &[String], row: usize) -> f32 {
        let document = &self.documents[row];
        let params = &self.config.params;
        let length_norm = if self.stats.avg_length > 0.0 {
            1.0 - params.b + params.b * f64::from(document.length) / self.stats.avg_length
        } else {
            1.0
        };

        let mut score = 0.0;
        for term in query {
            let Some(idf) = self.stats.idf.get(term) else {
                continue;
            };
            let tf = f64::from(document.frequencies.get(term).copied().unwrap_or(0));
            score += match self.config.variant {
                Bm25Variant::Okapi => idf * tf * (params.k1 + 1.0) / (tf + params.k1 * length_norm),
                Bm25Variant::L => {
                    let ctd = tf / length_norm;
                    idf * (params.k1 + 1.0) * (ctd + params.delta)
                        / (params.k1 + ctd + params.delta)
                }
                Bm25Variant::Plus => {
                    idf * (params.delta
                        + tf * (params.k1 + 1.0) / (params.k1 * length_norm + tf))
                }
            };
        }
        if score.is_finite() { score as f32 } else { 0.0 }
    }
}
