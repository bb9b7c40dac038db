//! Named document collections with a lexical, vector, or content-only backend.
//!
//! A [`Collection`] stores documents as parallel arrays in insertion order
//! plus a backend index holding exactly one entry per stored document. Adding
//! an id that is already present is a no-op, which makes ingestion resumable.
//!
//! On disk a collection is one directory:
//!
//! ```text
//! config.json          backend kind and identifiers
//! corpus.jsonl         {"id", "content", "metadata"} per line
//! lexical_index.json   per-document term counts (lexical only)
//! embeddings.bin       row-major little-endian f32 matrix (vector only)
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::IndexConfig;
use crate::document::{Document, Metadata, RetrievalResult};
use crate::error::{Result, RetrievalError};
use crate::lexical::{LexicalIndex, TermCounts};
use crate::persist;
use crate::tokenizer::Tokenizer;
use crate::vector::VectorIndex;

const CONFIG_FILE: &str = "config.json";
const CORPUS_FILE: &str = "corpus.jsonl";
const LEXICAL_FILE: &str = "lexical_index.json";
const EMBEDDINGS_FILE: &str = "embeddings.bin";

/// A query in the form the collection backend scores.
#[derive(Debug, Clone, Copy)]
pub enum Query<'a> {
    /// Raw text, tokenized by a lexical collection.
    Text(&'a str),
    /// A dense vector, scored by a vector collection.
    Vector(&'a [f32]),
}

enum Index {
    Lexical { index: LexicalIndex, tokenizer: Arc<dyn Tokenizer> },
    Vector(VectorIndex),
    Corpus,
}

#[derive(Serialize)]
struct StoredDocument<'a> {
    id: &'a str,
    content: &'a str,
    metadata: &'a Metadata,
}

/// A named set of documents plus its backend index.
pub struct Collection {
    name: String,
    path: PathBuf,
    config: IndexConfig,
    ids: Vec<String>,
    contents: Vec<String>,
    metadatas: Vec<Metadata>,
    positions: HashMap<String, usize>,
    index: Index,
    dirty: bool,
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("kind", &self.config.kind())
            .field("len", &self.ids.len())
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl Collection {
    /// Create an empty, unsaved collection stored under `path`.
    ///
    /// Lexical collections need a tokenizer whose name matches the
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::ConfigError`] if a lexical collection has no
    /// matching tokenizer.
    pub fn create(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        config: IndexConfig,
        tokenizer: Option<Arc<dyn Tokenizer>>,
    ) -> Result<Self> {
        let index = build_index(&config, tokenizer)?;
        Ok(Self {
            name: name.into(),
            path: path.into(),
            config,
            ids: Vec::new(),
            contents: Vec::new(),
            metadatas: Vec::new(),
            positions: HashMap::new(),
            index,
            dirty: true,
        })
    }

    /// Load a saved collection from `path`.
    ///
    /// The persisted configuration must have the same backend kind and
    /// identifiers (tokenizer, model, dimensions) as `expected`; scoring
    /// parameters are taken from disk.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::CorruptState`] if the configuration, corpus,
    /// or backend artifact is missing or inconsistent, and
    /// [`RetrievalError::ConfigError`] on an identifier mismatch.
    pub fn load(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        expected: &IndexConfig,
        tokenizer: Option<Arc<dyn Tokenizer>>,
    ) -> Result<Self> {
        let name = name.into();
        let path = path.into();
        let config: IndexConfig = persist::read_json(&path.join(CONFIG_FILE))?;
        check_compatible(&name, &config, expected)?;

        let documents: Vec<Document> = persist::read_jsonl(&path.join(CORPUS_FILE))?;
        let count = documents.len();

        let index = match build_index(&config, tokenizer)? {
            Index::Lexical { index, tokenizer } => {
                let artifact = path.join(LEXICAL_FILE);
                let terms: Vec<TermCounts> = persist::read_json(&artifact)?;
                if terms.len() != count {
                    return Err(persist::corrupt(
                        &artifact,
                        format!("{} term tables for {count} documents", terms.len()),
                    ));
                }
                let index = LexicalIndex::from_parts(index.config().clone(), terms);
                Index::Lexical { index, tokenizer }
            }
            Index::Vector(index) => {
                let artifact = path.join(EMBEDDINGS_FILE);
                let mut file = persist::open_required(&artifact)?;
                let loaded = VectorIndex::read_from(index.config().clone(), &mut file, count)
                    .map_err(|e| persist::corrupt(&artifact, e))?;
                Index::Vector(loaded)
            }
            Index::Corpus => Index::Corpus,
        };

        let mut collection = Self {
            name,
            path,
            config,
            ids: Vec::with_capacity(count),
            contents: Vec::with_capacity(count),
            metadatas: Vec::with_capacity(count),
            positions: HashMap::with_capacity(count),
            index,
            dirty: false,
        };
        for document in documents {
            if collection.positions.contains_key(&document.id) {
                return Err(persist::corrupt(
                    &collection.path.join(CORPUS_FILE),
                    format!("duplicate document id '{}'", document.id),
                ));
            }
            collection.positions.insert(document.id.clone(), collection.ids.len());
            collection.ids.push(document.id);
            collection.contents.push(document.content);
            collection.metadatas.push(document.metadata);
        }

        info!(
            collection = %collection.name,
            kind = collection.config.kind(),
            documents = count,
            "loaded collection"
        );
        Ok(collection)
    }

    /// The collection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The storage directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The backend configuration.
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the collection holds no documents.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Whether a document with `id` is stored.
    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    /// Document ids in insertion order.
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Whether the collection has changes that [`save`](Self::save) has not
    /// written yet.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Fetch a stored document.
    pub fn get(&self, id: &str) -> Option<Document> {
        self.positions.get(id).map(|row| self.document(*row))
    }

    /// Fetch stored documents in the order of `ids`, skipping unknown ids.
    pub fn documents(&self, ids: &[String]) -> Vec<Document> {
        ids.iter().filter_map(|id| self.get(id)).collect()
    }

    fn document(&self, row: usize) -> Document {
        Document {
            id: self.ids[row].clone(),
            content: self.contents[row].clone(),
            metadata: self.metadatas[row].clone(),
        }
    }

    /// Add documents given as parallel arrays, skipping ids already present.
    ///
    /// Vector collections require one vector per id; other backends reject
    /// vectors. All input is validated before anything is stored, so a
    /// rejected call leaves the collection unchanged.
    ///
    /// Returns the number of newly stored documents.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::InvalidInput`] on length mismatches, empty
    /// ids, missing or unexpected vectors, or wrong vector dimensions.
    pub fn add(
        &mut self,
        ids: &[String],
        contents: &[String],
        metadatas: &[Metadata],
        vectors: Option<&[Vec<f32>]>,
    ) -> Result<usize> {
        if ids.len() != contents.len() || ids.len() != metadatas.len() {
            return Err(RetrievalError::InvalidInput(format!(
                "ids ({}), contents ({}) and metadatas ({}) must have equal length",
                ids.len(),
                contents.len(),
                metadatas.len()
            )));
        }
        if ids.iter().any(|id| id.is_empty()) {
            return Err(RetrievalError::InvalidInput("document ids must not be empty".to_string()));
        }
        match (&self.index, vectors) {
            (Index::Vector(index), Some(vectors)) => {
                if vectors.len() != ids.len() {
                    return Err(RetrievalError::InvalidInput(format!(
                        "{} vectors for {} documents",
                        vectors.len(),
                        ids.len()
                    )));
                }
                for vector in vectors {
                    index.check_vector(vector)?;
                }
            }
            (Index::Vector(_), None) => {
                return Err(RetrievalError::InvalidInput(format!(
                    "vector collection '{}' requires vectors",
                    self.name
                )));
            }
            (_, Some(_)) => {
                return Err(RetrievalError::InvalidInput(format!(
                    "{} collection '{}' does not accept vectors",
                    self.config.kind(),
                    self.name
                )));
            }
            (_, None) => {}
        }

        let mut added = 0;
        for (i, id) in ids.iter().enumerate() {
            if self.positions.contains_key(id) {
                continue;
            }
            match &mut self.index {
                Index::Lexical { index, tokenizer } => index.push(&tokenizer.segment(&contents[i])),
                Index::Vector(index) => {
                    if let Some(vectors) = vectors {
                        index.push(&vectors[i]);
                    }
                }
                Index::Corpus => {}
            }
            self.positions.insert(id.clone(), self.ids.len());
            self.ids.push(id.clone());
            self.contents.push(contents[i].clone());
            self.metadatas.push(metadatas[i].clone());
            added += 1;
        }

        if added > 0 {
            self.dirty = true;
        }
        debug!(
            collection = %self.name,
            requested = ids.len(),
            added,
            total = self.ids.len(),
            "added documents"
        );
        Ok(added)
    }

    /// Add [`Document`]s, skipping ids already present. See [`add`](Self::add).
    pub fn add_documents(
        &mut self,
        documents: &[Document],
        vectors: Option<&[Vec<f32>]>,
    ) -> Result<usize> {
        let ids: Vec<String> = documents.iter().map(|d| d.id.clone()).collect();
        let contents: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
        let metadatas: Vec<Metadata> = documents.iter().map(|d| d.metadata.clone()).collect();
        self.add(&ids, &contents, &metadatas, vectors)
    }

    /// Score the collection, or only `candidate_ids` when given, and return
    /// at most `top_k` results with raw backend scores.
    ///
    /// Results are sorted by descending score with ties broken by insertion
    /// order. Candidate ids that are not stored are dropped; duplicates are
    /// scored once. Restricted search ranks candidates exactly as an
    /// unrestricted search filtered to the same ids would.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Unsupported`] if the query kind does not match
    /// the backend or the backend is content-only, and
    /// [`RetrievalError::InvalidInput`] on a vector dimension mismatch.
    pub fn search(
        &mut self,
        query: Query<'_>,
        top_k: usize,
        candidate_ids: Option<&[String]>,
    ) -> Result<Vec<RetrievalResult>> {
        let rows = candidate_ids.map(|candidates| self.candidate_rows(candidates));

        let scored = match (&mut self.index, query) {
            (Index::Lexical { index, tokenizer }, Query::Text(text)) => {
                index.score(&tokenizer.segment(text), rows.as_deref())
            }
            (Index::Vector(index), Query::Vector(vector)) => index.score(vector, rows.as_deref())?,
            (Index::Corpus, _) => {
                return Err(RetrievalError::Unsupported(format!(
                    "corpus collection '{}' has no scoring index",
                    self.name
                )));
            }
            (_, query) => {
                return Err(RetrievalError::Unsupported(format!(
                    "{} collection '{}' cannot score a {} query",
                    self.config.kind(),
                    self.name,
                    match query {
                        Query::Text(_) => "text",
                        Query::Vector(_) => "vector",
                    }
                )));
            }
        };

        let ranked = rank_top_k(scored, top_k);
        Ok(ranked
            .into_iter()
            .map(|(row, score)| RetrievalResult {
                id: self.ids[row].clone(),
                content: self.contents[row].clone(),
                metadata: self.metadatas[row].clone(),
                score,
            })
            .collect())
    }

    fn candidate_rows(&self, candidates: &[String]) -> Vec<usize> {
        let mut seen = HashSet::with_capacity(candidates.len());
        let rows: Vec<usize> = candidates
            .iter()
            .filter_map(|id| self.positions.get(id).copied())
            .filter(|row| seen.insert(*row))
            .collect();
        if rows.len() < candidates.len() {
            debug!(
                collection = %self.name,
                candidates = candidates.len(),
                kept = rows.len(),
                "dropped unknown or duplicate candidate ids"
            );
        }
        rows
    }

    /// Write the collection to its directory and clear the dirty flag.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Io`] or [`RetrievalError::Serialization`] if
    /// any file cannot be written.
    pub fn save(&mut self) -> Result<()> {
        fs::create_dir_all(&self.path)?;

        let documents = (0..self.ids.len()).map(|row| StoredDocument {
            id: &self.ids[row],
            content: &self.contents[row],
            metadata: &self.metadatas[row],
        });
        let documents: Vec<StoredDocument<'_>> = documents.collect();
        persist::write_jsonl(&self.path.join(CORPUS_FILE), &documents)?;

        match &self.index {
            Index::Lexical { index, .. } => {
                persist::write_json(&self.path.join(LEXICAL_FILE), &index.documents())?;
            }
            Index::Vector(index) => {
                persist::write_atomic(&self.path.join(EMBEDDINGS_FILE), |writer| {
                    index.write_to(writer)
                })?;
            }
            Index::Corpus => {}
        }
        persist::write_json(&self.path.join(CONFIG_FILE), &self.config)?;

        self.dirty = false;
        info!(
            collection = %self.name,
            documents = self.ids.len(),
            path = %self.path.display(),
            "saved collection"
        );
        Ok(())
    }
}

fn build_index(config: &IndexConfig, tokenizer: Option<Arc<dyn Tokenizer>>) -> Result<Index> {
    Ok(match config {
        IndexConfig::Lexical(lexical) => {
            let tokenizer = tokenizer.ok_or_else(|| {
                RetrievalError::ConfigError("lexical collections require a tokenizer".to_string())
            })?;
            if tokenizer.name() != lexical.tokenizer {
                return Err(RetrievalError::ConfigError(format!(
                    "tokenizer '{}' does not match configured tokenizer '{}'",
                    tokenizer.name(),
                    lexical.tokenizer
                )));
            }
            Index::Lexical { index: LexicalIndex::new(lexical.clone()), tokenizer }
        }
        IndexConfig::Vector(vector) => {
            if vector.dimensions == 0 {
                return Err(RetrievalError::ConfigError(
                    "dimensions must be greater than zero".to_string(),
                ));
            }
            Index::Vector(VectorIndex::new(vector.clone()))
        }
        IndexConfig::Corpus => Index::Corpus,
    })
}

fn check_compatible(name: &str, stored: &IndexConfig, expected: &IndexConfig) -> Result<()> {
    let mismatch = |what: String| {
        Err(RetrievalError::ConfigError(format!("collection '{name}' was built with {what}")))
    };
    match (stored, expected) {
        (IndexConfig::Lexical(stored), IndexConfig::Lexical(expected)) => {
            if stored.tokenizer != expected.tokenizer {
                return mismatch(format!("tokenizer '{}'", stored.tokenizer));
            }
        }
        (IndexConfig::Vector(stored), IndexConfig::Vector(expected)) => {
            if stored.model != expected.model || stored.dimensions != expected.dimensions {
                return mismatch(format!(
                    "model '{}' ({} dimensions)",
                    stored.model, stored.dimensions
                ));
            }
        }
        (IndexConfig::Corpus, IndexConfig::Corpus) => {}
        (stored, _) => return mismatch(format!("a {} backend", stored.kind())),
    }
    Ok(())
}

/// Sort by descending score, ties by ascending row, and keep `top_k`.
fn rank_top_k(mut scored: Vec<(usize, f32)>, top_k: usize) -> Vec<(usize, f32)> {
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    scored.truncate(top_k);
    scored
}
