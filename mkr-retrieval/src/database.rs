//! Registry of named collections sharing one storage root and backend.
//!
//! The manifest (`collection_paths.json`) maps collection names to their
//! directories. Collections are materialized lazily on first access, and
//! [`Database::save`] writes every dirty collection before the manifest so a
//! name is never persisted ahead of its collection.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info};

use crate::collection::Collection;
use crate::config::{DatabaseConfig, IndexConfig, LexicalConfig, VectorConfig};
use crate::error::{Result, RetrievalError};
use crate::persist;
use crate::tokenizer::Tokenizer;

const MANIFEST_FILE: &str = "collection_paths.json";

/// A set of named [`Collection`]s persisted under one root directory.
pub struct Database {
    config: DatabaseConfig,
    tokenizer: Option<Arc<dyn Tokenizer>>,
    paths: BTreeMap<String, PathBuf>,
    collections: HashMap<String, Collection>,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("root", &self.config.root)
            .field("kind", &self.config.index.kind())
            .field("collections", &self.paths.keys().collect::<Vec<_>>())
            .field("loaded", &self.collections.len())
            .finish()
    }
}

impl Database {
    /// Open a database, reading its manifest if one exists.
    ///
    /// Lexical databases need the tokenizer named by their configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::ConfigError`] if a lexical database has no
    /// tokenizer, and [`RetrievalError::CorruptState`] if the manifest exists
    /// but cannot be parsed.
    pub fn open(config: DatabaseConfig, tokenizer: Option<Arc<dyn Tokenizer>>) -> Result<Self> {
        if let IndexConfig::Lexical(lexical) = &config.index {
            match &tokenizer {
                Some(tokenizer) if tokenizer.name() == lexical.tokenizer => {}
                Some(tokenizer) => {
                    return Err(RetrievalError::ConfigError(format!(
                        "tokenizer '{}' does not match configured tokenizer '{}'",
                        tokenizer.name(),
                        lexical.tokenizer
                    )));
                }
                None => {
                    return Err(RetrievalError::ConfigError(
                        "lexical databases require a tokenizer".to_string(),
                    ));
                }
            }
        }
        let mut database =
            Self { config, tokenizer, paths: BTreeMap::new(), collections: HashMap::new() };
        database.load()?;
        Ok(database)
    }

    /// Open a lexical database at `root`.
    pub fn lexical(
        root: impl Into<PathBuf>,
        config: LexicalConfig,
        tokenizer: Arc<dyn Tokenizer>,
    ) -> Result<Self> {
        Self::open(DatabaseConfig::new(root, IndexConfig::Lexical(config)), Some(tokenizer))
    }

    /// Open a vector database at `root`.
    pub fn vector(root: impl Into<PathBuf>, config: VectorConfig) -> Result<Self> {
        Self::open(DatabaseConfig::new(root, IndexConfig::Vector(config)), None)
    }

    /// Open a content-only database at `root`.
    pub fn corpus(root: impl Into<PathBuf>) -> Result<Self> {
        Self::open(DatabaseConfig::new(root, IndexConfig::Corpus), None)
    }

    /// The database configuration.
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Registered collection names, sorted.
    pub fn collection_names(&self) -> Vec<&str> {
        self.paths.keys().map(String::as_str).collect()
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.paths.contains_key(name)
    }

    /// Whether `name` is currently materialized in memory.
    pub fn is_loaded(&self, name: &str) -> bool {
        self.collections.contains_key(name)
    }

    /// Reconstruct the registry from the manifest, dropping every in-memory
    /// collection. Collections load again lazily on next access.
    ///
    /// A missing root or manifest yields an empty registry.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::CorruptState`] if the manifest is malformed.
    pub fn load(&mut self) -> Result<()> {
        let manifest = self.config.root.join(MANIFEST_FILE);
        self.collections.clear();
        self.paths = if manifest.is_file() {
            persist::read_json(&manifest)?
        } else {
            BTreeMap::new()
        };
        info!(
            root = %self.config.root.display(),
            collections = self.paths.len(),
            "opened database"
        );
        Ok(())
    }

    /// Return the collection called `name`, creating an empty one on first
    /// use. Registered collections are loaded from disk if needed.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::InvalidInput`] for names that cannot be used
    /// as a directory, or any error from loading the collection.
    pub fn create_or_get(&mut self, name: &str) -> Result<&mut Collection> {
        if !self.paths.contains_key(name) {
            validate_name(name)?;
            let relative = PathBuf::from(name);
            let collection = Collection::create(
                name,
                self.resolve(&relative),
                self.config.index.clone(),
                self.tokenizer.clone(),
            )?;
            info!(collection = name, kind = self.config.index.kind(), "created collection");
            self.paths.insert(name.to_string(), relative);
            self.collections.insert(name.to_string(), collection);
        }
        self.get(name)
    }

    /// Return the registered collection called `name`, loading it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::CollectionNotFound`] if `name` is not
    /// registered, or any error from loading the collection.
    pub fn get(&mut self, name: &str) -> Result<&mut Collection> {
        if !self.collections.contains_key(name) {
            let relative = self
                .paths
                .get(name)
                .ok_or_else(|| RetrievalError::CollectionNotFound { name: name.to_string() })?;
            let collection = Collection::load(
                name,
                self.resolve(relative),
                &self.config.index,
                self.tokenizer.clone(),
            )
            .inspect_err(|e| error!(collection = name, error = %e, "failed to load collection"))?;
            self.collections.insert(name.to_string(), collection);
        }
        self.collections
            .get_mut(name)
            .ok_or_else(|| RetrievalError::CollectionNotFound { name: name.to_string() })
    }

    /// Persist every collection with pending changes, then the manifest.
    ///
    /// The manifest is only written after all collections saved
    /// successfully.
    ///
    /// # Errors
    ///
    /// Returns the first collection or manifest write error.
    pub fn save(&mut self) -> Result<()> {
        fs::create_dir_all(&self.config.root)?;
        let mut saved = 0;
        for collection in self.collections.values_mut().filter(|c| c.is_dirty()) {
            collection.save().inspect_err(|e| {
                error!(collection = collection.name(), error = %e, "failed to save collection");
            })?;
            saved += 1;
        }
        persist::write_json(&self.config.root.join(MANIFEST_FILE), &self.paths)?;
        info!(
            root = %self.config.root.display(),
            collections = self.paths.len(),
            saved,
            "saved database"
        );
        Ok(())
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() { path.to_path_buf() } else { self.config.root.join(path) }
    }
}

fn validate_name(name: &str) -> Result<()> {
    let invalid = name.trim().is_empty()
        || name == "."
        || name == ".."
        || name == MANIFEST_FILE
        || name.contains(['/', '\\']);
    if invalid {
        return Err(RetrievalError::InvalidInput(format!("invalid collection name: '{name}'")));
    }
    Ok(())
}
