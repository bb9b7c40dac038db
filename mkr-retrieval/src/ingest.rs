//! Corpus records and the JSONL corpus reader used for ingestion.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::document::{Document, Metadata, content_hash};
use crate::error::{Result, RetrievalError};

/// One line of a corpus file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CorpusRecord {
    /// Content hash used as the document id. Computed from `content` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    /// The passage or document text.
    pub content: String,
    /// Arbitrary metadata such as `title` or `url`.
    #[serde(default)]
    pub metadata: Metadata,
}

impl CorpusRecord {
    /// Create a record without a precomputed hash.
    pub fn new(content: impl Into<String>, metadata: Metadata) -> Self {
        Self { hash: None, content: content.into(), metadata }
    }

    /// The document id: the stored hash, or the SHA-256 of the content.
    pub fn id(&self) -> String {
        match &self.hash {
            Some(hash) if !hash.is_empty() => hash.clone(),
            _ => content_hash(&self.content),
        }
    }

    /// Text indexed by lexical collections: `"{title}\n{content}"` when the
    /// metadata carries a string title, otherwise the content alone.
    pub fn lexical_text(&self) -> String {
        match self.metadata.get("title").and_then(|t| t.as_str()) {
            Some(title) => format!("{title}\n{}", self.content),
            None => self.content.clone(),
        }
    }

    /// Convert into a stored [`Document`].
    pub fn to_document(&self) -> Document {
        Document { id: self.id(), content: self.content.clone(), metadata: self.metadata.clone() }
    }
}

/// Read a JSONL corpus file. Blank lines are skipped.
///
/// # Errors
///
/// Returns [`RetrievalError::Io`] if the file cannot be read and
/// [`RetrievalError::InvalidInput`] if a line is not a valid record.
pub fn read_corpus(path: impl AsRef<Path>) -> Result<Vec<CorpusRecord>> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|e| {
            RetrievalError::InvalidInput(format!("{}:{}: {e}", path.display(), line_no + 1))
        })?;
        records.push(record);
    }
    info!(path = %path.display(), records = records.len(), "read corpus");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_falls_back_to_content_hash() {
        let record = CorpusRecord::new("text", Metadata::new());
        assert_eq!(record.id(), content_hash("text"));

        let hashed = CorpusRecord { hash: Some("abc".into()), ..record };
        assert_eq!(hashed.id(), "abc");
    }

    #[test]
    fn lexical_text_prefixes_title() {
        let mut metadata = Metadata::new();
        metadata.insert("title".into(), "Rust".into());
        let record = CorpusRecord::new("a systems language", metadata);
        assert_eq!(record.lexical_text(), "Rust\na systems language");
    }

    #[test]
    fn reads_jsonl_and_reports_bad_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.jsonl");
        std::fs::write(
            &path,
            concat!(
                "{\"hash\": \"h1\", \"content\": \"one\", \"metadata\": {\"title\": \"T\"}}\n",
                "\n",
                "{\"content\": \"two\"}\n",
            ),
        )
        .unwrap();
        let records = read_corpus(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id(), "h1");
        assert!(records[1].metadata.is_empty());

        std::fs::write(&path, "{\"content\": 5}\n").unwrap();
        assert!(matches!(read_corpus(&path), Err(RetrievalError::InvalidInput(_))));
    }
}
