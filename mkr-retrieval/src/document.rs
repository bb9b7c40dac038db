//! Data types for documents and retrieval results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Arbitrary key-value metadata attached to a document.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// A stored document. Identity is the `id`, not the position in a collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Stable identifier, normally a content hash.
    pub id: String,
    /// The text content of the document.
    pub content: String,
    /// Key-value metadata associated with the document.
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    /// Create a document whose id is the SHA-256 hash of its content.
    pub fn from_content(content: impl Into<String>, metadata: Metadata) -> Self {
        let content = content.into();
        Self { id: content_hash(&content), content, metadata }
    }
}

/// A retrieved [`Document`] paired with a relevance score.
///
/// Result lists are ordered by descending score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalResult {
    /// The document identifier.
    pub id: String,
    /// The document content.
    pub content: String,
    /// The document metadata.
    pub metadata: Metadata,
    /// The relevance score (higher is more relevant).
    pub score: f32,
}

impl RetrievalResult {
    /// Build a result from a stored document and a score.
    pub fn from_document(document: &Document, score: f32) -> Self {
        Self {
            id: document.id.clone(),
            content: document.content.clone(),
            metadata: document.metadata.clone(),
            score,
        }
    }
}

/// Hex-encoded SHA-256 of `content`, used as a stable document id.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_is_stable_and_hex() {
        let a = content_hash("hello world");
        let b = content_hash("hello world");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, content_hash("hello world!"));
    }

    #[test]
    fn from_content_uses_hash_as_id() {
        let doc = Document::from_content("some text", Metadata::new());
        assert_eq!(doc.id, content_hash("some text"));
    }
}
