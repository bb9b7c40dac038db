//! Query relevance labels.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{EvalError, Result};

/// A question paired with the ids of its relevant documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Qrel {
    /// The query text.
    pub question: String,
    /// Ids of every document judged relevant.
    #[serde(default)]
    pub document_ids: BTreeSet<String>,
}

impl Qrel {
    /// Create a qrel.
    pub fn new(
        question: impl Into<String>,
        document_ids: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            question: question.into(),
            document_ids: document_ids.into_iter().map(Into::into).collect(),
        }
    }
}

/// Load qrels from a JSONL file of `{"question": ..., "document_ids": [...]}`.
///
/// Blank lines and records with a blank question are skipped.
///
/// # Errors
///
/// Returns [`EvalError::Io`] if the file cannot be read and
/// [`EvalError::InvalidQrel`] for a malformed line.
pub fn load_qrels_jsonl(path: impl AsRef<Path>) -> Result<Vec<Qrel>> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let mut qrels = Vec::new();
    let mut blank = 0;
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let qrel: Qrel = serde_json::from_str(&line)
            .map_err(|e| EvalError::InvalidQrel { line: index + 1, message: e.to_string() })?;
        if qrel.question.trim().is_empty() {
            blank += 1;
            continue;
        }
        qrels.push(qrel);
    }
    if blank > 0 {
        warn!(path = %path.display(), skipped = blank, "skipped qrels with blank questions");
    }
    info!(path = %path.display(), qrels = qrels.len(), "loaded qrels");
    Ok(qrels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_and_skips_blank_questions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qrels.jsonl");
        std::fs::write(
            &path,
            concat!(
                "{\"question\": \"what is rust\", \"document_ids\": [\"d1\", \"d2\"]}\n",
                "\n",
                "{\"question\": \"  \", \"document_ids\": [\"d3\"]}\n",
                "{\"question\": \"no labels\"}\n",
            ),
        )
        .unwrap();
        let qrels = load_qrels_jsonl(&path).unwrap();
        assert_eq!(qrels.len(), 2);
        assert_eq!(qrels[0], Qrel::new("what is rust", ["d1", "d2"]));
        assert!(qrels[1].document_ids.is_empty());
    }

    #[test]
    fn reports_malformed_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qrels.jsonl");
        std::fs::write(&path, "{\"question\": \"ok\", \"document_ids\": []}\n[1, 2]\n").unwrap();
        assert!(matches!(load_qrels_jsonl(&path), Err(EvalError::InvalidQrel { line: 2, .. })));
    }
}
