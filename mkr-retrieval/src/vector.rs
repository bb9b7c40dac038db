//! Exact inner-product search over a dense embedding matrix.
//!
//! Embeddings live in one row-major `Vec<f32>` in insertion order. Search is
//! brute force, so candidate-restricted search is exact by construction: only
//! the candidate rows are scored.

use std::io::{Read, Write};

use crate::config::{Metric, VectorConfig};
use crate::embedding::l2_normalize;
use crate::error::{Result, RetrievalError};

/// A dense vector index for one collection.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    config: VectorConfig,
    data: Vec<f32>,
}

impl VectorIndex {
    /// Create an empty index.
    pub fn new(config: VectorConfig) -> Self {
        Self { config, data: Vec::new() }
    }

    /// The configuration this index scores with.
    pub fn config(&self) -> &VectorConfig {
        &self.config
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        self.data.len() / self.config.dimensions
    }

    /// Whether the index holds no vectors.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Check that `vector` matches the configured dimensionality and holds
    /// only finite values.
    pub fn check_vector(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.config.dimensions {
            return Err(RetrievalError::InvalidInput(format!(
                "expected {}-dimensional vector, got {}",
                self.config.dimensions,
                vector.len()
            )));
        }
        if let Some(position) = vector.iter().position(|v| !v.is_finite()) {
            return Err(RetrievalError::InvalidInput(format!(
                "vector component {position} is not finite"
            )));
        }
        Ok(())
    }

    /// Append one vector. Callers validate dimensions first.
    pub fn push(&mut self, vector: &[f32]) {
        let start = self.data.len();
        self.data.extend_from_slice(vector);
        if self.config.metric == Metric::Cosine {
            l2_normalize(&mut self.data[start..]);
        }
    }

    /// The stored vector at `row`.
    pub fn row(&self, row: usize) -> &[f32] {
        let dim = self.config.dimensions;
        &self.data[row * dim..(row + 1) * dim]
    }

    /// Score the vectors at `rows` (or every vector when `None`) against `query`.
    pub fn score(&self, query: &[f32], rows: Option<&[usize]>) -> Result<Vec<(usize, f32)>> {
        self.check_vector(query)?;
        let mut query = query.to_vec();
        if self.config.metric == Metric::Cosine {
            l2_normalize(&mut query);
        }
        let dot =
            |row: usize| -> f32 { self.row(row).iter().zip(&query).map(|(a, b)| a * b).sum() };

        let len = self.len();
        Ok(match rows {
            Some(rows) => {
                rows.iter().filter(|row| **row < len).map(|row| (*row, dot(*row))).collect()
            }
            None => (0..len).map(|row| (row, dot(row))).collect(),
        })
    }

    /// Write the matrix as little-endian `f32` values, row-major.
    pub fn write_to(&self, writer: &mut impl Write) -> Result<()> {
        for value in &self.data {
            writer.write_all(&value.to_le_bytes())?;
        }
        Ok(())
    }

    /// Read a matrix written by [`write_to`](Self::write_to), expecting
    /// exactly `rows` vectors.
    pub fn read_from(config: VectorConfig, reader: &mut impl Read, rows: usize) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let expected = rows * config.dimensions * 4;
        if bytes.len() != expected {
            return Err(RetrievalError::InvalidInput(format!(
                "embedding matrix has {} bytes, expected {expected} for {rows} x {} vectors",
                bytes.len(),
                config.dimensions
            )));
        }
        let data = bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        Ok(Self { config, data })
    }
}
