//! Embedding provider trait for turning text into dense vectors.

use crate::error::Result;

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap a specific encoder behind a unified blocking
/// interface. The default [`embed_batch`](EmbeddingProvider::embed_batch)
/// implementation calls [`embed`](EmbeddingProvider::embed) sequentially;
/// backends that support native batching should override it.
///
/// Dense collections use inner-product similarity, so vectors should be
/// L2-normalized for scores to behave as cosine similarity.
///
/// # Example
///
/// ```rust,ignore
/// use mkr_retrieval::{EmbeddingProvider, HashEmbeddingProvider};
///
/// let provider = HashEmbeddingProvider::new(64);
/// let embedding = provider.embed("hello world")?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
pub trait EmbeddingProvider: Send + Sync {
    /// Stable identifier of the encoder, persisted with vector collections.
    fn name(&self) -> &str;

    /// Generate an embedding vector for a single text input.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;
}

/// Scale `vector` to unit L2 norm in place. Zero vectors are left untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        vector.iter_mut().for_each(|x| *x /= norm);
    }
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, byte| (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME))
}

/// Deterministic feature-hashing encoder.
///
/// Each lowercased alphanumeric token is hashed with FNV-1a into one signed
/// bucket, and the resulting vector is L2-normalized. It captures lexical
/// overlap only, but needs no model files.
#[derive(Debug, Clone)]
pub struct HashEmbeddingProvider {
    dimensions: usize,
    name: String,
}

impl HashEmbeddingProvider {
    /// Create a hashing encoder with `dimensions` buckets (at least 1).
    pub fn new(dimensions: usize) -> Self {
        let dimensions = dimensions.max(1);
        Self { dimensions, name: format!("hash-{dimensions}") }
    }
}

impl Default for HashEmbeddingProvider {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EmbeddingProvider for HashEmbeddingProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embedding = vec![0.0_f32; self.dimensions];
        for token in text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let hash = fnv1a(token.to_lowercase().as_bytes());
            let bucket = (hash % self.dimensions as u64) as usize;
            embedding[bucket] += if hash >> 63 == 1 { 1.0 } else { -1.0 };
        }
        l2_normalize(&mut embedding);
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_embeddings_are_unit_length_and_deterministic() {
        let provider = HashEmbeddingProvider::new(32);
        let a = provider.embed("rust vector search").unwrap();
        let b = provider.embed("rust vector search").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn empty_text_embeds_to_zero_vector() {
        let provider = HashEmbeddingProvider::new(8);
        assert!(provider.embed("").unwrap().iter().all(|x| *x == 0.0));
    }

    #[test]
    fn default_batch_matches_single_embeds() {
        let provider = HashEmbeddingProvider::new(16);
        let batch = provider.embed_batch(&["alpha", "beta"]).unwrap();
        assert_eq!(batch[0], provider.embed("alpha").unwrap());
        assert_eq!(batch[1], provider.embed("beta").unwrap());
    }

    #[test]
    fn name_includes_dimensions() {
        assert_eq!(HashEmbeddingProvider::new(64).name(), "hash-64");
    }
}
