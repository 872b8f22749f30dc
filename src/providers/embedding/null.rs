//! Null embedding provider for testing and development
//!
//! Produces deterministic unit-length vectors seeded by a hash of the input
//! text, so identical texts always land on identical vectors and similarity
//! comparisons are stable across runs. No network involved.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::domain::error::{Error, Result};
use crate::domain::ports::EmbeddingProvider;

/// Deterministic, offline embedding provider
pub struct NullEmbeddingProvider {
    dimensions: usize,
}

impl NullEmbeddingProvider {
    /// Create a provider producing vectors of the given dimension
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let digest = Sha256::digest(text.as_bytes());
        let mut vector: Vec<f32> = (0..self.dimensions)
            .map(|i| {
                let byte = digest[i % digest.len()];
                // Spread bytes into [-1, 1] with a position-dependent twist
                let raw = byte as f32 / 255.0 * 2.0 - 1.0;
                raw + (i as f32 * 0.01).sin() * 0.1
            })
            .collect();
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

impl Default for NullEmbeddingProvider {
    fn default() -> Self {
        Self::new(128)
    }
}

#[async_trait]
impl EmbeddingProvider for NullEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| Error::internal("no embedding returned"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn provider_name(&self) -> &str {
        "null"
    }
}
