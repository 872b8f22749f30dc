//! Mock adapter: in-process deterministic result synthesizer
//!
//! Results are seeded by a hash of the query, so a given query always
//! produces the same ranked list. Used by the evaluation tests and as a
//! stand-in backend during development.

use async_trait::async_trait;
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::domain::error::Result;
use crate::domain::ports::RetrievalAdapter;
use crate::domain::types::{RetrievalResult, RetrievalSource};

/// Deterministic synthetic backend
#[derive(Debug)]
pub struct MockAdapter {
    name: String,
    /// Size of the pretend corpus the ids are drawn from
    corpus_size: u64,
}

impl MockAdapter {
    /// Create a mock adapter with the default pretend corpus
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            corpus_size: 1000,
        }
    }
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::new("mock")
    }
}

#[async_trait]
impl RetrievalAdapter for MockAdapter {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievalResult>> {
        if query.trim().is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let digest = Sha256::digest(query.as_bytes());
        let seed = u64::from_be_bytes(digest[..8].try_into().expect("digest is 32 bytes"));

        let results = (0..k)
            .map(|rank| {
                let doc = (seed.wrapping_add(rank as u64 * 7919)) % self.corpus_size;
                let score = 0.95_f32.powi(rank as i32);
                RetrievalResult {
                    id: format!("doc-{doc}"),
                    content: format!("synthetic content for doc-{doc}"),
                    score,
                    source: RetrievalSource::Hybrid,
                    metadata: json!({"rank": rank + 1, "mock": true}),
                    file_path: Some(format!("src/main/java/com/example/Doc{doc}.java")),
                }
            })
            .collect();
        Ok(results)
    }

    async fn health_check(&self) -> bool {
        true
    }

    async fn close(&self) {}

    fn adapter_name(&self) -> &str {
        &self.name
    }
}
