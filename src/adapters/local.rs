//! In-process adapters over the hybrid retrieval core
//!
//! These bypass HTTP entirely: the hybrid-local adapter exposes the full
//! fusion pipeline through the uniform adapter contract, and the vector-only
//! / BM25-only adapters expose a single leg each for evaluation ablations.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::error::Result;
use crate::domain::ports::RetrievalAdapter;
use crate::domain::types::{RetrievalResult, RetrievalSource};
use crate::retrieval::fusion::FusionMethod;
use crate::retrieval::hybrid::HybridRetriever;

/// Full hybrid pipeline behind the adapter contract
pub struct HybridLocalAdapter {
    name: String,
    retriever: Arc<HybridRetriever>,
    fusion: Option<FusionMethod>,
}

impl std::fmt::Debug for HybridLocalAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridLocalAdapter")
            .field("name", &self.name)
            .field("fusion", &self.fusion)
            .finish()
    }
}

impl HybridLocalAdapter {
    /// Wrap the retriever; `fusion` overrides the retriever default per call
    pub fn new(
        name: impl Into<String>,
        retriever: Arc<HybridRetriever>,
        fusion: Option<FusionMethod>,
    ) -> Self {
        Self {
            name: name.into(),
            retriever,
            fusion,
        }
    }
}

#[async_trait]
impl RetrievalAdapter for HybridLocalAdapter {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievalResult>> {
        let output = self.retriever.search(query, k, self.fusion, None).await?;
        Ok(output
            .results
            .into_iter()
            .map(|fused| RetrievalResult {
                file_path: fused
                    .metadata
                    .get("file_path")
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
                id: fused.id,
                content: fused.content,
                score: fused.combined_score,
                source: RetrievalSource::Hybrid,
                metadata: fused.metadata,
            })
            .collect())
    }

    async fn health_check(&self) -> bool {
        self.retriever.search("health check", 1, None, None).await.is_ok()
    }

    async fn close(&self) {}

    fn adapter_name(&self) -> &str {
        &self.name
    }
}

/// Vector-leg-only adapter for ablation runs
pub struct VectorOnlyAdapter {
    name: String,
    retriever: Arc<HybridRetriever>,
}

impl std::fmt::Debug for VectorOnlyAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorOnlyAdapter").field("name", &self.name).finish()
    }
}

impl VectorOnlyAdapter {
    /// Wrap the retriever's vector leg
    pub fn new(name: impl Into<String>, retriever: Arc<HybridRetriever>) -> Self {
        Self {
            name: name.into(),
            retriever,
        }
    }
}

#[async_trait]
impl RetrievalAdapter for VectorOnlyAdapter {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievalResult>> {
        self.retriever.search_vector_only(query, k, None).await
    }

    async fn health_check(&self) -> bool {
        self.retriever.search_vector_only("health check", 1, None).await.is_ok()
    }

    async fn close(&self) {}

    fn adapter_name(&self) -> &str {
        &self.name
    }
}

/// BM25-leg-only adapter for ablation runs
pub struct Bm25OnlyAdapter {
    name: String,
    retriever: Arc<HybridRetriever>,
}

impl std::fmt::Debug for Bm25OnlyAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bm25OnlyAdapter").field("name", &self.name).finish()
    }
}

impl Bm25OnlyAdapter {
    /// Wrap the retriever's lexical leg
    pub fn new(name: impl Into<String>, retriever: Arc<HybridRetriever>) -> Self {
        Self {
            name: name.into(),
            retriever,
        }
    }
}

#[async_trait]
impl RetrievalAdapter for Bm25OnlyAdapter {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievalResult>> {
        Ok(self.retriever.search_bm25_only(query, k, None))
    }

    async fn health_check(&self) -> bool {
        true
    }

    async fn close(&self) {}

    fn adapter_name(&self) -> &str {
        &self.name
    }
}
