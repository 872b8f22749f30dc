//! Hybrid retrieval core: parallel fan-out and fusion
//!
//! A query fans out to exactly two legs — embed-then-vector-search and
//! BM25 search — joined under one shared deadline. A leg that fails or
//! times out degrades the answer instead of failing it: the other leg's
//! results are fused alone. Only when BOTH legs fail does the caller see an
//! error, and it is [`Error::DeadlineExceeded`] only if a deadline was the
//! cause.
//!
//! Each leg over-fetches `max(k, max_results)` so fusion has enough overlap
//! to rerank meaningfully before truncating to `k`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::domain::error::{Error, Result};
use crate::domain::ports::EmbeddingProvider;
use crate::domain::types::{Filter, FusedResult, RetrievalResult};
use crate::index::bm25_index::Bm25Index;
use crate::index::vector::VectorIndex;
use crate::retrieval::fusion::{fuse, FusionMethod};

/// Configuration for [`HybridRetriever`]
#[derive(Debug, Clone)]
pub struct HybridRetrieverConfig {
    /// Per-leg over-fetch floor
    pub max_results: usize,
    /// Shared deadline covering both legs
    pub deadline: Duration,
    /// Fusion used when a call does not choose one
    pub default_fusion: FusionMethod,
}

impl Default for HybridRetrieverConfig {
    fn default() -> Self {
        Self {
            max_results: 50,
            deadline: Duration::from_secs(30),
            default_fusion: FusionMethod::default(),
        }
    }
}

/// Outcome of one hybrid search, with per-leg counts for inspection
#[derive(Debug, Clone)]
pub struct HybridSearchOutput {
    /// Fused results, truncated to the requested `k`
    pub results: Vec<FusedResult>,
    /// How many results the vector leg contributed before fusion
    pub vector_results_count: usize,
    /// How many results the BM25 leg contributed before fusion
    pub bm25_results_count: usize,
    /// Fusion method applied
    pub fusion_method: &'static str,
    /// Wall-clock duration of the whole search
    pub elapsed_ms: u64,
}

/// Two-leg hybrid retriever over the vector facade and the BM25 index
pub struct HybridRetriever {
    embedding: Arc<dyn EmbeddingProvider>,
    vector_index: Arc<VectorIndex>,
    bm25_index: Arc<Bm25Index>,
    config: HybridRetrieverConfig,
}

impl HybridRetriever {
    /// Wire the retriever to its two indices and the embedding provider
    pub fn new(
        embedding: Arc<dyn EmbeddingProvider>,
        vector_index: Arc<VectorIndex>,
        bm25_index: Arc<Bm25Index>,
        config: HybridRetrieverConfig,
    ) -> Self {
        Self {
            embedding,
            vector_index,
            bm25_index,
            config,
        }
    }

    /// Effective configuration
    pub fn config(&self) -> &HybridRetrieverConfig {
        &self.config
    }

    /// Run the hybrid search and fuse the legs
    ///
    /// An empty query yields an empty result without touching either index.
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        fusion: Option<FusionMethod>,
        filter: Option<&Filter>,
    ) -> Result<HybridSearchOutput> {
        let started = Instant::now();
        let method = fusion.unwrap_or(self.config.default_fusion);

        if query.trim().is_empty() || k == 0 {
            return Ok(HybridSearchOutput {
                results: Vec::new(),
                vector_results_count: 0,
                bm25_results_count: 0,
                fusion_method: method.name(),
                elapsed_ms: started.elapsed().as_millis() as u64,
            });
        }

        let fetch = k.max(self.config.max_results);
        let (vector_leg, bm25_leg) = self.run_legs(query, fetch, filter).await;

        let (vector_results, bm25_results) = match (vector_leg, bm25_leg) {
            (Ok(v), Ok(b)) => (v, b),
            (Ok(v), Err(err)) => {
                warn!(%err, "bm25 leg failed; continuing with vector results only");
                (v, Vec::new())
            }
            (Err(err), Ok(b)) => {
                warn!(%err, "vector leg failed; continuing with bm25 results only");
                (Vec::new(), b)
            }
            (Err(vector_err), Err(bm25_err)) => {
                // Nothing to degrade to. A deadline on either leg surfaces as
                // a deadline; otherwise every redundant path is simply down.
                if vector_err.is_deadline() || bm25_err.is_deadline() {
                    return Err(Error::deadline_exceeded(format!(
                        "both retrieval legs timed out (vector: {vector_err}; bm25: {bm25_err})"
                    )));
                }
                return Err(Error::dependency_unavailable(
                    "retrieval",
                    format!("vector: {vector_err}; bm25: {bm25_err}"),
                ));
            }
        };

        let vector_results_count = vector_results.len();
        let bm25_results_count = bm25_results.len();
        let mut results = fuse(&vector_results, &bm25_results, method);
        results.truncate(k);

        let elapsed_ms = started.elapsed().as_millis() as u64;
        debug!(
            k,
            vector = vector_results_count,
            bm25 = bm25_results_count,
            fused = results.len(),
            elapsed_ms,
            fusion = method.name(),
            "hybrid search complete"
        );
        Ok(HybridSearchOutput {
            results,
            vector_results_count,
            bm25_results_count,
            fusion_method: method.name(),
            elapsed_ms,
        })
    }

    /// Vector-only search path, used by ablation adapters
    pub async fn search_vector_only(
        &self,
        query: &str,
        k: usize,
        filter: Option<&Filter>,
    ) -> Result<Vec<RetrievalResult>> {
        if query.trim().is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let vector = self.embedding.embed(query).await?;
        self.vector_index.search(&vector, k, filter).await
    }

    /// BM25-only search path, used by ablation adapters
    pub fn search_bm25_only(
        &self,
        query: &str,
        k: usize,
        filter: Option<&Filter>,
    ) -> Vec<RetrievalResult> {
        self.bm25_index.search(query, k, filter)
    }

    async fn run_legs(
        &self,
        query: &str,
        fetch: usize,
        filter: Option<&Filter>,
    ) -> (Result<Vec<RetrievalResult>>, Result<Vec<RetrievalResult>>) {
        let deadline = self.config.deadline;

        let vector_leg = async {
            let vector = self.embedding.embed(query).await?;
            self.vector_index.search(&vector, fetch, filter).await
        };
        let bm25_leg = async { Ok(self.bm25_index.search(query, fetch, filter)) };

        let (vector_outcome, bm25_outcome) = tokio::join!(
            tokio::time::timeout(deadline, vector_leg),
            tokio::time::timeout(deadline, bm25_leg),
        );

        let flatten = |outcome: std::result::Result<Result<Vec<RetrievalResult>>, _>,
                       leg: &str| match outcome {
            Ok(result) => result,
            Err(_elapsed) => Err(Error::deadline_exceeded(format!(
                "{leg} leg exceeded {}s",
                deadline.as_secs()
            ))),
        };

        (
            flatten(vector_outcome, "vector"),
            flatten(bm25_outcome, "bm25"),
        )
    }
}
