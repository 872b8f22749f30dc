use crate::domain::error::Result;
use crate::domain::types::RetrievalResult;
use async_trait::async_trait;

/// Uniform retrieval contract implemented by every RAG backend variant
///
/// The evaluation pipeline and the HTTP surface only ever see this trait;
/// per-backend concerns (auth, retry, response-shape mapping) live behind it.
#[async_trait]
pub trait RetrievalAdapter: Send + Sync + std::fmt::Debug {
    /// Retrieve the top `k` results for `query`, ranked best-first
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievalResult>>;

    /// Whether the backend currently answers queries
    async fn health_check(&self) -> bool;

    /// Tear down pooled connections and other held resources
    async fn close(&self);

    /// Human-readable adapter name for logs and run records
    fn adapter_name(&self) -> &str;
}
