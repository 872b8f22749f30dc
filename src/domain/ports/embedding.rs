use crate::domain::error::Result;
use async_trait::async_trait;

/// Contract for services that transform text into dense vectors
///
/// The platform never generates embeddings itself; it talks to whatever
/// service is configured through this port. Vectors must have the uniform
/// dimension reported by [`EmbeddingProvider::dimensions`].
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of texts, preserving order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Dimension of every vector this provider produces
    fn dimensions(&self) -> usize;

    /// Human-readable provider name for logs
    fn provider_name(&self) -> &str;

    /// Probe the provider; the default sends one tiny embed request and
    /// reports whatever error comes back
    async fn health_check(&self) -> Result<()> {
        self.embed("ping").await.map(|_| ())
    }
}
