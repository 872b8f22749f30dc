//! HTTP embedding service client
//!
//! Speaks the embedding service's two-endpoint contract:
//! `POST /embedding/embed` with `{"text": …}` and
//! `POST /embedding/embed/bulk` with `{"texts": […]}`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::domain::error::{Error, Result};
use crate::domain::ports::EmbeddingProvider;
use crate::infrastructure::http::{build_client, send_with_retry, RetryPolicy};

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct BulkEmbedResponse {
    embeddings: Vec<EmbedResponse>,
}

/// Client for an external embedding service
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    dimensions: usize,
    retry: RetryPolicy,
}

impl HttpEmbeddingProvider {
    /// Build a provider with a pooled client and bounded request timeout
    pub fn new(
        base_url: impl Into<String>,
        dimensions: usize,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            dimensions,
            retry,
        })
    }

    async fn post_json(&self, path: &str, body: serde_json::Value) -> Result<reqwest::Response> {
        let url = format!("{}{path}", self.base_url);
        let response = send_with_retry(
            || self.client.post(&url).json(&body),
            &self.retry,
            "embedding",
        )
        .await?;
        if !response.status().is_success() {
            return Err(Error::dependency_unavailable(
                "embedding",
                format!("{path} returned {}", response.status()),
            ));
        }
        Ok(response)
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(Error::internal(format!(
                "embedding service returned dimension {}, expected {}",
                vector.len(),
                self.dimensions
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .post_json("/embedding/embed", json!({ "text": text }))
            .await?;
        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::dependency_unavailable("embedding", e.to_string()))?;
        self.check_dimension(&parsed.embedding)?;
        Ok(parsed.embedding)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let response = self
            .post_json("/embedding/embed/bulk", json!({ "texts": texts }))
            .await?;
        let parsed: BulkEmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::dependency_unavailable("embedding", e.to_string()))?;
        if parsed.embeddings.len() != texts.len() {
            return Err(Error::dependency_unavailable(
                "embedding",
                format!(
                    "bulk endpoint returned {} vectors for {} texts",
                    parsed.embeddings.len(),
                    texts.len()
                ),
            ));
        }
        let vectors: Vec<Vec<f32>> = parsed.embeddings.into_iter().map(|e| e.embedding).collect();
        for vector in &vectors {
            self.check_dimension(vector)?;
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn provider_name(&self) -> &str {
        "http"
    }
}
