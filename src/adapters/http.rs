//! Generic HTTP retrieval adapter
//!
//! One POST per retrieve call, with the request body shape and the response
//! extraction paths both driven by configuration. Field paths are
//! dot-separated (`data.results` walks one level down), which covers the
//! response envelopes of every backend this platform has had to talk to.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::domain::error::{Error, Result};
use crate::domain::ports::RetrievalAdapter;
use crate::domain::types::{RetrievalResult, RetrievalSource};
use crate::infrastructure::http::{build_client, send_with_retry, RetryPolicy};

/// Request body shape
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestFormat {
    /// Field carrying the query text
    pub query_field: String,
    /// Field carrying `k`
    pub k_field: String,
    /// Extra constant fields merged into every request
    pub extras: BTreeMap<String, Value>,
}

impl Default for RequestFormat {
    fn default() -> Self {
        Self {
            query_field: "query".to_string(),
            k_field: "top_k".to_string(),
            extras: BTreeMap::new(),
        }
    }
}

/// Response extraction paths
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseFormat {
    /// Path to the results array
    pub results_field: String,
    /// Path to a result's content, relative to the result object
    pub content_field: String,
    /// Path to a result's score
    pub score_field: String,
    /// Path to a result's file path, if the backend exposes one
    pub filepath_field: String,
    /// Path to a result's id; synthesized from the rank when absent
    pub id_field: String,
}

impl Default for ResponseFormat {
    fn default() -> Self {
        Self {
            results_field: "results".to_string(),
            content_field: "content".to_string(),
            score_field: "score".to_string(),
            filepath_field: "filepath".to_string(),
            id_field: "id".to_string(),
        }
    }
}

/// Configuration for [`GenericHttpAdapter`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpAdapterConfig {
    /// Adapter name for logs and run records
    pub name: String,
    /// Full endpoint URL the retrieval POST goes to
    pub endpoint: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retry attempts on transport errors and 5xx
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Request body shape
    #[serde(default)]
    pub request_format: RequestFormat,
    /// Response extraction paths
    #[serde(default)]
    pub response_format: ResponseFormat,
    /// Extra headers sent with every request
    #[serde(default)]
    pub custom_headers: BTreeMap<String, String>,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

/// Configurable single-endpoint HTTP backend
#[derive(Debug)]
pub struct GenericHttpAdapter {
    config: HttpAdapterConfig,
    client: reqwest::Client,
    retry: RetryPolicy,
}

/// Walk a dot-separated path into a JSON value
fn walk<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

impl GenericHttpAdapter {
    /// Build the adapter with a pooled client
    pub fn new(config: HttpAdapterConfig) -> Result<Self> {
        let client = build_client(Duration::from_secs(config.timeout_secs))?;
        let retry = RetryPolicy::with_attempts(config.max_retries.max(1));
        Ok(Self {
            config,
            client,
            retry,
        })
    }

    fn build_body(&self, query: &str, k: usize) -> Value {
        let fmt = &self.config.request_format;
        let mut body = json!({});
        body[&fmt.query_field] = Value::String(query.to_string());
        body[&fmt.k_field] = json!(k);
        for (field, value) in &fmt.extras {
            body[field] = value.clone();
        }
        body
    }

    fn parse_results(&self, payload: &Value) -> Vec<RetrievalResult> {
        let fmt = &self.config.response_format;
        let Some(items) = walk(payload, &fmt.results_field).and_then(Value::as_array) else {
            return Vec::new();
        };

        items
            .iter()
            .enumerate()
            .map(|(rank0, item)| {
                let id = walk(item, &fmt.id_field)
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("{}-{}", self.config.name, rank0 + 1));
                let content = walk(item, &fmt.content_field)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let score = walk(item, &fmt.score_field)
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0) as f32;
                let file_path = walk(item, &fmt.filepath_field)
                    .and_then(Value::as_str)
                    .map(str::to_string);
                RetrievalResult {
                    id,
                    content,
                    score: score.max(0.0),
                    source: RetrievalSource::Hybrid,
                    metadata: item.clone(),
                    file_path,
                }
            })
            .collect()
    }
}

#[async_trait]
impl RetrievalAdapter for GenericHttpAdapter {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievalResult>> {
        if query.trim().is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let body = self.build_body(query, k);
        let response = send_with_retry(
            || {
                let mut builder = self.client.post(&self.config.endpoint).json(&body);
                for (header, value) in &self.config.custom_headers {
                    builder = builder.header(header, value);
                }
                builder
            },
            &self.retry,
            &self.config.name,
        )
        .await?;

        if !response.status().is_success() {
            return Err(Error::dependency_unavailable(
                &self.config.name,
                format!("retrieval endpoint returned {}", response.status()),
            ));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| Error::dependency_unavailable(&self.config.name, e.to_string()))?;
        let results = self.parse_results(&payload);
        debug!(adapter = %self.config.name, count = results.len(), "http adapter retrieved");
        Ok(results)
    }

    async fn health_check(&self) -> bool {
        self.retrieve("health check", 1).await.is_ok()
    }

    async fn close(&self) {
        // Connection pool tears down with the client on drop
    }

    fn adapter_name(&self) -> &str {
        &self.config.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_nested_paths() {
        let value = json!({"data": {"results": [1, 2]}});
        assert!(walk(&value, "data.results").is_some());
        assert!(walk(&value, "data.missing").is_none());
    }

    #[test]
    fn parses_configured_response_shape() {
        let config = HttpAdapterConfig {
            name: "custom".to_string(),
            endpoint: "http://unused".to_string(),
            timeout_secs: 5,
            max_retries: 1,
            request_format: RequestFormat::default(),
            response_format: ResponseFormat {
                results_field: "data.hits".to_string(),
                content_field: "text".to_string(),
                score_field: "relevance".to_string(),
                filepath_field: "meta.path".to_string(),
                id_field: "doc_id".to_string(),
            },
            custom_headers: BTreeMap::new(),
        };
        let adapter = GenericHttpAdapter::new(config).unwrap();
        let payload = json!({
            "data": {"hits": [
                {"doc_id": "x", "text": "hello", "relevance": 0.8, "meta": {"path": "a/B.java"}},
                {"text": "anonymous", "relevance": 0.2},
            ]}
        });
        let results = adapter.parse_results(&payload);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "x");
        assert_eq!(results[0].file_path.as_deref(), Some("a/B.java"));
        assert_eq!(results[1].id, "custom-2");
        assert_eq!(results[1].content, "anonymous");
    }
}
