//! Qdrant-protocol REST vector store provider
//!
//! Talks to any server speaking the Qdrant HTTP API. Document ids in this
//! platform are arbitrary strings, while Qdrant point ids must be integers
//! or UUIDs; the provider derives a stable UUID from each document id and
//! carries the original id in the payload under `_doc_id`, restoring it on
//! the way out. Filter translation maps the internal AND-of-conditions DSL
//! onto `must` clauses with `match.value` / `match.any`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::domain::error::{Error, Result};
use crate::domain::ports::{DistanceMetric, ScoredPoint, ScrollPage, VectorStoreProvider};
use crate::domain::types::{Filter, MatchPredicate, VectorRecord};
use crate::infrastructure::http::{build_client, send_with_retry, RetryPolicy};

/// Payload key carrying the caller-facing document id
const DOC_ID_KEY: &str = "_doc_id";

/// REST provider for Qdrant-compatible stores
pub struct QdrantVectorStoreProvider {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

#[derive(Deserialize)]
struct ApiResponse<T> {
    result: T,
}

#[derive(Deserialize)]
struct SearchHit {
    id: Value,
    score: f32,
    #[serde(default)]
    payload: Value,
}

#[derive(Deserialize)]
struct CountResult {
    count: usize,
}

#[derive(Deserialize)]
struct ScrollResult {
    points: Vec<ScrollPoint>,
    #[serde(default)]
    next_page_offset: Option<Value>,
}

#[derive(Deserialize)]
struct ScrollPoint {
    id: Value,
    #[serde(default)]
    payload: Value,
    #[serde(default)]
    vector: Option<Vec<f32>>,
}

impl QdrantVectorStoreProvider {
    /// Build a provider with a pooled client and bounded request timeout
    pub fn new(base_url: impl Into<String>, timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry,
        })
    }

    /// Deterministic UUID for a document id
    fn point_uuid(doc_id: &str) -> String {
        let digest = Sha256::digest(doc_id.as_bytes());
        let hex: String = digest[..16].iter().map(|b| format!("{b:02x}")).collect();
        format!(
            "{}-{}-{}-{}-{}",
            &hex[0..8],
            &hex[8..12],
            &hex[12..16],
            &hex[16..20],
            &hex[20..32]
        )
    }

    fn translate_filter(filter: &Filter) -> Value {
        let must: Vec<Value> = filter
            .conditions
            .iter()
            .map(|cond| match &cond.predicate {
                MatchPredicate::Equals(value) => json!({
                    "key": cond.field,
                    "match": { "value": value },
                }),
                MatchPredicate::AnyOf(values) => json!({
                    "key": cond.field,
                    "match": { "any": values },
                }),
            })
            .collect();
        json!({ "must": must })
    }

    fn doc_id_of(id: &Value, payload: &Value) -> String {
        payload
            .get(DOC_ID_KEY)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| match id {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
    }

    async fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<reqwest::Response> {
        let url = format!("{}{path}", self.base_url);
        let response = send_with_retry(
            || {
                let mut builder = self.client.request(method.clone(), &url);
                if let Some(body) = &body {
                    builder = builder.json(body);
                }
                builder
            },
            &self.retry,
            "vector-store",
        )
        .await?;
        Ok(response)
    }

    async fn expect_success(&self, response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::not_found(what.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::dependency_unavailable(
                "vector-store",
                format!("{what}: {status} {body}"),
            ));
        }
        Ok(response)
    }
}

#[async_trait]
impl VectorStoreProvider for QdrantVectorStoreProvider {
    async fn ensure_collection(
        &self,
        name: &str,
        dimension: usize,
        metric: DistanceMetric,
    ) -> Result<()> {
        let existing = self
            .request(reqwest::Method::GET, &format!("/collections/{name}"), None)
            .await?;
        if existing.status().is_success() {
            return Ok(());
        }

        let body = json!({
            "vectors": { "size": dimension, "distance": metric.as_wire_str() },
        });
        let response = self
            .request(
                reqwest::Method::PUT,
                &format!("/collections/{name}"),
                Some(body),
            )
            .await?;
        self.expect_success(response, &format!("create collection '{name}'"))
            .await?;
        debug!(collection = name, dimension, "collection created");
        Ok(())
    }

    async fn upsert(&self, collection: &str, records: &[VectorRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let points: Vec<Value> = records
            .iter()
            .map(|record| {
                let mut payload = record.payload.clone();
                if let Value::Object(map) = &mut payload {
                    map.insert(DOC_ID_KEY.to_string(), Value::String(record.id.clone()));
                }
                json!({
                    "id": Self::point_uuid(&record.id),
                    "vector": record.vector,
                    "payload": payload,
                })
            })
            .collect();

        let response = self
            .request(
                reqwest::Method::PUT,
                &format!("/collections/{collection}/points?wait=true"),
                Some(json!({ "points": points })),
            )
            .await?;
        self.expect_success(response, &format!("upsert into '{collection}'"))
            .await?;
        Ok(records.len())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        filter: Option<&Filter>,
    ) -> Result<Vec<ScoredPoint>> {
        let mut body = json!({
            "vector": vector,
            "limit": limit,
            "with_payload": true,
        });
        if let Some(f) = filter.filter(|f| !f.is_empty()) {
            body["filter"] = Self::translate_filter(f);
        }

        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/collections/{collection}/points/search"),
                Some(body),
            )
            .await?;
        let response = self
            .expect_success(response, &format!("search '{collection}'"))
            .await?;
        let parsed: ApiResponse<Vec<SearchHit>> = response
            .json()
            .await
            .map_err(|e| Error::dependency_unavailable("vector-store", e.to_string()))?;

        Ok(parsed
            .result
            .into_iter()
            .map(|hit| ScoredPoint {
                id: Self::doc_id_of(&hit.id, &hit.payload),
                score: hit.score,
                payload: hit.payload,
            })
            .collect())
    }

    async fn delete_by_filter(&self, collection: &str, filter: &Filter) -> Result<usize> {
        // The delete endpoint does not report how many points it removed,
        // so count first with the same filter.
        let matching = self.count(collection, Some(filter)).await?;
        if matching == 0 {
            return Ok(0);
        }

        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/collections/{collection}/points/delete?wait=true"),
                Some(json!({ "filter": Self::translate_filter(filter) })),
            )
            .await?;
        self.expect_success(response, &format!("delete from '{collection}'"))
            .await?;
        Ok(matching)
    }

    async fn count(&self, collection: &str, filter: Option<&Filter>) -> Result<usize> {
        let mut body = json!({ "exact": true });
        if let Some(f) = filter.filter(|f| !f.is_empty()) {
            body["filter"] = Self::translate_filter(f);
        }
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/collections/{collection}/points/count"),
                Some(body),
            )
            .await?;
        let response = self
            .expect_success(response, &format!("count '{collection}'"))
            .await?;
        let parsed: ApiResponse<CountResult> = response
            .json()
            .await
            .map_err(|e| Error::dependency_unavailable("vector-store", e.to_string()))?;
        Ok(parsed.result.count)
    }

    async fn scroll(
        &self,
        collection: &str,
        filter: Option<&Filter>,
        offset: Option<&str>,
        limit: usize,
    ) -> Result<ScrollPage> {
        let mut body = json!({
            "limit": limit,
            "with_payload": true,
            "with_vector": true,
        });
        if let Some(f) = filter.filter(|f| !f.is_empty()) {
            body["filter"] = Self::translate_filter(f);
        }
        if let Some(token) = offset {
            body["offset"] = Value::String(token.to_string());
        }

        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/collections/{collection}/points/scroll"),
                Some(body),
            )
            .await?;
        let response = self
            .expect_success(response, &format!("scroll '{collection}'"))
            .await?;
        let parsed: ApiResponse<ScrollResult> = response
            .json()
            .await
            .map_err(|e| Error::dependency_unavailable("vector-store", e.to_string()))?;

        let records = parsed
            .result
            .points
            .into_iter()
            .map(|point| VectorRecord {
                id: Self::doc_id_of(&point.id, &point.payload),
                vector: point.vector.unwrap_or_default(),
                payload: point.payload,
            })
            .collect();
        let next_offset = parsed.result.next_page_offset.map(|v| match v {
            Value::String(s) => s,
            other => other.to_string(),
        });

        Ok(ScrollPage {
            records,
            next_offset,
        })
    }

    fn provider_name(&self) -> &str {
        "qdrant"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_uuid_is_stable_and_well_formed() {
        let a = QdrantVectorStoreProvider::point_uuid("doc-1");
        let b = QdrantVectorStoreProvider::point_uuid("doc-1");
        let c = QdrantVectorStoreProvider::point_uuid("doc-2");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 36);
        assert_eq!(a.chars().filter(|&ch| ch == '-').count(), 4);
    }

    #[test]
    fn filter_translation_covers_both_predicates() {
        let mut filter = Filter::equals("language", "java");
        filter.conditions.extend(
            Filter::any_of("code_type", vec![json!("class"), json!("method")]).conditions,
        );
        let wire = QdrantVectorStoreProvider::translate_filter(&filter);
        assert_eq!(wire["must"][0]["key"], "language");
        assert_eq!(wire["must"][0]["match"]["value"], "java");
        assert_eq!(wire["must"][1]["match"]["any"][1], "method");
    }
}
