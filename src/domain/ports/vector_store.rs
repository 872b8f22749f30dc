use crate::domain::error::Result;
use crate::domain::types::{Filter, VectorRecord};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Distance metric used by a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Cosine similarity (the platform default)
    Cosine,
    /// Dot product
    Dot,
    /// Euclidean distance
    Euclid,
}

impl DistanceMetric {
    /// Wire name used by Qdrant-protocol stores
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "Cosine",
            DistanceMetric::Dot => "Dot",
            DistanceMetric::Euclid => "Euclid",
        }
    }
}

/// One scored hit from a vector search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPoint {
    /// Stored point id
    pub id: String,
    /// Similarity score under the collection's metric
    pub score: f32,
    /// Stored payload
    pub payload: serde_json::Value,
}

/// One page of a scroll over stored points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrollPage {
    /// Records in this page
    pub records: Vec<VectorRecord>,
    /// Opaque continuation token for the next page; `None` when exhausted
    pub next_offset: Option<String>,
}

/// Contract for external vector stores
///
/// Implementations translate the internal [`Filter`] DSL to their wire
/// protocol. Unknown filter fields must yield no matches, never an error.
#[async_trait]
pub trait VectorStoreProvider: Send + Sync {
    /// Idempotently create `name` with the given dimension and metric
    ///
    /// Never truncates an existing collection.
    async fn ensure_collection(
        &self,
        name: &str,
        dimension: usize,
        metric: DistanceMetric,
    ) -> Result<()>;

    /// Insert or overwrite records by id; returns the number written
    async fn upsert(&self, collection: &str, records: &[VectorRecord]) -> Result<usize>;

    /// Ranked nearest-neighbour search
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        filter: Option<&Filter>,
    ) -> Result<Vec<ScoredPoint>>;

    /// Delete every point matching the filter; returns the count removed
    async fn delete_by_filter(&self, collection: &str, filter: &Filter) -> Result<usize>;

    /// Count points, optionally restricted by a filter
    async fn count(&self, collection: &str, filter: Option<&Filter>) -> Result<usize>;

    /// Page through stored points without scoring
    ///
    /// `offset` is the token returned by the previous page, opaque to callers.
    async fn scroll(
        &self,
        collection: &str,
        filter: Option<&Filter>,
        offset: Option<&str>,
        limit: usize,
    ) -> Result<ScrollPage>;

    /// Human-readable provider name for logs
    fn provider_name(&self) -> &str;
}
