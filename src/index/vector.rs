//! Vector index facade
//!
//! Thin coordination layer over a [`VectorStoreProvider`]: idempotent
//! collection setup, oversampled search with local post-filtering, batched
//! upserts, and filtered deletes. The facade never talks wire protocol
//! itself; providers translate the internal filter DSL.
//!
//! Oversampling exists because some backends apply payload filters after
//! top-k selection; requesting `max(k * oversample, min_fetch)` keeps recall
//! stable when filters are strict.

use std::sync::Arc;

use tracing::debug;

use crate::domain::error::Result;
use crate::domain::ports::{DistanceMetric, ScrollPage, VectorStoreProvider};
use crate::domain::types::{Filter, RetrievalResult, RetrievalSource, VectorRecord};

/// Configuration for [`VectorIndex`]
#[derive(Debug, Clone)]
pub struct VectorIndexConfig {
    /// Collection name
    pub collection: String,
    /// Vector dimension for the collection
    pub dimension: usize,
    /// Distance metric; cosine unless configured otherwise
    pub metric: DistanceMetric,
    /// Search over-fetch multiplier
    pub oversample: usize,
    /// Minimum fetch size regardless of `k`
    pub min_fetch: usize,
    /// Upsert batch size; one batch in flight at a time
    pub batch_size: usize,
}

impl Default for VectorIndexConfig {
    fn default() -> Self {
        Self {
            collection: "code_chunks".to_string(),
            dimension: 384,
            metric: DistanceMetric::Cosine,
            oversample: 3,
            min_fetch: 50,
            batch_size: 100,
        }
    }
}

/// Facade over an external vector store
pub struct VectorIndex {
    store: Arc<dyn VectorStoreProvider>,
    config: VectorIndexConfig,
}

impl VectorIndex {
    /// Create the facade; call [`Self::setup`] before first use
    pub fn new(store: Arc<dyn VectorStoreProvider>, config: VectorIndexConfig) -> Self {
        Self { store, config }
    }

    /// Effective configuration
    pub fn config(&self) -> &VectorIndexConfig {
        &self.config
    }

    /// Idempotently create the configured collection; never truncates
    pub async fn setup(&self) -> Result<()> {
        self.store
            .ensure_collection(
                &self.config.collection,
                self.config.dimension,
                self.config.metric,
            )
            .await
    }

    /// Upsert records in batches; returns the total written
    ///
    /// Later writes win for duplicate ids, so upserting the same record
    /// twice leaves the collection size unchanged with the newer payload.
    pub async fn upsert(&self, records: &[VectorRecord]) -> Result<usize> {
        let mut written = 0;
        for batch in records.chunks(self.config.batch_size.max(1)) {
            written += self.store.upsert(&self.config.collection, batch).await?;
        }
        debug!(written, collection = %self.config.collection, "vector records upserted");
        Ok(written)
    }

    /// Ranked similarity search with oversampling and local post-filtering
    pub async fn search(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&Filter>,
    ) -> Result<Vec<RetrievalResult>> {
        if k == 0 || vector.is_empty() {
            return Ok(Vec::new());
        }
        let fetch = (k * self.config.oversample).max(self.config.min_fetch);
        let points = self
            .store
            .search(&self.config.collection, vector, fetch, filter)
            .await?;

        let mut results = Vec::with_capacity(k);
        for point in points {
            if results.len() >= k {
                break;
            }
            if let Some(f) = filter {
                if !f.matches(&point.payload) {
                    continue;
                }
            }
            let content = point
                .payload
                .get("content")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let file_path = point
                .payload
                .get("file_path")
                .and_then(|v| v.as_str())
                .map(str::to_string);
            results.push(RetrievalResult {
                id: point.id,
                content,
                score: point.score.max(0.0),
                source: RetrievalSource::Vector,
                metadata: point.payload,
                file_path,
            });
        }
        Ok(results)
    }

    /// Delete every record matching the filter; returns the count removed
    pub async fn delete_by_filter(&self, filter: &Filter) -> Result<usize> {
        self.store
            .delete_by_filter(&self.config.collection, filter)
            .await
    }

    /// Delete every record for a source file
    ///
    /// Re-indexing invalidation: all chunks of a file are dropped together
    /// before the new parse is inserted.
    pub async fn delete_by_file_path(&self, file_path: &str) -> Result<usize> {
        self.delete_by_filter(&Filter::equals("file_path", file_path))
            .await
    }

    /// Count stored records, optionally filtered
    pub async fn count(&self, filter: Option<&Filter>) -> Result<usize> {
        self.store.count(&self.config.collection, filter).await
    }

    /// Page through stored records
    pub async fn scroll(
        &self,
        filter: Option<&Filter>,
        offset: Option<&str>,
        limit: usize,
    ) -> Result<ScrollPage> {
        self.store
            .scroll(&self.config.collection, filter, offset, limit)
            .await
    }
}
