//! In-memory vector store provider
//!
//! Exact-scan cosine search over a [`DashMap`] of collections. Useful for
//! tests, local development, and the hybrid-local adapter when no external
//! store is configured. Ordering is deterministic: ties in score break by
//! ascending id, and scroll pages iterate ids in sorted order.

use std::collections::BTreeMap;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::domain::error::{Error, Result};
use crate::domain::ports::{DistanceMetric, ScoredPoint, ScrollPage, VectorStoreProvider};
use crate::domain::types::{Filter, VectorRecord};

struct Collection {
    dimension: usize,
    metric: DistanceMetric,
    // BTreeMap keeps scroll order stable across calls
    points: BTreeMap<String, (Vec<f32>, serde_json::Value)>,
}

/// Thread-safe in-process vector store
#[derive(Default)]
pub struct InMemoryVectorStoreProvider {
    collections: DashMap<String, Collection>,
}

impl InMemoryVectorStoreProvider {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn similarity(metric: DistanceMetric, a: &[f32], b: &[f32]) -> f32 {
        match metric {
            DistanceMetric::Cosine => {
                let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
                let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
                let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
                if na == 0.0 || nb == 0.0 {
                    0.0
                } else {
                    dot / (na * nb)
                }
            }
            DistanceMetric::Dot => a.iter().zip(b).map(|(x, y)| x * y).sum(),
            DistanceMetric::Euclid => {
                let dist: f32 = a
                    .iter()
                    .zip(b)
                    .map(|(x, y)| (x - y) * (x - y))
                    .sum::<f32>()
                    .sqrt();
                // Higher is better for ranking, like the real backends report
                1.0 / (1.0 + dist)
            }
        }
    }
}

#[async_trait]
impl VectorStoreProvider for InMemoryVectorStoreProvider {
    async fn ensure_collection(
        &self,
        name: &str,
        dimension: usize,
        metric: DistanceMetric,
    ) -> Result<()> {
        if let Some(existing) = self.collections.get(name) {
            if existing.dimension != dimension {
                return Err(Error::validation(format!(
                    "collection '{name}' exists with dimension {}, requested {dimension}",
                    existing.dimension
                )));
            }
            return Ok(());
        }
        self.collections.insert(
            name.to_string(),
            Collection {
                dimension,
                metric,
                points: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn upsert(&self, collection: &str, records: &[VectorRecord]) -> Result<usize> {
        let mut entry = self
            .collections
            .get_mut(collection)
            .ok_or_else(|| Error::not_found(format!("collection '{collection}'")))?;
        for record in records {
            if record.vector.len() != entry.dimension {
                return Err(Error::validation(format!(
                    "vector dimension {} does not match collection dimension {}",
                    record.vector.len(),
                    entry.dimension
                )));
            }
            entry.points.insert(
                record.id.clone(),
                (record.vector.clone(), record.payload.clone()),
            );
        }
        Ok(records.len())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        filter: Option<&Filter>,
    ) -> Result<Vec<ScoredPoint>> {
        let entry = self
            .collections
            .get(collection)
            .ok_or_else(|| Error::not_found(format!("collection '{collection}'")))?;

        let mut scored: Vec<ScoredPoint> = entry
            .points
            .iter()
            .filter(|(_, (_, payload))| filter.is_none_or(|f| f.matches(payload)))
            .map(|(id, (v, payload))| ScoredPoint {
                id: id.clone(),
                score: Self::similarity(entry.metric, vector, v),
                payload: payload.clone(),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(limit);
        Ok(scored)
    }

    async fn delete_by_filter(&self, collection: &str, filter: &Filter) -> Result<usize> {
        let mut entry = self
            .collections
            .get_mut(collection)
            .ok_or_else(|| Error::not_found(format!("collection '{collection}'")))?;
        let before = entry.points.len();
        entry.points.retain(|_, (_, payload)| !filter.matches(payload));
        Ok(before - entry.points.len())
    }

    async fn count(&self, collection: &str, filter: Option<&Filter>) -> Result<usize> {
        let entry = self
            .collections
            .get(collection)
            .ok_or_else(|| Error::not_found(format!("collection '{collection}'")))?;
        Ok(entry
            .points
            .values()
            .filter(|(_, payload)| filter.is_none_or(|f| f.matches(payload)))
            .count())
    }

    async fn scroll(
        &self,
        collection: &str,
        filter: Option<&Filter>,
        offset: Option<&str>,
        limit: usize,
    ) -> Result<ScrollPage> {
        let entry = self
            .collections
            .get(collection)
            .ok_or_else(|| Error::not_found(format!("collection '{collection}'")))?;

        let matching: Vec<(&String, &(Vec<f32>, serde_json::Value))> = entry
            .points
            .iter()
            .filter(|(_, (_, payload))| filter.is_none_or(|f| f.matches(payload)))
            .collect();

        let start: usize = offset.and_then(|o| o.parse().ok()).unwrap_or(0);
        let records: Vec<VectorRecord> = matching
            .iter()
            .skip(start)
            .take(limit)
            .map(|(id, (vector, payload))| VectorRecord {
                id: (*id).clone(),
                vector: vector.clone(),
                payload: payload.clone(),
            })
            .collect();

        let consumed = start + records.len();
        let next_offset = (consumed < matching.len()).then(|| consumed.to_string());
        Ok(ScrollPage {
            records,
            next_offset,
        })
    }

    fn provider_name(&self) -> &str {
        "in_memory"
    }
}
