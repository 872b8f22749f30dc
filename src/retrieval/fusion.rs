//! Score fusion for hybrid retrieval
//!
//! Combines the ranked lists from the vector and BM25 legs into one list.
//! Two strategies are available per call:
//!
//! - **Weighted sum**: cosine scores are clipped to `[0, 1]`; BM25 scores are
//!   min–max normalized to `[0, 1]` across this call's BM25 result set (all
//!   zero when the set has no spread); missing scores contribute 0. Ties
//!   break by higher vector score, then ascending id.
//! - **Reciprocal-rank fusion**: each list contributes `1 / (k + rank)` with
//!   1-based ranks; documents absent from a list contribute nothing from it.
//!   Ties break by ascending id.
//!
//! Both orderings are fully deterministic for identical inputs.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::types::{FusedResult, RetrievalResult, RetrievalSource};

/// Fusion strategy selected per call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum FusionMethod {
    /// Weighted sum of normalized per-source scores
    WeightedSum {
        /// Weight applied to the clipped cosine score
        vector_weight: f32,
        /// Weight applied to the normalized BM25 score
        bm25_weight: f32,
    },
    /// Reciprocal-rank fusion over the two ranked lists
    ReciprocalRank {
        /// Rank constant; larger values flatten the contribution curve
        rrf_k: u32,
    },
}

impl Default for FusionMethod {
    fn default() -> Self {
        FusionMethod::ReciprocalRank { rrf_k: 60 }
    }
}

impl FusionMethod {
    /// Weighted sum with the platform default weights (0.7 / 0.3)
    pub fn default_weighted() -> Self {
        FusionMethod::WeightedSum {
            vector_weight: 0.7,
            bm25_weight: 0.3,
        }
    }

    /// Short name for logs and response payloads
    pub fn name(&self) -> &'static str {
        match self {
            FusionMethod::WeightedSum { .. } => "weighted_sum",
            FusionMethod::ReciprocalRank { .. } => "rrf",
        }
    }
}

struct Accumulator {
    content: String,
    metadata: serde_json::Value,
    vector_score: f32,
    bm25_score: f32,
    vector_rank: Option<usize>,
    bm25_rank: Option<usize>,
    sources: Vec<RetrievalSource>,
}

/// Fuse the two ranked result lists into one, best-first
pub fn fuse(
    vector_results: &[RetrievalResult],
    bm25_results: &[RetrievalResult],
    method: FusionMethod,
) -> Vec<FusedResult> {
    let mut by_id: HashMap<String, Accumulator> = HashMap::new();

    for (rank0, result) in vector_results.iter().enumerate() {
        by_id.insert(
            result.id.clone(),
            Accumulator {
                content: result.content.clone(),
                metadata: result.metadata.clone(),
                vector_score: result.score,
                bm25_score: 0.0,
                vector_rank: Some(rank0 + 1),
                bm25_rank: None,
                sources: vec![RetrievalSource::Vector],
            },
        );
    }

    for (rank0, result) in bm25_results.iter().enumerate() {
        match by_id.get_mut(&result.id) {
            Some(acc) => {
                acc.bm25_score = result.score;
                acc.bm25_rank = Some(rank0 + 1);
                acc.sources.push(RetrievalSource::Bm25);
            }
            None => {
                by_id.insert(
                    result.id.clone(),
                    Accumulator {
                        content: result.content.clone(),
                        metadata: result.metadata.clone(),
                        vector_score: 0.0,
                        bm25_score: result.score,
                        vector_rank: None,
                        bm25_rank: Some(rank0 + 1),
                        sources: vec![RetrievalSource::Bm25],
                    },
                );
            }
        }
    }

    // BM25 min-max bounds are computed over this call's BM25 result set
    let (bm25_min, bm25_max) = bm25_results
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), r| {
            (lo.min(r.score), hi.max(r.score))
        });
    let normalize_bm25 = |score: f32, present: bool| -> f32 {
        if !present || bm25_max <= bm25_min {
            0.0
        } else {
            (score - bm25_min) / (bm25_max - bm25_min)
        }
    };

    let mut fused: Vec<FusedResult> = by_id
        .into_iter()
        .map(|(id, acc)| {
            let combined = match method {
                FusionMethod::WeightedSum {
                    vector_weight,
                    bm25_weight,
                } => {
                    let clipped_vector = acc.vector_score.clamp(0.0, 1.0);
                    let normalized_bm25 =
                        normalize_bm25(acc.bm25_score, acc.bm25_rank.is_some());
                    vector_weight * clipped_vector + bm25_weight * normalized_bm25
                }
                FusionMethod::ReciprocalRank { rrf_k } => {
                    let contribution = |rank: Option<usize>| {
                        rank.map_or(0.0, |r| 1.0 / (rrf_k as f32 + r as f32))
                    };
                    contribution(acc.vector_rank) + contribution(acc.bm25_rank)
                }
            };
            FusedResult {
                id,
                content: acc.content,
                vector_score: acc.vector_score,
                bm25_score: acc.bm25_score,
                vector_rank: acc.vector_rank,
                bm25_rank: acc.bm25_rank,
                combined_score: combined,
                sources: acc.sources,
                metadata: acc.metadata,
            }
        })
        .collect();

    match method {
        FusionMethod::WeightedSum { .. } => {
            fused.sort_by(|a, b| {
                b.combined_score
                    .partial_cmp(&a.combined_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| {
                        b.vector_score
                            .partial_cmp(&a.vector_score)
                            .unwrap_or(std::cmp::Ordering::Equal)
                    })
                    .then_with(|| a.id.cmp(&b.id))
            });
        }
        FusionMethod::ReciprocalRank { .. } => {
            fused.sort_by(|a, b| {
                b.combined_score
                    .partial_cmp(&a.combined_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.id.cmp(&b.id))
            });
        }
    }
    fused
}
