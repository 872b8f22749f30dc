//! Retrieval quality metrics
//!
//! All metrics operate on an ordered prediction list and a ground-truth set.
//! Duplicate predictions are collapsed to their first occurrence before any
//! scoring, ground truth must be non-empty, and `k` must be at least 1 —
//! violations raise a validation error rather than producing a silent 0.
//! Every metric lands in `[0, 1]`.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::domain::error::{Error, Result};

/// The metric families the evaluation pipeline can compute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Fraction of returned items that are relevant
    Precision,
    /// Fraction of relevant items that were returned
    Recall,
    /// Harmonic mean of precision and recall
    F1,
    /// Whether any relevant item was returned
    Hit,
    /// Reciprocal rank of the first relevant item
    Mrr,
    /// Normalized discounted cumulative gain
    Ndcg,
    /// Mean average precision
    Map,
}

impl MetricKind {
    /// Every metric, in reporting order
    pub fn all() -> &'static [MetricKind] {
        &[
            MetricKind::Precision,
            MetricKind::Recall,
            MetricKind::F1,
            MetricKind::Hit,
            MetricKind::Mrr,
            MetricKind::Ndcg,
            MetricKind::Map,
        ]
    }

    /// Snake-case name used in responses and run records
    pub fn name(&self) -> &'static str {
        match self {
            MetricKind::Precision => "precision",
            MetricKind::Recall => "recall",
            MetricKind::F1 => "f1",
            MetricKind::Hit => "hit",
            MetricKind::Mrr => "mrr",
            MetricKind::Ndcg => "ndcg",
            MetricKind::Map => "map",
        }
    }
}

fn validate(ground_truth: &[String], k: usize) -> Result<()> {
    if k == 0 {
        return Err(Error::validation("metric k must be >= 1"));
    }
    if ground_truth.is_empty() {
        return Err(Error::validation("ground truth must not be empty"));
    }
    Ok(())
}

/// Collapse duplicates to their first occurrence, preserving order
fn dedup_preserving_order(predictions: &[String]) -> Vec<&String> {
    let mut seen = HashSet::new();
    predictions
        .iter()
        .filter(|p| seen.insert(p.as_str()))
        .collect()
}

/// Compute one metric at one cutoff
pub fn compute(
    kind: MetricKind,
    predictions: &[String],
    ground_truth: &[String],
    k: usize,
) -> Result<f64> {
    validate(ground_truth, k)?;

    let truth: HashSet<&str> = ground_truth.iter().map(String::as_str).collect();
    let deduped = dedup_preserving_order(predictions);
    let top_k: Vec<&str> = deduped.iter().take(k).map(|s| s.as_str()).collect();
    let relevant: Vec<bool> = top_k.iter().map(|p| truth.contains(p)).collect();
    let hits = relevant.iter().filter(|&&r| r).count();

    let score = match kind {
        MetricKind::Precision => {
            if top_k.is_empty() {
                0.0
            } else {
                hits as f64 / top_k.len() as f64
            }
        }
        MetricKind::Recall => hits as f64 / truth.len() as f64,
        MetricKind::F1 => {
            let p = compute(MetricKind::Precision, predictions, ground_truth, k)?;
            let r = compute(MetricKind::Recall, predictions, ground_truth, k)?;
            if p == 0.0 || r == 0.0 {
                0.0
            } else {
                2.0 * p * r / (p + r)
            }
        }
        MetricKind::Hit => {
            if hits > 0 {
                1.0
            } else {
                0.0
            }
        }
        MetricKind::Mrr => relevant
            .iter()
            .position(|&r| r)
            .map_or(0.0, |idx0| 1.0 / (idx0 as f64 + 1.0)),
        MetricKind::Ndcg => {
            let dcg: f64 = relevant
                .iter()
                .enumerate()
                .filter(|(_, &r)| r)
                .map(|(idx0, _)| 1.0 / ((idx0 as f64 + 2.0).log2()))
                .sum();
            let ideal_len = truth.len().min(k);
            let idcg: f64 = (0..ideal_len)
                .map(|idx0| 1.0 / ((idx0 as f64 + 2.0).log2()))
                .sum();
            if idcg == 0.0 {
                0.0
            } else {
                dcg / idcg
            }
        }
        MetricKind::Map => {
            let mut hits_so_far = 0usize;
            let mut precision_sum = 0.0;
            for (idx0, &is_relevant) in relevant.iter().enumerate() {
                if is_relevant {
                    hits_so_far += 1;
                    precision_sum += hits_so_far as f64 / (idx0 as f64 + 1.0);
                }
            }
            if hits_so_far == 0 {
                0.0
            } else {
                precision_sum / truth.len().min(k) as f64
            }
        }
    };
    Ok(score)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    // predictions = [X, A, Y, B, Z], ground truth = {A, B, C}, k = 5
    fn scenario() -> (Vec<String>, Vec<String>) {
        (strs(&["X", "A", "Y", "B", "Z"]), strs(&["A", "B", "C"]))
    }

    #[test]
    fn precision_recall_hit_mrr_on_reference_scenario() {
        let (preds, truth) = scenario();
        assert!((compute(MetricKind::Precision, &preds, &truth, 5).unwrap() - 0.4).abs() < 1e-9);
        assert!(
            (compute(MetricKind::Recall, &preds, &truth, 5).unwrap() - 2.0 / 3.0).abs() < 1e-9
        );
        assert_eq!(compute(MetricKind::Hit, &preds, &truth, 5).unwrap(), 1.0);
        assert!((compute(MetricKind::Mrr, &preds, &truth, 5).unwrap() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn ndcg_on_reference_scenario() {
        let (preds, truth) = scenario();
        let dcg = 1.0 / 3.0_f64.log2() + 1.0 / 5.0_f64.log2();
        let idcg = 1.0 + 1.0 / 3.0_f64.log2() + 0.5;
        let expected = dcg / idcg;
        let got = compute(MetricKind::Ndcg, &preds, &truth, 5).unwrap();
        assert!((got - expected).abs() < 1e-9);
        assert!((got - 0.4982).abs() < 1e-3);
    }

    #[test]
    fn map_averages_precision_at_relevant_positions() {
        let (preds, truth) = scenario();
        // P@2 = 1/2 at A, P@4 = 2/4 at B; min(|G|, k) = 3
        let expected = (0.5 + 0.5) / 3.0;
        assert!((compute(MetricKind::Map, &preds, &truth, 5).unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn f1_is_harmonic_mean() {
        let (preds, truth) = scenario();
        let p = 0.4;
        let r = 2.0 / 3.0;
        let expected = 2.0 * p * r / (p + r);
        assert!((compute(MetricKind::F1, &preds, &truth, 5).unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn duplicates_collapse_before_scoring() {
        let preds = strs(&["A", "A", "A", "A"]);
        let truth = strs(&["A", "B", "C"]);
        assert_eq!(compute(MetricKind::Hit, &preds, &truth, 4).unwrap(), 1.0);
        assert_eq!(compute(MetricKind::Precision, &preds, &truth, 4).unwrap(), 1.0);
        assert!(
            (compute(MetricKind::Recall, &preds, &truth, 4).unwrap() - 1.0 / 3.0).abs() < 1e-9
        );
        assert_eq!(compute(MetricKind::Mrr, &preds, &truth, 4).unwrap(), 1.0);
    }

    #[test]
    fn empty_ground_truth_is_a_validation_error() {
        let preds = strs(&["A"]);
        for &kind in MetricKind::all() {
            assert!(compute(kind, &preds, &[], 5).is_err());
        }
    }

    #[test]
    fn zero_k_is_a_validation_error() {
        let (preds, truth) = scenario();
        assert!(compute(MetricKind::Precision, &preds, &truth, 0).is_err());
    }

    #[test]
    fn k_beyond_prediction_length_uses_what_is_available() {
        let preds = strs(&["A"]);
        let truth = strs(&["A", "B"]);
        assert_eq!(compute(MetricKind::Precision, &preds, &truth, 10).unwrap(), 1.0);
        assert_eq!(compute(MetricKind::Recall, &preds, &truth, 10).unwrap(), 0.5);
    }

    #[test]
    fn empty_predictions_score_zero_everywhere() {
        let truth = strs(&["A"]);
        for &kind in MetricKind::all() {
            assert_eq!(compute(kind, &[], &truth, 3).unwrap(), 0.0);
        }
    }

    #[test]
    fn all_scores_stay_in_unit_interval() {
        let cases = [
            (strs(&["A", "B", "C", "A", "B"]), strs(&["A", "Z"])),
            (strs(&["x"; 20]), strs(&["x"])),
            (strs(&["m", "n"]), strs(&["q", "r", "s", "t"])),
        ];
        for (preds, truth) in &cases {
            for &kind in MetricKind::all() {
                for k in 1..8 {
                    let score = compute(kind, preds, truth, k).unwrap();
                    assert!((0.0..=1.0).contains(&score), "{kind:?}@{k} = {score}");
                    assert!(score.is_finite());
                }
            }
        }
    }
}
