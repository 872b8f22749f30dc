//! Evaluation pipeline: datasets, metrics, normalization, and batch runs

/// Filepath → classpath normalization
pub mod classpath;
/// Dataset loading and validation
pub mod dataset;
/// Retrieval quality metrics
pub mod metrics;
/// Append-only run log
pub mod run_log;
/// Batch evaluation service
pub mod service;

pub use dataset::{DatasetLoader, ValidationReport};
pub use metrics::{compute, MetricKind};
pub use run_log::{EvaluationRunLog, RunRecord};
pub use service::{EvaluationOptions, EvaluationRequest, EvaluationResponse, EvaluationService};
