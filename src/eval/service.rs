//! Batch evaluation pipeline
//!
//! Given an adapter, a dataset, the cutoffs, and the metric selection, the
//! service retrieves predictions per question, normalizes identifiers when
//! classpath conversion is on, and aggregates per-metric-per-k averages.
//!
//! Failure isolation is per question: a failing retrieval contributes empty
//! predictions (scoring 0 everywhere) and bumps `failed_questions`; the run
//! itself never aborts for a single bad question. Questions are processed
//! sequentially by default to respect downstream rate limits; bounded
//! parallelism is available through a semaphore.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Semaphore;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::error::{Error, Result};
use crate::domain::ports::RetrievalAdapter;
use crate::domain::types::EvaluationQuestion;
use crate::eval::classpath::{normalize_ground_truth, normalize_prediction};
use crate::eval::dataset::DatasetLoader;
use crate::eval::metrics::{compute, MetricKind};
use crate::eval::run_log::{EvaluationRunLog, RunRecord};

/// Per-run evaluation options
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationOptions {
    /// Normalize file-path predictions and ground truth to dotted classpaths
    pub convert_filepath_to_classpath: bool,
    /// Trim trailing lowercase method segments during normalization
    pub ignore_method_names: bool,
}

/// One evaluation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRequest {
    /// Dataset directory name under the configured root
    pub dataset_name: String,
    /// Cutoffs to compute each metric at
    pub k_values: Vec<usize>,
    /// Metric selection; empty means all metrics
    #[serde(default)]
    pub metrics: Vec<MetricKind>,
    /// Normalization options
    #[serde(default)]
    pub options: EvaluationOptions,
    /// Append a run record to the configured log
    #[serde(default)]
    pub save_results: bool,
}

/// Aggregated evaluation outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResponse {
    /// Dataset evaluated
    pub dataset_name: String,
    /// Adapter the questions were sent to
    pub system_name: String,
    /// `metric → k → averaged score`
    pub metrics: BTreeMap<String, BTreeMap<String, f64>>,
    /// Wall-clock duration of the run
    pub wall_time_ms: u64,
    /// Questions processed (including failed ones)
    pub question_count: usize,
    /// Questions whose retrieval failed and contributed empty predictions
    pub failed_questions: usize,
    /// Cutoffs the metrics were computed at
    pub k_values: Vec<usize>,
}

/// Batch evaluator over a [`RetrievalAdapter`]
pub struct EvaluationService {
    loader: DatasetLoader,
    run_log: Option<EvaluationRunLog>,
    concurrency: usize,
}

struct QuestionOutcome {
    predictions: Vec<String>,
    ground_truth: Vec<String>,
    failed: bool,
}

impl EvaluationService {
    /// Service over the given dataset root, with sequential processing
    pub fn new(loader: DatasetLoader) -> Self {
        Self {
            loader,
            run_log: None,
            concurrency: 1,
        }
    }

    /// Attach an append-only run log
    pub fn with_run_log(mut self, run_log: EvaluationRunLog) -> Self {
        self.run_log = Some(run_log);
        self
    }

    /// Bound question parallelism; 1 keeps the default sequential behavior
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Datasets available under the configured root
    pub fn list_datasets(&self) -> Vec<String> {
        self.loader.list_datasets()
    }

    /// Validate a dataset without running anything
    pub fn validate_dataset(&self, name: &str) -> crate::eval::dataset::ValidationReport {
        self.loader.validate(name)
    }

    /// Run one evaluation
    pub async fn evaluate(
        &self,
        adapter: Arc<dyn RetrievalAdapter>,
        request: &EvaluationRequest,
    ) -> Result<EvaluationResponse> {
        if request.k_values.is_empty() {
            return Err(Error::validation("k_values must not be empty"));
        }
        if request.k_values.iter().any(|&k| k == 0) {
            return Err(Error::validation("every k must be >= 1"));
        }

        let report = self.loader.validate(&request.dataset_name);
        if report.is_fatal() {
            return Err(Error::validation(format!(
                "dataset '{}' failed validation: {}",
                request.dataset_name,
                report.format_errors.join("; ")
            )));
        }
        for finding in &report.consistency_errors {
            warn!(dataset = %request.dataset_name, finding, "dataset consistency warning");
        }

        let (questions, _metadata) = self.loader.load(&request.dataset_name)?;
        let k_max = request.k_values.iter().copied().max().unwrap_or(1);
        let metric_kinds: Vec<MetricKind> = if request.metrics.is_empty() {
            MetricKind::all().to_vec()
        } else {
            request.metrics.clone()
        };

        info!(
            dataset = %request.dataset_name,
            adapter = adapter.adapter_name(),
            questions = questions.len(),
            "evaluation started"
        );
        let started = Instant::now();

        let outcomes = self
            .collect_outcomes(adapter.clone(), &questions, k_max, request.options)
            .await;
        let failed_questions = outcomes.iter().filter(|o| o.failed).count();

        let mut metrics = BTreeMap::new();
        for kind in &metric_kinds {
            let mut per_k = BTreeMap::new();
            for &k in &request.k_values {
                let mut sum = 0.0;
                for outcome in &outcomes {
                    // A question with unusable ground truth scores 0 rather
                    // than poisoning the whole run.
                    sum += compute(*kind, &outcome.predictions, &outcome.ground_truth, k)
                        .unwrap_or(0.0);
                }
                let average = if outcomes.is_empty() {
                    0.0
                } else {
                    sum / outcomes.len() as f64
                };
                per_k.insert(k.to_string(), (average * 10_000.0).round() / 10_000.0);
            }
            metrics.insert(kind.name().to_string(), per_k);
        }

        let wall_time_ms = started.elapsed().as_millis() as u64;
        let response = EvaluationResponse {
            dataset_name: request.dataset_name.clone(),
            system_name: adapter.adapter_name().to_string(),
            metrics,
            wall_time_ms,
            question_count: questions.len(),
            failed_questions,
            k_values: request.k_values.clone(),
        };

        if request.save_results {
            self.append_run_record(&response, request);
        }

        info!(
            dataset = %request.dataset_name,
            wall_time_ms,
            failed = failed_questions,
            "evaluation finished"
        );
        Ok(response)
    }

    async fn collect_outcomes(
        &self,
        adapter: Arc<dyn RetrievalAdapter>,
        questions: &[EvaluationQuestion],
        k_max: usize,
        options: EvaluationOptions,
    ) -> Vec<QuestionOutcome> {
        if self.concurrency <= 1 {
            let mut outcomes = Vec::with_capacity(questions.len());
            for question in questions {
                outcomes.push(Self::process_question(&*adapter, question, k_max, options).await);
            }
            return outcomes;
        }

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let futures = questions.iter().map(|question| {
            let adapter = adapter.clone();
            let semaphore = semaphore.clone();
            async move {
                let _permit = semaphore.acquire().await.expect("semaphore never closed");
                Self::process_question(&*adapter, question, k_max, options).await
            }
        });
        futures::future::join_all(futures).await
    }

    async fn process_question(
        adapter: &dyn RetrievalAdapter,
        question: &EvaluationQuestion,
        k_max: usize,
        options: EvaluationOptions,
    ) -> QuestionOutcome {
        let retrieved = match adapter.retrieve(&question.question, k_max).await {
            Ok(results) => results,
            Err(err) => {
                warn!(question = %question.question, %err, "question retrieval failed");
                return QuestionOutcome {
                    predictions: Vec::new(),
                    ground_truth: Self::ground_truth(question, options),
                    failed: true,
                };
            }
        };

        let predictions = retrieved
            .iter()
            .map(|result| {
                if options.convert_filepath_to_classpath {
                    normalize_prediction(
                        result.file_path.as_deref(),
                        &result.content,
                        options.ignore_method_names,
                    )
                } else {
                    result.content.clone()
                }
            })
            .collect();

        QuestionOutcome {
            predictions,
            ground_truth: Self::ground_truth(question, options),
            failed: false,
        }
    }

    fn ground_truth(question: &EvaluationQuestion, options: EvaluationOptions) -> Vec<String> {
        if options.convert_filepath_to_classpath {
            question
                .answer
                .iter()
                .map(|entry| normalize_ground_truth(entry, options.ignore_method_names))
                .collect()
        } else {
            question.answer.clone()
        }
    }

    fn append_run_record(&self, response: &EvaluationResponse, request: &EvaluationRequest) {
        let Some(run_log) = &self.run_log else {
            return;
        };
        let record = RunRecord {
            run_id: Uuid::new_v4().to_string(),
            adapter_name: response.system_name.clone(),
            dataset: response.dataset_name.clone(),
            config: json!({
                "k_values": request.k_values,
                "metrics": request.metrics,
                "options": request.options,
                "question_count": response.question_count,
            }),
            metrics: response.metrics.clone(),
            duration_ms: response.wall_time_ms,
            timestamp: chrono::Utc::now(),
        };
        // A failed append must not fail the evaluation itself
        if let Err(err) = run_log.append(&record) {
            warn!(%err, "run record append failed");
        }
    }
}
