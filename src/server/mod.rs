//! Narrow HTTP surface
//!
//! Four routes cover the platform's externally visible operations:
//!
//! | Route | Operation |
//! |-------|-----------|
//! | `POST /search/retrieve` | Hybrid search with per-call fusion selection |
//! | `POST /index/upsert` | Enrich + embed + dual-index a chunk batch |
//! | `DELETE /index/by-filter` | Drop matching documents from both indices |
//! | `POST /evaluate` | Run the evaluation pipeline against an adapter |
//!
//! Status mapping: 400 validation, 404 missing dataset/collection, 422
//! malformed payload, 503 every downstream leg failed, 504 deadline with no
//! partial progress.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::adapters::{AdapterConfig, AdapterFactory};
use crate::domain::error::Error;
use crate::domain::types::{Chunk, ChunkMeta, Filter, FusedResult};
use crate::eval::{EvaluationRequest, EvaluationService};
use crate::index::bm25_index::Bm25Index;
use crate::retrieval::fusion::FusionMethod;
use crate::retrieval::hybrid::HybridRetriever;
use crate::services::IndexingService;

/// Shared handler state, built once in the composition root
#[derive(Clone)]
pub struct AppState {
    /// Hybrid retrieval core
    pub retriever: Arc<HybridRetriever>,
    /// Dual-index ingestion
    pub indexing: Arc<IndexingService>,
    /// BM25 index, for health and stats
    pub bm25_index: Arc<Bm25Index>,
    /// Evaluation pipeline
    pub evaluation: Arc<EvaluationService>,
    /// Adapter factory for evaluation requests
    pub adapter_factory: Arc<AdapterFactory>,
}

/// Build the router with all routes and tracing installed
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/search/retrieve", post(retrieve))
        .route("/index/upsert", post(upsert))
        .route("/index/by-filter", delete(delete_by_filter))
        .route("/evaluate", post(evaluate))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Validation { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Json { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Error::DependencyUnavailable { .. } | Error::Auth { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Error::DeadlineExceeded { .. } => StatusCode::GATEWAY_TIMEOUT,
            Error::Persistence { .. } | Error::Internal { .. } | Error::Io { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let stats = state.bm25_index.stats();
    Json(json!({
        "status": "ok",
        "bm25_documents": stats.total_documents,
    }))
}

#[derive(Deserialize)]
struct RetrieveRequest {
    query: String,
    #[serde(default = "default_k")]
    k: usize,
    #[serde(default)]
    fusion: Option<FusionMethod>,
    #[serde(default)]
    filters: Option<serde_json::Map<String, serde_json::Value>>,
}

fn default_k() -> usize {
    10
}

#[derive(Serialize)]
struct RetrieveResponse {
    results: Vec<FusedResult>,
    timings_ms: u64,
    vector_results_count: usize,
    bm25_results_count: usize,
    fusion_method: &'static str,
}

async fn retrieve(
    State(state): State<AppState>,
    Json(request): Json<RetrieveRequest>,
) -> Result<Json<RetrieveResponse>, ApiError> {
    let filter = request.filters.as_ref().map(Filter::from_object);
    let output = state
        .retriever
        .search(&request.query, request.k, request.fusion, filter.as_ref())
        .await?;
    Ok(Json(RetrieveResponse {
        results: output.results,
        timings_ms: output.elapsed_ms,
        vector_results_count: output.vector_results_count,
        bm25_results_count: output.bm25_results_count,
        fusion_method: output.fusion_method,
    }))
}

#[derive(Deserialize)]
struct UpsertRecord {
    #[serde(default)]
    id: Option<String>,
    content: String,
    metadata: ChunkMeta,
}

#[derive(Deserialize)]
struct UpsertRequest {
    records: Vec<UpsertRecord>,
}

async fn upsert(
    State(state): State<AppState>,
    Json(request): Json<UpsertRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let chunks: Vec<Chunk> = request
        .records
        .into_iter()
        .map(|record| match record.id {
            Some(id) => Chunk {
                id,
                content: record.content,
                metadata: record.metadata,
            },
            None => Chunk::new(record.content, record.metadata),
        })
        .collect();
    let outcome = state.indexing.index_chunks(chunks).await?;
    Ok(Json(json!({ "inserted": outcome.indexed, "ids": outcome.ids })))
}

#[derive(Deserialize)]
struct DeleteByFilterRequest {
    filter: serde_json::Map<String, serde_json::Value>,
}

async fn delete_by_filter(
    State(state): State<AppState>,
    Json(request): Json<DeleteByFilterRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if request.filter.is_empty() {
        return Err(ApiError(Error::validation("filter must not be empty")));
    }
    let filter = Filter::from_object(&request.filter);
    let (vector_deleted, bm25_deleted) = state.indexing.delete_by_filter(&filter).await?;
    Ok(Json(json!({
        "deleted": vector_deleted.max(bm25_deleted),
        "vector_deleted": vector_deleted,
        "bm25_deleted": bm25_deleted,
    })))
}

#[derive(Deserialize)]
struct EvaluateRequest {
    adapter_config: AdapterConfig,
    #[serde(flatten)]
    request: EvaluationRequest,
}

async fn evaluate(
    State(state): State<AppState>,
    Json(body): Json<EvaluateRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let adapter = state.adapter_factory.build(&body.adapter_config)?;
    let response = state.evaluation.evaluate(adapter.clone(), &body.request).await;
    adapter.close().await;
    let response = response?;
    Ok(Json(serde_json::to_value(&response).map_err(Error::from)?))
}
