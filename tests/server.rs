//! HTTP surface integration over the in-memory stack

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use coderag::adapters::AdapterFactory;
use coderag::builder::DocumentBuilder;
use coderag::domain::ports::{DistanceMetric, EmbeddingProvider, VectorStoreProvider};
use coderag::eval::{DatasetLoader, EvaluationService};
use coderag::index::bm25_index::{Bm25Index, Bm25IndexConfig};
use coderag::index::vector::{VectorIndex, VectorIndexConfig};
use coderag::providers::embedding::NullEmbeddingProvider;
use coderag::providers::vector_store::InMemoryVectorStoreProvider;
use coderag::retrieval::hybrid::{HybridRetriever, HybridRetrieverConfig};
use coderag::server::{router, AppState};
use coderag::services::IndexingService;
use serde_json::{json, Value};
use tower::ServiceExt;

const DIM: usize = 32;

async fn test_app(tmp: &std::path::Path) -> axum::Router {
    let embedding: Arc<dyn EmbeddingProvider> = Arc::new(NullEmbeddingProvider::new(DIM));
    let store: Arc<dyn VectorStoreProvider> = Arc::new(InMemoryVectorStoreProvider::new());
    store
        .ensure_collection("code_chunks", DIM, DistanceMetric::Cosine)
        .await
        .unwrap();
    let vector_index = Arc::new(VectorIndex::new(
        store,
        VectorIndexConfig {
            dimension: DIM,
            ..VectorIndexConfig::default()
        },
    ));
    let bm25_index = Arc::new(
        Bm25Index::open(Bm25IndexConfig {
            index_path: tmp.join("bm25"),
            ..Bm25IndexConfig::default()
        })
        .unwrap(),
    );
    let retriever = Arc::new(HybridRetriever::new(
        embedding.clone(),
        vector_index.clone(),
        bm25_index.clone(),
        HybridRetrieverConfig::default(),
    ));
    let indexing = Arc::new(IndexingService::new(
        DocumentBuilder::default(),
        embedding,
        vector_index,
        bm25_index.clone(),
    ));

    // Seed one dataset for the /evaluate route
    let datasets = tmp.join("datasets");
    std::fs::create_dir_all(datasets.join("smoke")).unwrap();
    std::fs::write(
        datasets.join("smoke/metadata.json"),
        json!({"name": "smoke", "format": "jsonl", "question_count": 1}).to_string(),
    )
    .unwrap();
    std::fs::write(
        datasets.join("smoke/queries.jsonl"),
        "{\"question\": \"anything\", \"answer\": \"com.acme.A\", \"difficulty\": \"easy\"}\n",
    )
    .unwrap();

    let state = AppState {
        retriever: retriever.clone(),
        indexing,
        bm25_index,
        evaluation: Arc::new(EvaluationService::new(DatasetLoader::new(datasets))),
        adapter_factory: Arc::new(AdapterFactory::with_retriever(retriever)),
    };
    router(state)
}

async fn send(app: &axum::Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

fn chunk_record(name: &str, file: &str) -> Value {
    json!({
        "content": format!("public void {name}() {{ registry.invoke(); }}"),
        "metadata": {
            "file_path": format!("src/main/java/com/acme/{file}"),
            "language": "java",
            "code_type": "method",
            "name": name,
            "line_start": 1,
            "line_end": 5,
        },
    })
}

#[tokio::test]
async fn upsert_then_retrieve_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    let app = test_app(tmp.path()).await;

    let (status, body) = send(
        &app,
        "POST",
        "/index/upsert",
        json!({"records": [chunk_record("registerUser", "Users.java"),
                            chunk_record("deleteUser", "Users.java")]}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["inserted"], 2);

    let (status, body) = send(
        &app,
        "POST",
        "/search/retrieve",
        json!({"query": "register user", "k": 5}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["results"].as_array().map(|a| !a.is_empty()).unwrap_or(false));
    assert!(body["timings_ms"].is_number());
    assert_eq!(body["fusion_method"], "rrf");
}

#[tokio::test]
async fn delete_by_filter_removes_from_both_indices() {
    let tmp = tempfile::tempdir().unwrap();
    let app = test_app(tmp.path()).await;

    send(
        &app,
        "POST",
        "/index/upsert",
        json!({"records": [chunk_record("keepMe", "Kept.java"),
                            chunk_record("dropMe", "Doomed.java")]}),
    )
    .await;

    let (status, body) = send(
        &app,
        "DELETE",
        "/index/by-filter",
        json!({"filter": {"file_path": "src/main/java/com/acme/Doomed.java"}}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], 1);
    assert_eq!(body["vector_deleted"], 1);
    assert_eq!(body["bm25_deleted"], 1);

    let (_, body) = send(
        &app,
        "POST",
        "/search/retrieve",
        json!({"query": "dropMe registry", "k": 5,
               "filters": {"file_path": "src/main/java/com/acme/Doomed.java"}}),
    )
    .await;
    assert_eq!(body["results"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn empty_filter_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let app = test_app(tmp.path()).await;
    let (status, _) = send(&app, "DELETE", "/index/by-filter", json!({"filter": {}})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn evaluate_route_runs_the_mock_adapter() {
    let tmp = tempfile::tempdir().unwrap();
    let app = test_app(tmp.path()).await;

    let (status, body) = send(
        &app,
        "POST",
        "/evaluate",
        json!({
            "adapter_config": {"type": "mock"},
            "dataset_name": "smoke",
            "k_values": [1, 5],
            "metrics": ["hit", "precision"],
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["question_count"], 1);
    assert!(body["metrics"]["hit"]["5"].is_number());
    assert!(body["wall_time_ms"].is_number());
}

#[tokio::test]
async fn missing_dataset_maps_to_404() {
    let tmp = tempfile::tempdir().unwrap();
    let app = test_app(tmp.path()).await;
    let (status, _) = send(
        &app,
        "POST",
        "/evaluate",
        json!({
            "adapter_config": {"type": "mock"},
            "dataset_name": "no-such-dataset",
            "k_values": [1],
        }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_reports_document_count() {
    let tmp = tempfile::tempdir().unwrap();
    let app = test_app(tmp.path()).await;
    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
