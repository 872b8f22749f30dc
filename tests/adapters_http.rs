//! HTTP adapter integration against a mock backend

use std::collections::BTreeMap;

use coderag::adapters::{
    BearerAdapterConfig, BearerAuthAdapter, GenericHttpAdapter, HttpAdapterConfig, RequestFormat,
    ResponseFormat,
};
use coderag::domain::error::Error;
use coderag::domain::ports::RetrievalAdapter;
use serde_json::json;

fn bearer_config(base_url: String) -> BearerAdapterConfig {
    serde_json::from_value(json!({
        "name": "bearer-test",
        "base_url": base_url,
        "username": "user",
        "password": "secret",
        "timeout_secs": 5,
        "max_retries": 1,
    }))
    .unwrap()
}

fn auth_body(token: &str) -> String {
    json!({
        "statusCode": 200,
        "access_token": token,
        "token_type": "bearer",
        "content": {"user_name": "user"},
    })
    .to_string()
}

fn retrieval_body() -> String {
    json!({
        "success": true,
        "results": [
            {
                "content": "public class BookController {}",
                "score": 0.91,
                "repo_id": 28,
                "repo_name": "library",
                "meta": {"file_name": "src/main/java/com/skax/library/controller/BookController.java", "doc_id": "d-1"},
            },
        ],
    })
    .to_string()
}

#[tokio::test]
async fn lazy_auth_happens_once_across_calls() {
    let mut server = mockito::Server::new_async().await;
    let auth = server
        .mock("POST", "/auth/v1/token")
        .with_status(200)
        .with_body(auth_body("T0"))
        .expect(1)
        .create_async()
        .await;
    let retrieval = server
        .mock("POST", "/project/v1/repo/retrieval")
        .match_header("Authorization", "bearer T0")
        .with_status(200)
        .with_body(retrieval_body())
        .expect(2)
        .create_async()
        .await;

    let adapter = BearerAuthAdapter::new(bearer_config(server.url())).unwrap();
    let first = adapter.retrieve("find the book controller", 5).await.unwrap();
    let second = adapter.retrieve("again", 5).await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert_eq!(first[0].id, "d-1");
    assert_eq!(
        first[0].file_path.as_deref(),
        Some("src/main/java/com/skax/library/controller/BookController.java")
    );

    auth.assert_async().await;
    retrieval.assert_async().await;
}

/// Counter-backed backend: the auth endpoint issues `T0`, `T1`, ... in
/// sequence, and the retrieval endpoint only accepts the newest token.
/// Returns the base URL and the two hit counters `(auth, retrieval)`.
async fn stale_token_backend() -> (
    String,
    std::sync::Arc<std::sync::atomic::AtomicUsize>,
    std::sync::Arc<std::sync::atomic::AtomicUsize>,
) {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    let auth_hits = Arc::new(AtomicUsize::new(0));
    let retrieval_hits = Arc::new(AtomicUsize::new(0));

    let auth_counter = auth_hits.clone();
    let retrieval_counter = retrieval_hits.clone();
    let newest = Arc::new(AtomicUsize::new(0));
    let newest_for_auth = newest.clone();
    let newest_for_retrieval = newest.clone();

    let app = axum::Router::new()
        .route(
            "/auth/v1/token",
            axum::routing::post(move || {
                let n = auth_counter.fetch_add(1, Ordering::SeqCst);
                newest_for_auth.store(n, Ordering::SeqCst);
                async move {
                    axum::Json(serde_json::json!({
                        "statusCode": 200,
                        "access_token": format!("T{n}"),
                        "token_type": "bearer",
                        "content": {"user_name": "user"},
                    }))
                }
            }),
        )
        .route(
            "/project/v1/repo/retrieval",
            axum::routing::post(move |headers: axum::http::HeaderMap| {
                retrieval_counter.fetch_add(1, Ordering::SeqCst);
                let expected = format!("bearer T{}", newest_for_retrieval.load(Ordering::SeqCst));
                async move {
                    let presented = headers
                        .get("Authorization")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    if presented == expected {
                        (
                            axum::http::StatusCode::OK,
                            axum::Json(serde_json::json!({
                                "success": true,
                                "results": [{
                                    "content": "public class BookController {}",
                                    "score": 0.91,
                                    "meta": {"file_name": "BookController.java", "doc_id": "d-1"},
                                }],
                            })),
                        )
                    } else {
                        (
                            axum::http::StatusCode::UNAUTHORIZED,
                            axum::Json(serde_json::json!({"detail": "token expired"})),
                        )
                    }
                }
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), auth_hits, retrieval_hits)
}

#[tokio::test]
async fn stale_token_triggers_exactly_one_reauth_and_one_retry() {
    use std::sync::atomic::Ordering;

    let (url, auth_hits, retrieval_hits) = stale_token_backend().await;
    let adapter = BearerAuthAdapter::new(bearer_config(url.clone())).unwrap();

    // Warm the token (T0), then invalidate it server-side by forcing a new
    // auth generation: the backend only accepts the newest token, so calling
    // retrieve twice exercises 401 -> re-auth -> retry on the second call.
    let first = adapter.retrieve("warm up", 5).await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(auth_hits.load(Ordering::SeqCst), 1);
    assert_eq!(retrieval_hits.load(Ordering::SeqCst), 1);

    // Expire T0: the backend's newest generation moves to T1 after this auth
    // call made directly by the test.
    reqwest::Client::new()
        .post(format!("{url}/auth/v1/token"))
        .form(&[("username", "x"), ("password", "y")])
        .send()
        .await
        .unwrap();
    assert_eq!(auth_hits.load(Ordering::SeqCst), 2);

    // The adapter still holds T0: 401, exactly one re-auth (T2), one retry
    let second = adapter.retrieve("stale token path", 5).await.unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(auth_hits.load(Ordering::SeqCst), 3);
    assert_eq!(retrieval_hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn persistent_401_surfaces_an_auth_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/auth/v1/token")
        .with_status(200)
        .with_body(auth_body("T"))
        .expect(2)
        .create_async()
        .await;
    server
        .mock("POST", "/project/v1/repo/retrieval")
        .with_status(401)
        .expect(2)
        .create_async()
        .await;

    let adapter = BearerAuthAdapter::new(bearer_config(server.url())).unwrap();
    let err = adapter.retrieve("never authorized", 5).await.unwrap_err();
    assert!(matches!(err, Error::Auth { .. }));
}

#[tokio::test]
async fn auth_rejection_is_an_auth_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/auth/v1/token")
        .with_status(200)
        .with_body(json!({"statusCode": 403}).to_string())
        .create_async()
        .await;

    let adapter = BearerAuthAdapter::new(bearer_config(server.url())).unwrap();
    let err = adapter.retrieve("q", 1).await.unwrap_err();
    assert!(matches!(err, Error::Auth { .. }));
}

#[tokio::test]
async fn backend_failure_response_maps_to_empty() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/auth/v1/token")
        .with_status(200)
        .with_body(auth_body("T"))
        .create_async()
        .await;
    server
        .mock("POST", "/project/v1/repo/retrieval")
        .with_status(200)
        .with_body(json!({"success": false, "results": []}).to_string())
        .create_async()
        .await;

    let adapter = BearerAuthAdapter::new(bearer_config(server.url())).unwrap();
    let results = adapter.retrieve("q", 3).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn generic_adapter_round_trips_a_configured_shape() {
    let mut server = mockito::Server::new_async().await;
    let endpoint = server
        .mock("POST", "/api/search")
        .match_body(mockito::Matcher::PartialJson(json!({
            "question": "how do I retry",
            "limit": 2,
            "collection": "code",
        })))
        .with_status(200)
        .with_body(
            json!({
                "data": {"hits": [
                    {"doc_id": "a", "text": "retry loop", "relevance": 0.9,
                     "meta": {"path": "src/main/java/com/acme/Retry.java"}},
                    {"doc_id": "b", "text": "backoff helper", "relevance": 0.7},
                ]}
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let config = HttpAdapterConfig {
        name: "custom-backend".to_string(),
        endpoint: format!("{}/api/search", server.url()),
        timeout_secs: 5,
        max_retries: 1,
        request_format: RequestFormat {
            query_field: "question".to_string(),
            k_field: "limit".to_string(),
            extras: BTreeMap::from([("collection".to_string(), json!("code"))]),
        },
        response_format: ResponseFormat {
            results_field: "data.hits".to_string(),
            content_field: "text".to_string(),
            score_field: "relevance".to_string(),
            filepath_field: "meta.path".to_string(),
            id_field: "doc_id".to_string(),
        },
        custom_headers: BTreeMap::new(),
    };
    let adapter = GenericHttpAdapter::new(config).unwrap();
    let results = adapter.retrieve("how do I retry", 2).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].id, "a");
    assert_eq!(
        results[0].file_path.as_deref(),
        Some("src/main/java/com/acme/Retry.java")
    );
    assert!(results[1].file_path.is_none());
    endpoint.assert_async().await;
}

#[tokio::test]
async fn generic_adapter_retries_5xx_then_succeeds() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    let hits = Arc::new(AtomicUsize::new(0));
    let handler_hits = hits.clone();
    let app = axum::Router::new().route(
        "/api/search",
        axum::routing::post(move || {
            let hits = handler_hits.clone();
            async move {
                if hits.fetch_add(1, Ordering::SeqCst) == 0 {
                    (
                        axum::http::StatusCode::BAD_GATEWAY,
                        axum::Json(json!({"error": "upstream hiccup"})),
                    )
                } else {
                    (
                        axum::http::StatusCode::OK,
                        axum::Json(json!({"results": [{"id": "x", "content": "c", "score": 1.0}]})),
                    )
                }
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let config = HttpAdapterConfig {
        name: "flaky".to_string(),
        endpoint: format!("http://{addr}/api/search"),
        timeout_secs: 5,
        max_retries: 3,
        request_format: RequestFormat::default(),
        response_format: ResponseFormat::default(),
        custom_headers: BTreeMap::new(),
    };
    let adapter = GenericHttpAdapter::new(config).unwrap();
    let results = adapter.retrieve("q", 1).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}
