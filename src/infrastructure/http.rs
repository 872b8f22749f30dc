//! Shared HTTP client construction and retry policy
//!
//! All outbound HTTP in the platform goes through [`send_with_retry`]:
//! transport errors and 5xx responses are retried with exponential backoff,
//! 4xx responses are returned to the caller untouched. The single
//! 401-triggered re-authentication in the bearer adapter is layered on top
//! of this and is deliberately NOT a retry concern.

use std::time::Duration;

use tracing::warn;

use crate::domain::error::{Error, Result};

/// Retry policy for outbound HTTP calls
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    /// Delay before the first retry; doubles each attempt
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Policy with a given attempt budget and the default initial delay
    pub fn with_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }
}

/// Build a pooled client with a bounded request timeout
pub fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::internal(format!("http client construction: {e}")))
}

/// Send a request with retry on transport errors and 5xx responses only
///
/// `build` is called once per attempt so each retry gets a fresh request.
/// A 4xx response (including 401) is returned immediately; business errors
/// are never retried here.
pub async fn send_with_retry<F>(
    build: F,
    policy: &RetryPolicy,
    service: &str,
) -> Result<reqwest::Response>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut delay = policy.initial_delay;
    let attempts = policy.max_attempts.max(1);
    let mut last_error: Option<Error> = None;

    for attempt in 1..=attempts {
        match build().send().await {
            Ok(response) => {
                if response.status().is_server_error() {
                    last_error = Some(Error::dependency_unavailable(
                        service,
                        format!("server error {}", response.status()),
                    ));
                } else {
                    return Ok(response);
                }
            }
            Err(err) => {
                last_error = Some(Error::dependency_unavailable(service, err.to_string()));
            }
        }

        if attempt < attempts {
            warn!(service, attempt, delay_ms = delay.as_millis() as u64, "retrying request");
            tokio::time::sleep(delay).await;
            delay *= 2;
        }
    }

    Err(last_error
        .unwrap_or_else(|| Error::dependency_unavailable(service, "no attempts were made")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn retries_on_5xx_then_succeeds() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        // First attempt fails with 500, the second succeeds
        let hits = Arc::new(AtomicUsize::new(0));
        let handler_hits = hits.clone();
        let app = axum::Router::new().route(
            "/flaky",
            axum::routing::get(move || {
                let hits = handler_hits.clone();
                async move {
                    if hits.fetch_add(1, Ordering::SeqCst) == 0 {
                        axum::http::StatusCode::INTERNAL_SERVER_ERROR
                    } else {
                        axum::http::StatusCode::OK
                    }
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = build_client(Duration::from_secs(5)).unwrap();
        let url = format!("http://{addr}/flaky");
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
        };
        let response = send_with_retry(|| client.get(&url), &policy, "test")
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn does_not_retry_4xx() {
        let mut server = mockito::Server::new_async().await;
        let not_found = server
            .mock("GET", "/missing")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let client = build_client(Duration::from_secs(5)).unwrap();
        let url = format!("{}/missing", server.url());
        let response = send_with_retry(|| client.get(&url), &RetryPolicy::default(), "test")
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 404);
        not_found.assert_async().await;
    }

    #[tokio::test]
    async fn exhausts_attempts_on_persistent_5xx() {
        let mut server = mockito::Server::new_async().await;
        let broken = server
            .mock("GET", "/down")
            .with_status(503)
            .expect(2)
            .create_async()
            .await;

        let client = build_client(Duration::from_secs(5)).unwrap();
        let url = format!("{}/down", server.url());
        let policy = RetryPolicy {
            max_attempts: 2,
            initial_delay: Duration::from_millis(1),
        };
        let err = send_with_retry(|| client.get(&url), &policy, "test")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DependencyUnavailable { .. }));
        broken.assert_async().await;
    }
}
