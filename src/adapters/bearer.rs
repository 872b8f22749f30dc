//! Bearer-token authenticated retrieval adapter
//!
//! Talks to backends with a two-endpoint contract: a form-encoded auth
//! endpoint issuing `{access_token, token_type}` and a retrieval endpoint
//! expecting `Authorization: <token_type> <access_token>`.
//!
//! Token lifecycle: the first retrieve obtains a token lazily; a 401 on the
//! retrieval call discards the token, re-authenticates exactly once, and
//! retries the call once. Re-authentication is serialized behind a mutex,
//! so concurrent 401s result in a single re-auth in flight — later waiters
//! find a fresh token and skip their own attempt.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::domain::error::{Error, Result};
use crate::domain::ports::RetrievalAdapter;
use crate::domain::types::{RetrievalResult, RetrievalSource};
use crate::infrastructure::http::{build_client, send_with_retry, RetryPolicy};

/// Backend-specific source-root prefix for bare `.java` file names
const CONTROLLER_PATH_PREFIX: &str = "src/main/java/com/skax/library/controller/";

/// Configuration for [`BearerAuthAdapter`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BearerAdapterConfig {
    /// Adapter name for logs and run records
    pub name: String,
    /// Backend base URL
    pub base_url: String,
    /// Auth username
    pub username: String,
    /// Auth password
    pub password: String,
    /// Repository filter ids sent with every retrieval; legacy default `[28]`
    #[serde(default = "default_filter_ids")]
    pub filter_ids: Vec<i64>,
    /// Similarity threshold sent with every retrieval; legacy default `0.8`
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retry attempts on transport errors and 5xx
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Prepend the backend-specific controller source root to bare `.java`
    /// file names; off by default because it only holds for one known backend
    #[serde(default)]
    pub assume_controller_path: bool,
}

fn default_filter_ids() -> Vec<i64> {
    vec![28]
}

fn default_threshold() -> f32 {
    0.8
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    access_token: String,
    token_type: String,
}

#[derive(Deserialize)]
struct AuthResponse {
    #[serde(rename = "statusCode")]
    status_code: i64,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    content: Option<AuthContent>,
}

#[derive(Deserialize)]
struct AuthContent {
    #[serde(default)]
    user_name: Option<String>,
}

/// Bearer-auth HTTP retrieval backend
#[derive(Debug)]
pub struct BearerAuthAdapter {
    config: BearerAdapterConfig,
    client: reqwest::Client,
    retry: RetryPolicy,
    token: Mutex<Option<Token>>,
}

impl BearerAuthAdapter {
    /// Build the adapter; the token is obtained lazily on first use
    pub fn new(config: BearerAdapterConfig) -> Result<Self> {
        let client = build_client(Duration::from_secs(config.timeout_secs))?;
        let retry = RetryPolicy::with_attempts(config.max_retries.max(1));
        Ok(Self {
            config,
            client,
            retry,
            token: Mutex::new(None),
        })
    }

    fn auth_url(&self) -> String {
        format!("{}/auth/v1/token", self.config.base_url.trim_end_matches('/'))
    }

    fn retrieval_url(&self) -> String {
        format!(
            "{}/project/v1/repo/retrieval",
            self.config.base_url.trim_end_matches('/')
        )
    }

    async fn authenticate(&self) -> Result<Token> {
        let response = send_with_retry(
            || {
                self.client.post(self.auth_url()).form(&[
                    ("username", self.config.username.as_str()),
                    ("password", self.config.password.as_str()),
                ])
            },
            &self.retry,
            &self.config.name,
        )
        .await?;

        if !response.status().is_success() {
            return Err(Error::auth(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }

        let parsed: AuthResponse = response
            .json()
            .await
            .map_err(|e| Error::auth(format!("malformed auth response: {e}")))?;
        if parsed.status_code != 200 {
            return Err(Error::auth(format!(
                "auth rejected with statusCode {}",
                parsed.status_code
            )));
        }
        let access_token = parsed
            .access_token
            .ok_or_else(|| Error::auth("auth response carried no access_token"))?;
        let token_type = parsed.token_type.unwrap_or_else(|| "bearer".to_string());

        if let Some(user) = parsed.content.and_then(|c| c.user_name) {
            info!(adapter = %self.config.name, %user, "authenticated");
        }
        Ok(Token {
            access_token,
            token_type,
        })
    }

    /// Get the current token, authenticating if none is held
    async fn current_token(&self) -> Result<Token> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref() {
            return Ok(token.clone());
        }
        let token = self.authenticate().await?;
        *guard = Some(token.clone());
        Ok(token)
    }

    /// Replace a stale token, re-authenticating at most once per storm
    ///
    /// If another caller already refreshed the token while we waited on the
    /// lock, reuse theirs instead of hitting the auth endpoint again.
    async fn refresh_token(&self, stale: &Token) -> Result<Token> {
        let mut guard = self.token.lock().await;
        if let Some(current) = guard.as_ref() {
            if current != stale {
                return Ok(current.clone());
            }
        }
        let token = self.authenticate().await?;
        *guard = Some(token.clone());
        Ok(token)
    }

    async fn post_retrieval(&self, token: &Token, body: &Value) -> Result<reqwest::Response> {
        send_with_retry(
            || {
                self.client
                    .post(self.retrieval_url())
                    .header(
                        "Authorization",
                        format!("{} {}", token.token_type, token.access_token),
                    )
                    .json(body)
            },
            &self.retry,
            &self.config.name,
        )
        .await
    }

    fn map_file_path(&self, file_name: &str) -> Option<String> {
        if file_name.is_empty() {
            return None;
        }
        if file_name.contains('/') || file_name.contains('\\') {
            return Some(file_name.to_string());
        }
        if self.config.assume_controller_path && file_name.ends_with(".java") {
            return Some(format!("{CONTROLLER_PATH_PREFIX}{file_name}"));
        }
        Some(file_name.to_string())
    }

    fn map_results(&self, payload: &Value) -> Vec<RetrievalResult> {
        let Some(items) = payload.get("results").and_then(Value::as_array) else {
            return Vec::new();
        };
        items
            .iter()
            .enumerate()
            .map(|(rank0, item)| {
                let meta = item.get("meta").cloned().unwrap_or(Value::Null);
                let file_name = meta
                    .get("file_name")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                let doc_id = meta.get("doc_id").and_then(Value::as_str);
                let id = doc_id
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("{}-{}", self.config.name, rank0 + 1));
                RetrievalResult {
                    id,
                    content: item
                        .get("content")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    score: item
                        .get("score")
                        .and_then(Value::as_f64)
                        .unwrap_or(0.0)
                        .max(0.0) as f32,
                    source: RetrievalSource::Hybrid,
                    metadata: json!({
                        "source": self.config.name,
                        "file_name": file_name,
                        "doc_id": doc_id,
                        "repo_id": item.get("repo_id"),
                        "repo_name": item.get("repo_name"),
                    }),
                    file_path: self.map_file_path(file_name),
                }
            })
            .collect()
    }
}

#[async_trait]
impl RetrievalAdapter for BearerAuthAdapter {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievalResult>> {
        if query.trim().is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let body = json!({
            "ids": self.config.filter_ids,
            "payload": {
                "k": k,
                "query": query,
                "threshold": self.config.threshold,
            },
        });

        let token = self.current_token().await?;
        let mut response = self.post_retrieval(&token, &body).await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            warn!(adapter = %self.config.name, "401 from retrieval endpoint, re-authenticating once");
            let fresh = self.refresh_token(&token).await?;
            response = self.post_retrieval(&fresh, &body).await?;
            if response.status() == reqwest::StatusCode::UNAUTHORIZED {
                return Err(Error::auth(
                    "retrieval still unauthorized after re-authentication",
                ));
            }
        }

        if !response.status().is_success() {
            return Err(Error::dependency_unavailable(
                &self.config.name,
                format!("retrieval endpoint returned {}", response.status()),
            ));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| Error::dependency_unavailable(&self.config.name, e.to_string()))?;
        if !payload
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(false)
        {
            warn!(adapter = %self.config.name, "backend reported success=false");
            return Ok(Vec::new());
        }

        let results = self.map_results(&payload);
        debug!(adapter = %self.config.name, count = results.len(), "bearer adapter retrieved");
        Ok(results)
    }

    async fn health_check(&self) -> bool {
        self.retrieve("health check", 1).await.is_ok()
    }

    async fn close(&self) {
        // Drop the token; the connection pool tears down with the client
        *self.token.lock().await = None;
    }

    fn adapter_name(&self) -> &str {
        &self.config.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(assume: bool) -> BearerAdapterConfig {
        BearerAdapterConfig {
            name: "bearer".to_string(),
            base_url: "http://unused".to_string(),
            username: "u".to_string(),
            password: "p".to_string(),
            filter_ids: default_filter_ids(),
            threshold: default_threshold(),
            timeout_secs: 5,
            max_retries: 1,
            assume_controller_path: assume,
        }
    }

    #[test]
    fn file_path_mapping_respects_separators() {
        let adapter = BearerAuthAdapter::new(config(false)).unwrap();
        assert_eq!(
            adapter.map_file_path("src/main/java/A.java").as_deref(),
            Some("src/main/java/A.java")
        );
        // Bare names stay bare unless the backend-specific option is on
        assert_eq!(
            adapter.map_file_path("BookController.java").as_deref(),
            Some("BookController.java")
        );
        assert_eq!(adapter.map_file_path(""), None);
    }

    #[test]
    fn bare_java_names_get_prefixed_when_opted_in() {
        let adapter = BearerAuthAdapter::new(config(true)).unwrap();
        assert_eq!(
            adapter.map_file_path("BookController.java").as_deref(),
            Some("src/main/java/com/skax/library/controller/BookController.java")
        );
        // Non-java bare names are never rewritten
        assert_eq!(
            adapter.map_file_path("notes.txt").as_deref(),
            Some("notes.txt")
        );
    }

    #[test]
    fn legacy_defaults_are_preserved() {
        let cfg: BearerAdapterConfig = serde_json::from_value(json!({
            "name": "legacy",
            "base_url": "http://backend",
            "username": "u",
            "password": "p",
        }))
        .unwrap();
        assert_eq!(cfg.filter_ids, vec![28]);
        assert_eq!(cfg.threshold, 0.8);
        assert!(!cfg.assume_controller_path);
    }
}
