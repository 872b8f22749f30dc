//! Layered application configuration
//!
//! Values resolve in three layers: compiled defaults, an optional TOML file,
//! then `CODERAG_*` environment variables (double underscore separates
//! sections, e.g. `CODERAG_EMBEDDING__BASE_URL`). Paths accept `~` and
//! environment expansion.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::error::Result;

/// HTTP server binding
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host
    pub host: String,
    /// Bind port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Embedding service connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Service base URL
    pub base_url: String,
    /// Vector dimension the service produces
    pub dimensions: usize,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Retry attempts for transport errors and 5xx
    pub max_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            dimensions: 384,
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

/// Vector store connection and collection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    /// Store base URL (Qdrant-protocol REST)
    pub url: String,
    /// Collection name
    pub collection: String,
    /// Vector dimension for the collection
    pub dimension: usize,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6333".to_string(),
            collection: "code_chunks".to_string(),
            dimension: 384,
            timeout_secs: 30,
        }
    }
}

/// BM25 index tuning and location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Bm25Config {
    /// Index directory
    pub index_path: String,
    /// Term-frequency saturation
    pub k1: f32,
    /// Length normalization
    pub b: f32,
    /// Apply stemming during tokenization
    pub use_stemming: bool,
}

impl Default for Bm25Config {
    fn default() -> Self {
        Self {
            index_path: "data/bm25_index".to_string(),
            k1: 1.2,
            b: 0.75,
            use_stemming: true,
        }
    }
}

impl Bm25Config {
    /// Index path with `~` and environment variables expanded
    pub fn expanded_index_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::full(&self.index_path).map_or_else(
            |_| self.index_path.clone(),
            |expanded| expanded.into_owned(),
        ))
    }
}

/// Hybrid retrieval defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Weighted-sum vector weight
    pub vector_weight: f32,
    /// Weighted-sum BM25 weight
    pub bm25_weight: f32,
    /// Use reciprocal-rank fusion by default
    pub use_rrf: bool,
    /// RRF rank constant
    pub rrf_k: u32,
    /// Per-leg over-fetch floor
    pub max_results: usize,
    /// Shared deadline for both legs, in seconds
    pub deadline_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            vector_weight: 0.7,
            bm25_weight: 0.3,
            use_rrf: true,
            rrf_k: 60,
            max_results: 50,
            deadline_secs: 30,
        }
    }
}

impl RetrievalConfig {
    /// Deadline as a [`Duration`]
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

/// Evaluation pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Directory containing dataset subdirectories
    pub dataset_root: String,
    /// Append-only run-log path; `None` disables run records
    pub run_log_path: Option<String>,
    /// Bounded question parallelism; 1 = sequential
    pub concurrency: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            dataset_root: "data/datasets".to_string(),
            run_log_path: None,
            concurrency: 1,
        }
    }
}

impl EvaluationConfig {
    /// Dataset root with `~` and environment variables expanded
    pub fn expanded_dataset_root(&self) -> PathBuf {
        PathBuf::from(shellexpand::full(&self.dataset_root).map_or_else(
            |_| self.dataset_root.clone(),
            |expanded| expanded.into_owned(),
        ))
    }
}

/// Top-level application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP server binding
    pub server: ServerConfig,
    /// Embedding service connection
    pub embedding: EmbeddingConfig,
    /// Vector store connection
    pub vector_store: VectorStoreConfig,
    /// BM25 index settings
    pub bm25: Bm25Config,
    /// Hybrid retrieval defaults
    pub retrieval: RetrievalConfig,
    /// Evaluation pipeline settings
    pub evaluation: EvaluationConfig,
}

impl AppConfig {
    /// Load configuration: defaults, then an optional file, then environment
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix("CODERAG")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_complete() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.retrieval.vector_weight, 0.7);
        assert_eq!(cfg.retrieval.rrf_k, 60);
        assert_eq!(cfg.bm25.k1, 1.2);
        assert_eq!(cfg.vector_store.collection, "code_chunks");
        assert_eq!(cfg.evaluation.concurrency, 1);
    }

    #[test]
    fn load_without_file_uses_defaults() {
        let cfg = AppConfig::load(None).unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.embedding.dimensions, 384);
    }
}
