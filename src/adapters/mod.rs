//! RAG-adapter layer: a closed union of backend variants behind one contract
//!
//! Every backend the platform can retrieve from is one variant of
//! [`AdapterConfig`]; the [`AdapterFactory`] switches on that discriminant
//! and hands back a boxed [`RetrievalAdapter`]. There is no runtime
//! registry of subclasses — the union is closed at compile time, and the
//! one extension point is [`AdapterFactory::register`], which installs a
//! builder for a named custom variant at program start.
//!
//! ## Variants
//!
//! | Variant | Backend |
//! |---------|---------|
//! | `mock` | In-process deterministic synthesizer |
//! | `http` | Generic single-endpoint HTTP backend with configurable shapes |
//! | `bearer_http` | Two-endpoint backend with bearer auth and 401 re-auth |
//! | `hybrid_local` | The in-process hybrid retrieval core |
//! | `vector_only` / `bm25_only` | Single-leg ablation adapters |
//! | `custom` | A variant installed via [`AdapterFactory::register`] |

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::error::{Error, Result};
use crate::domain::ports::RetrievalAdapter;
use crate::retrieval::fusion::FusionMethod;
use crate::retrieval::hybrid::HybridRetriever;

/// Bearer-auth HTTP adapter
pub mod bearer;
/// Generic HTTP adapter
pub mod http;
/// In-process adapters over the retrieval core
pub mod local;
/// Deterministic mock adapter
pub mod mock;

pub use bearer::{BearerAdapterConfig, BearerAuthAdapter};
pub use http::{GenericHttpAdapter, HttpAdapterConfig, RequestFormat, ResponseFormat};
pub use local::{Bm25OnlyAdapter, HybridLocalAdapter, VectorOnlyAdapter};
pub use mock::MockAdapter;

/// Closed union of adapter variants, switched on by the factory
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AdapterConfig {
    /// Deterministic in-process synthesizer
    Mock {
        /// Adapter name
        #[serde(default = "default_mock_name")]
        name: String,
    },
    /// Generic HTTP backend
    Http(HttpAdapterConfig),
    /// Bearer-auth HTTP backend
    BearerHttp(BearerAdapterConfig),
    /// In-process hybrid retrieval core
    HybridLocal {
        /// Adapter name
        #[serde(default = "default_hybrid_name")]
        name: String,
        /// Per-adapter fusion override
        #[serde(default)]
        fusion: Option<FusionMethod>,
    },
    /// Vector leg only
    VectorOnly {
        /// Adapter name
        #[serde(default = "default_vector_name")]
        name: String,
    },
    /// BM25 leg only
    Bm25Only {
        /// Adapter name
        #[serde(default = "default_bm25_name")]
        name: String,
    },
    /// Variant installed at program start via [`AdapterFactory::register`]
    Custom {
        /// Registered builder kind
        kind: String,
        /// Adapter name
        name: String,
        /// Builder-specific parameters
        #[serde(default)]
        params: serde_json::Value,
    },
}

fn default_mock_name() -> String {
    "mock".to_string()
}

fn default_hybrid_name() -> String {
    "hybrid_local".to_string()
}

fn default_vector_name() -> String {
    "vector_only".to_string()
}

fn default_bm25_name() -> String {
    "bm25_only".to_string()
}

impl AdapterConfig {
    /// The adapter name this configuration will produce
    pub fn name(&self) -> &str {
        match self {
            AdapterConfig::Mock { name } => name,
            AdapterConfig::Http(config) => &config.name,
            AdapterConfig::BearerHttp(config) => &config.name,
            AdapterConfig::HybridLocal { name, .. } => name,
            AdapterConfig::VectorOnly { name } => name,
            AdapterConfig::Bm25Only { name } => name,
            AdapterConfig::Custom { name, .. } => name,
        }
    }
}

/// Builder signature for custom adapter variants
pub type AdapterBuilder =
    Arc<dyn Fn(&str, &serde_json::Value) -> Result<Arc<dyn RetrievalAdapter>> + Send + Sync>;

/// Builds adapters from configuration
///
/// The local variants need the in-process retrieval core; it is injected at
/// construction rather than discovered through any global.
pub struct AdapterFactory {
    retriever: Option<Arc<HybridRetriever>>,
    custom: HashMap<String, AdapterBuilder>,
}

impl AdapterFactory {
    /// Factory without a local retrieval core; local variants will error
    pub fn new() -> Self {
        Self {
            retriever: None,
            custom: HashMap::new(),
        }
    }

    /// Factory with the in-process retrieval core available
    pub fn with_retriever(retriever: Arc<HybridRetriever>) -> Self {
        Self {
            retriever: Some(retriever),
            custom: HashMap::new(),
        }
    }

    /// Install a builder for a custom variant; call at program start
    pub fn register(&mut self, kind: impl Into<String>, builder: AdapterBuilder) {
        self.custom.insert(kind.into(), builder);
    }

    /// Build an adapter for the given configuration
    pub fn build(&self, config: &AdapterConfig) -> Result<Arc<dyn RetrievalAdapter>> {
        match config {
            AdapterConfig::Mock { name } => Ok(Arc::new(MockAdapter::new(name.clone()))),
            AdapterConfig::Http(http_config) => {
                Ok(Arc::new(GenericHttpAdapter::new(http_config.clone())?))
            }
            AdapterConfig::BearerHttp(bearer_config) => {
                Ok(Arc::new(BearerAuthAdapter::new(bearer_config.clone())?))
            }
            AdapterConfig::HybridLocal { name, fusion } => {
                let retriever = self.require_retriever()?;
                Ok(Arc::new(HybridLocalAdapter::new(
                    name.clone(),
                    retriever,
                    *fusion,
                )))
            }
            AdapterConfig::VectorOnly { name } => {
                let retriever = self.require_retriever()?;
                Ok(Arc::new(VectorOnlyAdapter::new(name.clone(), retriever)))
            }
            AdapterConfig::Bm25Only { name } => {
                let retriever = self.require_retriever()?;
                Ok(Arc::new(Bm25OnlyAdapter::new(name.clone(), retriever)))
            }
            AdapterConfig::Custom { kind, name, params } => {
                let builder = self.custom.get(kind).ok_or_else(|| {
                    Error::validation(format!("no adapter builder registered for kind '{kind}'"))
                })?;
                builder(name, params)
            }
        }
    }

    fn require_retriever(&self) -> Result<Arc<HybridRetriever>> {
        self.retriever.clone().ok_or_else(|| {
            Error::validation("local adapter variants need the in-process retrieval core")
        })
    }
}

impl Default for AdapterFactory {
    fn default() -> Self {
        Self::new()
    }
}
