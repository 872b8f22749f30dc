//! coderag - hybrid code retrieval and evaluation
//!
//! A retrieval platform for source-code corpora: queries fan out to a dense
//! vector index and a code-aware BM25 index in parallel, the two ranked
//! lists are fused (weighted sum or reciprocal-rank fusion), and a batch
//! evaluation pipeline measures retrieval quality against annotated
//! question/answer datasets.

/// RAG-adapter layer: pluggable retrieval backends
pub mod adapters;
/// Document builder: chunk enrichment before indexing
pub mod builder;
/// Core types, errors, and boundary ports
pub mod domain;
/// Evaluation pipeline
pub mod eval;
/// Tokenizer, BM25 index, and vector facade
pub mod index;
/// Configuration and shared HTTP plumbing
pub mod infrastructure;
/// Port implementations (embedding, vector store)
pub mod providers;
/// Hybrid retrieval core
pub mod retrieval;
/// HTTP surface
pub mod server;
/// Application services
pub mod services;

// Re-export core types for public API
pub use domain::error::{Error, Result};
pub use domain::types::*;

// Re-export main entry points
pub use retrieval::hybrid::{HybridRetriever, HybridRetrieverConfig};
pub use server::{router, AppState};
