//! Domain Port Interfaces
//!
//! Boundary contracts between the retrieval core and external systems.
//! Ports are trait-based abstractions so implementations can be swapped
//! without touching the engines that depend on them.
//!
//! ## Organization
//!
//! - **embedding.rs** - Text embedding providers
//! - **vector_store.rs** - Vector storage backends
//! - **adapter.rs** - Uniform retrieval contract over heterogeneous RAG backends

/// Uniform retrieval contract for pluggable RAG backends
pub mod adapter;
/// Embedding provider interfaces for dense query/document vectors
pub mod embedding;
/// Vector storage backend interfaces
pub mod vector_store;

pub use adapter::RetrievalAdapter;
pub use embedding::EmbeddingProvider;
pub use vector_store::{DistanceMetric, ScoredPoint, ScrollPage, VectorStoreProvider};
