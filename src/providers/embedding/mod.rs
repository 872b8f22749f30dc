//! Embedding provider implementations

/// HTTP embedding service client
pub mod http;
/// Deterministic provider for tests and offline development
pub mod null;

pub use http::HttpEmbeddingProvider;
pub use null::NullEmbeddingProvider;
