//! Vector store provider implementations

/// In-process store for tests and local runs
pub mod in_memory;
/// Qdrant-protocol REST provider
pub mod qdrant;

pub use in_memory::InMemoryVectorStoreProvider;
pub use qdrant::QdrantVectorStoreProvider;
