//! Hybrid retrieval core: fusion strategies and the two-leg fan-out

/// Score fusion strategies
pub mod fusion;
/// Parallel fan-out retriever
pub mod hybrid;

pub use fusion::{fuse, FusionMethod};
pub use hybrid::{HybridRetriever, HybridRetrieverConfig, HybridSearchOutput};
