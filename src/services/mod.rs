//! Application services coordinating the indices

/// Dual-index ingestion service
pub mod indexing;

pub use indexing::{IndexingOutcome, IndexingService};
