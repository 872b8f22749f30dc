//! Provider implementations for the domain ports
//!
//! Each provider implements one port from [`crate::domain::ports`].
//! Providers are constructed once in the composition root and passed as
//! `Arc<dyn …>`; nothing in here is a global.

/// Embedding provider implementations
pub mod embedding;
/// Vector store provider implementations
pub mod vector_store;
