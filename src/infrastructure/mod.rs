//! Infrastructure: configuration loading and shared HTTP plumbing

/// Layered application configuration
pub mod config;
/// Shared HTTP client construction and retry policy
pub mod http;

pub use config::AppConfig;
pub use http::{build_client, send_with_retry, RetryPolicy};
