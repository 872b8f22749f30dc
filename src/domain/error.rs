//! Error handling types

use thiserror::Error;

/// Result type alias for operations that can fail
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the retrieval and evaluation platform
///
/// Variants map one-to-one onto the failure classes the HTTP surface
/// reports: validation problems become 4xx, a single unavailable
/// dependency is handled locally and only surfaces when every redundant
/// path failed, and deadline expiry is distinct from plain unavailability.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed input (an empty query is NOT an error; it yields empty results)
    #[error("validation error: {message}")]
    Validation {
        /// Description of the invalid input
        message: String,
    },

    /// A downstream dependency (vector store, embedding service, adapter backend) failed or timed out
    #[error("dependency '{service}' unavailable: {message}")]
    DependencyUnavailable {
        /// The dependency that failed
        service: String,
        /// Description of the failure
        message: String,
    },

    /// The overall query or evaluation budget elapsed with no partial progress
    #[error("deadline exceeded: {message}")]
    DeadlineExceeded {
        /// What was being waited on
        message: String,
    },

    /// BM25 index or run-log read/write failed
    #[error("persistence error: {message}")]
    Persistence {
        /// Description of the persistence failure
        message: String,
    },

    /// Authentication failed after the single re-auth attempt
    #[error("authentication failed: {message}")]
    Auth {
        /// Description of the auth failure
        message: String,
    },

    /// Resource not found error
    #[error("not found: {resource}")]
    NotFound {
        /// The resource that was not found
        resource: String,
    },

    /// Internal system error (bugs; always surfaced, never swallowed)
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error
        message: String,
    },

    /// I/O operation error
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error
        #[from]
        source: std::io::Error,
    },

    /// JSON parsing or serialization error
    #[error("JSON error: {source}")]
    Json {
        /// The underlying JSON error
        #[from]
        source: serde_json::Error,
    },
}

impl Error {
    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a dependency-unavailable error
    pub fn dependency_unavailable<S: Into<String>, M: Into<String>>(service: S, message: M) -> Self {
        Self::DependencyUnavailable {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Create a deadline-exceeded error
    pub fn deadline_exceeded<S: Into<String>>(message: S) -> Self {
        Self::DeadlineExceeded {
            message: message.into(),
        }
    }

    /// Create a persistence error
    pub fn persistence<S: Into<String>>(message: S) -> Self {
        Self::Persistence {
            message: message.into(),
        }
    }

    /// Create an auth error
    pub fn auth<S: Into<String>>(message: S) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error represents a timeout rather than a hard failure
    pub fn is_deadline(&self) -> bool {
        matches!(self, Self::DeadlineExceeded { .. })
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::Validation {
            message: err.to_string(),
        }
    }
}
