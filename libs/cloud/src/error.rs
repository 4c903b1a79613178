//! Error types for control-plane calls.

use thiserror::Error;

/// Result type for control-plane operations.
pub type CloudResult<T> = Result<T, CloudError>;

/// Errors reported by a [`crate::CloudApi`] implementation.
#[derive(Debug, Error)]
pub enum CloudError {
    /// The addressed resource does not exist (or no longer exists).
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The control plane rejected the request because of a state conflict.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The token was rejected.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Any other non-success response.
    #[error("control plane returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("configuration error: {0}")]
    Config(String),

    /// Failure injected by the in-memory cloud.
    #[error("injected failure: {0}")]
    Injected(String),
}

impl CloudError {
    /// Create a not-found error for a resource kind.
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Returns true if the resource is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<serde_json::Error> for CloudError {
    fn from(err: serde_json::Error) -> Self {
        CloudError::Decode(err.to_string())
    }
}
