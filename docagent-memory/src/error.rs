//! Error types for docagent-memory

use thiserror::Error;

/// Errors that can occur when talking to the memory service
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Transport-level failure (connect, timeout, body read)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status
    #[error("Memory service returned {status}: {body}")]
    Status { status: u16, body: String },

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Health endpoint reachable but not reporting healthy
    #[error("Memory service unhealthy: {0}")]
    Unhealthy(String),

    /// Invalid base URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Episode builder error
    #[error("Builder error: {0}")]
    Builder(#[from] crate::episode::EpisodeBuilderError),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl MemoryError {
    /// Create a status error
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }

    /// Create an unhealthy error
    pub fn unhealthy(msg: impl Into<String>) -> Self {
        Self::Unhealthy(msg.into())
    }

    /// Create an invalid URL error
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl(url.into())
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// Result type for memory operations
pub type Result<T> = std::result::Result<T, MemoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        let err = MemoryError::status(503, "busy");
        assert_eq!(err.to_string(), "Memory service returned 503: busy");
    }

    #[test]
    fn test_unhealthy_display() {
        let err = MemoryError::unhealthy("status=degraded");
        assert_eq!(err.to_string(), "Memory service unhealthy: status=degraded");
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: MemoryError = json_err.into();
        assert!(matches!(err, MemoryError::Json(_)));
    }
}
