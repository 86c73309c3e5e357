//! Documentation resolution via Context7.

pub mod client;
pub mod library;

pub use client::{DocsClient, DocsClientConfig, DEFAULT_ENDPOINT, DEFAULT_TOKENS, MIN_TOKENS};
pub use library::{parse_candidates, select_library, LibraryCandidate};

use thiserror::Error;

/// Errors from the documentation service
#[derive(Debug, Error)]
pub enum DocsError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Context7 returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Context7 RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Context7 tool error: {0}")]
    Tool(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl DocsError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse(message.into())
    }
}
