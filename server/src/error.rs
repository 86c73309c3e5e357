//! Error types for the documentation agent.

use crate::mcp::protocol::JsonRpcError;
use thiserror::Error;

/// Errors that can occur while serving a documentation request.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Library '{0}' not found in Context7 database.")]
    LibraryNotFound(String),

    #[error("No documentation found for '{name}' (ID: {id})")]
    NoDocumentation { name: String, id: String },

    #[error("Documentation service error: {0}")]
    Docs(#[from] crate::docs::DocsError),

    #[error("Memory service error: {0}")]
    Memory(#[from] docagent_memory::MemoryError),

    #[error("Analytics error: {0}")]
    Analytics(#[from] crate::analytics::AnalyticsError),

    #[error("Completion service error: {0}")]
    Completion(#[from] crate::completion::CompletionError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgentError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

impl From<AgentError> for JsonRpcError {
    fn from(err: AgentError) -> Self {
        match &err {
            AgentError::InvalidArgument(_) => JsonRpcError::invalid_params(err.to_string()),
            _ => JsonRpcError::internal_error(err.to_string()),
        }
    }
}

/// Result type alias for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;
