//! Documentation injection agent.
//!
//! An MCP server that answers editor tool calls with fresh library
//! documentation from Context7, personalised with MemMachine memory and
//! traced to Opik.

pub mod analytics;
pub mod cache;
pub mod completion;
pub mod config;
pub mod docs;
pub mod error;
pub mod mcp;
pub mod pipeline;
pub mod registration;
pub mod response;

pub use config::AgentConfig;
pub use error::{AgentError, AgentResult};
pub use pipeline::DocAgent;
pub use registration::RegistrationRecord;
