//! Session scoping for memory requests.
//!
//! Every request to the memory service carries a session block that scopes
//! memories to one user of one agent.

use serde::{Deserialize, Serialize};

/// Identifier the agent registers itself under in the memory service.
pub const DEFAULT_AGENT_ID: &str = "doc_injection_agent";

/// Session block sent with every search and store request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionScope {
    pub group_id: String,
    pub agent_id: Vec<String>,
    pub user_id: Vec<String>,
    pub session_id: String,
}

impl SessionScope {
    /// Scope for `user_id` under the default agent id
    pub fn for_user(user_id: &str) -> Self {
        Self::with_agent(user_id, DEFAULT_AGENT_ID)
    }

    /// Scope for `user_id` under an explicit agent id
    pub fn with_agent(user_id: &str, agent_id: &str) -> Self {
        Self {
            group_id: format!("doc_agent_{}", user_id),
            agent_id: vec![agent_id.to_string()],
            user_id: vec![user_id.to_string()],
            session_id: format!("doc_session_{}", user_id),
        }
    }
}
