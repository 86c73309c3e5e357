//! Memory search requests, results, and context prompt assembly.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::session::SessionScope;

/// Maximum number of past queries rendered into a context prompt
pub const MAX_PROMPT_EPISODES: usize = 3;

/// Equality filter applied by the memory service (e.g. `library_name`)
pub type SearchFilter = BTreeMap<String, String>;

/// Body of `POST /v1/memories/search`
#[derive(Debug, Clone, Serialize)]
pub struct SearchRequest {
    pub session: SessionScope,
    pub query: String,
    pub limit: usize,
    pub filter: SearchFilter,
}

impl SearchRequest {
    pub fn new(session: SessionScope, query: impl Into<String>, limit: usize) -> Self {
        Self {
            session,
            query: query.into(),
            limit,
            filter: SearchFilter::new(),
        }
    }

    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub content: SearchContent,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SearchContent {
    #[serde(default)]
    pub episodic_memory: Vec<Value>,
    #[serde(default)]
    pub profile_memory: Vec<Value>,
}

/// Memories returned for a query
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MemoryHits {
    /// Past episodes similar to the query
    pub episodic: Vec<Value>,
    /// Profile facts (preferences) about the user
    pub profile: Vec<Value>,
}

impl MemoryHits {
    /// True when either episodic or profile memory came back
    pub fn has_context(&self) -> bool {
        !self.episodic.is_empty() || !self.profile.is_empty()
    }

    /// Number of episodic memories
    pub fn len(&self) -> usize {
        self.episodic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.episodic.is_empty()
    }
}

impl From<SearchResponse> for MemoryHits {
    fn from(response: SearchResponse) -> Self {
        Self {
            episodic: response.content.episodic_memory,
            profile: response.content.profile_memory,
        }
    }
}

fn render_entry(entry: &Value) -> String {
    match entry {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Build the context prompt handed to the editor's assistant.
///
/// Profile memory comes first, then at most [`MAX_PROMPT_EPISODES`] past
/// queries, then the current query. Without any memory only the query line
/// is returned.
pub fn build_context_prompt(hits: &MemoryHits, current_query: &str) -> String {
    let mut parts: Vec<String> = Vec::new();

    if !hits.profile.is_empty() {
        parts.push("=== USER PREFERENCES ===".to_string());
        parts.extend(hits.profile.iter().map(render_entry));
    }

    if !hits.episodic.is_empty() {
        parts.push("=== PAST SIMILAR QUERIES ===".to_string());
        for (i, episode) in hits.episodic.iter().take(MAX_PROMPT_EPISODES).enumerate() {
            parts.push(format!("Past Query {}: {}", i + 1, render_entry(episode)));
        }
    }

    if parts.is_empty() {
        return format!("Query: {}", current_query);
    }

    parts.push("=== CURRENT QUERY ===".to_string());
    parts.push(format!("Current query: {}", current_query));
    parts.push("\nBased on the above context, provide relevant documentation.".to_string());
    parts.join("\n")
}
