//! Retrieval episode types and builders
//!
//! An episode records one documentation retrieval so later queries from the
//! same user can be answered with that history in view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Episode type tag understood by the memory service
pub const EPISODE_TYPE: &str = "doc_retrieval";

/// Number of characters of documentation kept in a stored episode
pub const DOCS_PREVIEW_CHARS: usize = 500;

/// Truncate `text` to at most `max_chars` characters, appending `...` when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// One documentation retrieval, as stored in the memory service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalEpisode {
    #[serde(rename = "type")]
    pub episode_type: String,
    pub user_query: String,
    pub library_name: String,
    pub library_id: String,
    pub docs_preview: String,
    pub docs_length: usize,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    /// Extra fields merged into the stored metadata
    #[serde(skip)]
    pub metadata: Map<String, Value>,
}

impl RetrievalEpisode {
    /// Create a new builder
    pub fn builder() -> RetrievalEpisodeBuilder {
        RetrievalEpisodeBuilder::new()
    }

    /// Metadata block sent alongside the episode content
    pub fn metadata_block(&self) -> Map<String, Value> {
        let mut block = Map::new();
        block.insert("library_name".into(), Value::from(self.library_name.clone()));
        block.insert("library_id".into(), Value::from(self.library_id.clone()));
        block.insert("success".into(), Value::from(self.success));
        block.insert("docs_length".into(), Value::from(self.docs_length));
        block.insert("timestamp".into(), Value::from(self.timestamp.to_rfc3339()));
        block.insert("type".into(), Value::from(self.episode_type.clone()));
        for (key, value) in &self.metadata {
            block.insert(key.clone(), value.clone());
        }
        block
    }
}

/// Builder for [`RetrievalEpisode`]
#[derive(Debug, Default)]
pub struct RetrievalEpisodeBuilder {
    user_query: Option<String>,
    library_name: Option<String>,
    library_id: Option<String>,
    docs: String,
    success: bool,
    timestamp: Option<DateTime<Utc>>,
    metadata: Map<String, Value>,
}

impl RetrievalEpisodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_query(mut self, query: impl Into<String>) -> Self {
        self.user_query = Some(query.into());
        self
    }

    pub fn library(mut self, name: impl Into<String>, id: impl Into<String>) -> Self {
        self.library_name = Some(name.into());
        self.library_id = Some(id.into());
        self
    }

    /// Retrieved documentation; only a preview and the length are kept
    pub fn docs(mut self, docs: &str) -> Self {
        self.docs = docs.to_string();
        self
    }

    pub fn success(mut self, success: bool) -> Self {
        self.success = success;
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Result<RetrievalEpisode, EpisodeBuilderError> {
        let user_query = self.user_query.ok_or(EpisodeBuilderError::MissingQuery)?;
        let library_name = self
            .library_name
            .ok_or(EpisodeBuilderError::MissingLibrary)?;
        let library_id = self.library_id.ok_or(EpisodeBuilderError::MissingLibrary)?;

        Ok(RetrievalEpisode {
            episode_type: EPISODE_TYPE.to_string(),
            user_query,
            library_name,
            library_id,
            docs_preview: preview(&self.docs, DOCS_PREVIEW_CHARS),
            docs_length: self.docs.chars().count(),
            success: self.success,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            metadata: self.metadata,
        })
    }
}

/// Errors that can occur when building a RetrievalEpisode
#[derive(Debug, thiserror::Error)]
pub enum EpisodeBuilderError {
    #[error("Missing required field: user_query")]
    MissingQuery,
    #[error("Missing required field: library name and id")]
    MissingLibrary,
}
