//! HTTP client for the MemMachine memory service.

use std::time::Duration;

use serde_json::{json, Value};

use crate::episode::{RetrievalEpisode, EPISODE_TYPE};
use crate::error::{MemoryError, Result};
use crate::search::{MemoryHits, SearchRequest, SearchResponse};
use crate::session::{SessionScope, DEFAULT_AGENT_ID};

/// Default address of a locally running MemMachine
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Connection settings for [`MemoryClient`]
#[derive(Debug, Clone)]
pub struct MemoryClientConfig {
    pub base_url: String,
    pub agent_id: String,
    pub search_timeout: Duration,
    pub store_timeout: Duration,
    pub health_timeout: Duration,
}

impl Default for MemoryClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            agent_id: DEFAULT_AGENT_ID.to_string(),
            search_timeout: Duration::from_secs(10),
            store_timeout: Duration::from_secs(15),
            health_timeout: Duration::from_secs(5),
        }
    }
}

impl MemoryClientConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Client for searching and storing retrieval episodes
#[derive(Debug, Clone)]
pub struct MemoryClient {
    http: reqwest::Client,
    config: MemoryClientConfig,
}

impl MemoryClient {
    /// Create a client; fails when the base URL is not http(s)
    pub fn new(mut config: MemoryClientConfig) -> Result<Self> {
        let trimmed = config.base_url.trim_end_matches('/').to_string();
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(MemoryError::invalid_url(config.base_url));
        }
        config.base_url = trimmed;

        Ok(Self {
            http: reqwest::Client::new(),
            config,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn scope(&self, user_id: &str) -> SessionScope {
        SessionScope::with_agent(user_id, &self.config.agent_id)
    }

    async fn post_json(&self, path: &str, body: &impl serde::Serialize, timeout: Duration) -> Result<String> {
        let response = self
            .http
            .post(self.url(path))
            .json(body)
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(MemoryError::status(status.as_u16(), text));
        }
        Ok(text)
    }

    async fn search(&self, request: &SearchRequest) -> Result<MemoryHits> {
        let body = self
            .post_json("/v1/memories/search", request, self.config.search_timeout)
            .await?;
        let parsed: SearchResponse = serde_json::from_str(&body)?;
        Ok(parsed.into())
    }

    /// Search for memories similar to `query` for this user
    pub async fn search_similar(&self, query: &str, user_id: &str, limit: usize) -> Result<MemoryHits> {
        let request = SearchRequest::new(self.scope(user_id), query, limit);
        let hits = self.search(&request).await?;
        tracing::info!("Found {} similar queries for: {}", hits.len(), query);
        Ok(hits)
    }

    /// Past retrievals of one library for this user
    pub async fn library_history(
        &self,
        library_name: &str,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<Value>> {
        let request = SearchRequest::new(self.scope(user_id), library_name, limit)
            .with_filter("library_name", library_name);
        let hits = self.search(&request).await?;
        tracing::info!(
            "Found {} past interactions with {}",
            hits.episodic.len(),
            library_name
        );
        Ok(hits.episodic)
    }

    /// Store a retrieval episode for this user
    pub async fn store_episode(&self, user_id: &str, episode: &RetrievalEpisode) -> Result<()> {
        let body = json!({
            "session": self.scope(user_id),
            "producer": user_id,
            "produced_for": self.config.agent_id,
            "episode_content": serde_json::to_string(episode)?,
            "episode_type": EPISODE_TYPE,
            "metadata": episode.metadata_block(),
        });

        self.post_json("/v1/memories", &body, self.config.store_timeout)
            .await?;

        tracing::info!(
            "Stored retrieval session for library '{}' and query: {}",
            episode.library_name,
            crate::episode::preview(&episode.user_query, 100)
        );
        Ok(())
    }

    /// Check `GET /health`; Ok only when the service reports `healthy`
    pub async fn health(&self) -> Result<Value> {
        let response = self
            .http
            .get(self.url("/health"))
            .timeout(self.config.health_timeout)
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(MemoryError::unhealthy(format!("HTTP {}", status.as_u16())));
        }

        let health: Value = response.json().await?;
        tracing::debug!("MemMachine health: {}", health);
        match health.get("status").and_then(|s| s.as_str()) {
            Some("healthy") => Ok(health),
            other => Err(MemoryError::unhealthy(format!(
                "status={}",
                other.unwrap_or("missing")
            ))),
        }
    }

    /// Convenience wrapper around [`MemoryClient::health`]
    pub async fn is_healthy(&self) -> bool {
        match self.health().await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("MemMachine health check failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn client_for(server: &Server) -> MemoryClient {
        MemoryClient::new(MemoryClientConfig::default().with_base_url(server.url())).unwrap()
    }

    #[test]
    fn test_rejects_non_http_url() {
        let result = MemoryClient::new(MemoryClientConfig::default().with_base_url("localhost:8080"));
        assert!(matches!(result, Err(MemoryError::InvalidUrl(_))));
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let client =
            MemoryClient::new(MemoryClientConfig::default().with_base_url("http://mem:8080/")).unwrap();
        assert_eq!(client.base_url(), "http://mem:8080");
    }

    #[tokio::test]
    async fn test_search_similar_parses_hits() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/memories/search")
            .match_body(Matcher::PartialJson(json!({
                "query": "fastapi routing",
                "limit": 3,
                "session": {"group_id": "doc_agent_alice"}
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"content": {"episodic_memory": ["a", "b"], "profile_memory": []}}"#)
            .create_async()
            .await;

        let hits = client_for(&server)
            .search_similar("fastapi routing", "alice", 3)
            .await
            .unwrap();

        assert_eq!(hits.len(), 2);
        assert!(hits.has_context());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_search_error_status() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/memories/search")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let err = client_for(&server)
            .search_similar("q", "u", 3)
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_library_history_sends_filter() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/memories/search")
            .match_body(Matcher::PartialJson(json!({
                "query": "react",
                "filter": {"library_name": "react"}
            })))
            .with_status(200)
            .with_body(r#"{"content": {"episodic_memory": [{"library_id": "/facebook/react"}]}}"#)
            .create_async()
            .await;

        let history = client_for(&server)
            .library_history("react", "u", 5)
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_store_episode_payload() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/memories")
            .match_body(Matcher::PartialJson(json!({
                "producer": "alice",
                "produced_for": "doc_injection_agent",
                "episode_type": "doc_retrieval",
                "metadata": {"library_id": "/fastapi/fastapi", "topic": "routing"}
            })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let episode = RetrievalEpisode::builder()
            .user_query("fastapi routing")
            .library("fastapi", "/fastapi/fastapi")
            .docs("Use @app.get()")
            .success(true)
            .meta("topic", "routing")
            .build()
            .unwrap();

        client_for(&server)
            .store_episode("alice", &episode)
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_health_states() {
        let mut server = Server::new_async().await;
        let healthy = server
            .mock("GET", "/health")
            .with_status(200)
            .with_body(r#"{"status": "healthy"}"#)
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server);
        assert!(client.is_healthy().await);
        healthy.assert_async().await;
        healthy.remove_async().await;

        server
            .mock("GET", "/health")
            .with_status(200)
            .with_body(r#"{"status": "degraded"}"#)
            .create_async()
            .await;
        let err = client.health().await.unwrap_err();
        assert!(matches!(err, MemoryError::Unhealthy(_)));
    }
}
