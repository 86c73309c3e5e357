//! Documentation retrieval pipeline.
//!
//! One tool call runs strictly in sequence: memory search, library
//! resolution, documentation fetch, memory store, trace upload. Memory and
//! analytics problems degrade the answer; documentation problems fail it.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::analytics::{
    millis, AnalyticsClient, AnalyticsError, MemoryOperation, QueryOutcome, SessionTrace,
    UsageStats,
};
use crate::cache::LibraryCache;
use crate::completion::CompletionClient;
use crate::config::AgentConfig;
use crate::docs::{select_library, DocsClient};
use crate::error::{AgentError, AgentResult};
use crate::response::{self, AnalyticsView, DocsView, Timings};
use docagent_memory::{MemoryClient, MemoryHits, RetrievalEpisode};

pub const AGENT_NAME: &str = "Documentation Injection Agent";

/// Memories consulted before fetching docs
pub const DOCS_MEMORY_LIMIT: usize = 3;
/// Memories returned by the search tool
pub const SEARCH_MEMORY_LIMIT: usize = 5;
pub const HISTORY_LIMIT: usize = 5;

/// Where and how the Context7 step failed
struct DocsFailure<'a> {
    library_id: Option<&'a str>,
    started_at: DateTime<Utc>,
    elapsed: Duration,
    error: AgentError,
}

pub struct DocAgent {
    docs: DocsClient,
    memory: MemoryClient,
    analytics: AnalyticsClient,
    completion: Option<CompletionClient>,
    cache: LibraryCache,
    stats: UsageStats,
    config: AgentConfig,
}

fn require<'a>(value: &'a str, name: &str) -> AgentResult<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AgentError::invalid_argument(format!(
            "'{}' must not be empty",
            name
        )));
    }
    Ok(value)
}

impl DocAgent {
    pub fn new(config: AgentConfig) -> AgentResult<Self> {
        let docs = DocsClient::new(config.docs.clone());
        tracing::info!("Context7 client initialized ({})", docs.endpoint());

        let memory = MemoryClient::new(config.memory.clone())?;
        let analytics = AnalyticsClient::new(config.analytics.clone());
        let completion = config.completion.clone().map(|c| {
            tracing::info!("Model-assisted library selection enabled ({})", c.model);
            CompletionClient::new(c)
        });

        Ok(Self {
            docs,
            memory,
            analytics,
            completion,
            cache: LibraryCache::new(config.library_cache_size),
            stats: UsageStats::new(),
            config,
        })
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn default_user(&self) -> &str {
        &self.config.default_user
    }

    /// Startup health check; fails when MemMachine is not healthy
    pub async fn check_services(&self) -> AgentResult<()> {
        if self.config.skip_health_check {
            tracing::warn!("Skipping MemMachine health check");
            return Ok(());
        }
        self.memory.health().await?;
        tracing::info!("MemMachine client initialized ({})", self.memory.base_url());
        Ok(())
    }

    /// Fetch documentation for a library, with memory context
    pub async fn get_library_docs(
        &self,
        library_name: &str,
        topic: Option<&str>,
        user_id: &str,
    ) -> AgentResult<Vec<String>> {
        let library_name = require(library_name, "library_name")?;
        let user_id = require(user_id, "user_id")?;
        let topic = topic.map(str::trim).filter(|t| !t.is_empty());
        let query_text = format!("{} {}", library_name, topic.unwrap_or(""))
            .trim()
            .to_string();

        let started = Instant::now();
        let mut trace = SessionTrace::start(library_name, &query_text, user_id);
        let mut timings = Timings::default();

        // Step 1: similar past queries
        let memory_started_at = Utc::now();
        let memory_clock = Instant::now();
        let hits = match self
            .memory
            .search_similar(&query_text, user_id, DOCS_MEMORY_LIMIT)
            .await
        {
            Ok(hits) => {
                trace.memory_span(
                    MemoryOperation::Search,
                    &query_text,
                    hits.has_context(),
                    hits.len(),
                    memory_started_at,
                    memory_clock.elapsed(),
                );
                hits
            }
            Err(e) => {
                tracing::warn!("Memory search failed, continuing without context: {}", e);
                trace.memory_span(
                    MemoryOperation::Search,
                    &query_text,
                    false,
                    0,
                    memory_started_at,
                    memory_clock.elapsed(),
                );
                MemoryHits::default()
            }
        };
        timings.memory_ms = millis(memory_clock.elapsed());

        // Step 2: resolve and fetch
        let docs_started_at = Utc::now();
        let docs_clock = Instant::now();
        let library_id = match self.resolve_library(library_name).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                let failure = DocsFailure {
                    library_id: None,
                    started_at: docs_started_at,
                    elapsed: docs_clock.elapsed(),
                    error: AgentError::LibraryNotFound(library_name.to_string()),
                };
                return Err(self.abort(trace, failure, &hits, &timings, started).await);
            }
            Err(error) => {
                let failure = DocsFailure {
                    library_id: None,
                    started_at: docs_started_at,
                    elapsed: docs_clock.elapsed(),
                    error,
                };
                return Err(self.abort(trace, failure, &hits, &timings, started).await);
            }
        };

        let fetched = self
            .docs
            .get_docs(&library_id, topic, self.config.docs_tokens)
            .await;
        let docs = match fetched {
            Ok(docs) if !docs.is_empty() => docs,
            other => {
                let error = match other {
                    Err(e) => e.into(),
                    Ok(_) => {
                        // A cached id that stopped yielding docs should be re-resolved next time
                        self.cache.invalidate(library_name);
                        AgentError::NoDocumentation {
                            name: library_name.to_string(),
                            id: library_id.clone(),
                        }
                    }
                };
                let failure = DocsFailure {
                    library_id: Some(&library_id),
                    started_at: docs_started_at,
                    elapsed: docs_clock.elapsed(),
                    error,
                };
                return Err(self.abort(trace, failure, &hits, &timings, started).await);
            }
        };
        let docs_elapsed = docs_clock.elapsed();
        timings.docs_ms = millis(docs_elapsed);
        trace.docs_span(
            Some(&library_id),
            true,
            docs.chars().count(),
            None,
            docs_started_at,
            docs_elapsed,
        );

        // Step 3: remember this retrieval
        let store_started_at = Utc::now();
        let store_clock = Instant::now();
        let stored = self
            .store_episode(&query_text, library_name, &library_id, &docs, topic, user_id, &timings)
            .await;
        let store_elapsed = store_clock.elapsed();
        timings.store_ms = millis(store_elapsed);
        trace.memory_span(
            MemoryOperation::Store,
            &format!("Store: {}", query_text),
            stored,
            0,
            store_started_at,
            store_elapsed,
        );

        // Step 4: trace the whole session
        timings.total_ms = millis(started.elapsed());
        trace.finish(&library_id, &docs, true, hits.has_context());
        trace.set_meta("total_time_ms", timings.total_ms);
        trace.set_meta("context7_time_ms", timings.docs_ms);
        trace.set_meta("memory_time_ms", timings.memory_ms);
        trace.set_meta("store_time_ms", timings.store_ms);
        trace.set_meta("topic", topic.unwrap_or(""));
        trace.set_meta("has_memory_context", hits.has_context());
        let trace_id = self.upload(&trace).await;

        self.stats.record_query(&QueryOutcome {
            library_name: library_name.to_string(),
            success: true,
            memory_hit: hits.has_context(),
            docs_ms: timings.docs_ms,
            memory_ms: timings.memory_ms,
            total_ms: millis(started.elapsed()),
        });

        // Step 5: merge
        let mut blocks = Vec::with_capacity(2);
        if hits.has_context() {
            blocks.push(response::memory_context(&hits, &query_text));
        }
        timings.total_ms = millis(started.elapsed());
        blocks.push(response::documentation(&DocsView {
            library_name,
            library_id: &library_id,
            topic,
            docs: &docs,
            timings,
            trace_id,
        }));
        Ok(blocks)
    }

    /// Record a failed retrieval and hand back the error
    async fn abort(
        &self,
        mut trace: SessionTrace,
        failure: DocsFailure<'_>,
        hits: &MemoryHits,
        timings: &Timings,
        started: Instant,
    ) -> AgentError {
        let DocsFailure {
            library_id,
            started_at,
            elapsed,
            error,
        } = failure;
        tracing::error!("Error in get_library_docs: {}", error);
        let message = error.to_string();

        trace.docs_span(library_id, false, 0, Some(&message), started_at, elapsed);
        trace.finish(library_id.unwrap_or("error"), "", false, hits.has_context());
        trace.set_meta("error", message);
        trace.set_meta("context7_time_ms", millis(elapsed));
        trace.set_meta("memory_time_ms", timings.memory_ms);
        trace.set_meta("total_time_ms", millis(started.elapsed()));
        self.upload(&trace).await;

        self.stats.record_query(&QueryOutcome {
            library_name: trace.library_name.clone(),
            success: false,
            memory_hit: hits.has_context(),
            docs_ms: millis(elapsed),
            memory_ms: timings.memory_ms,
            total_ms: millis(started.elapsed()),
        });
        error
    }

    /// Upload a trace; returns its id when analytics is on and the upload worked
    async fn upload(&self, trace: &SessionTrace) -> Option<String> {
        if !self.analytics.is_configured() {
            return None;
        }
        match self.analytics.record(trace).await {
            Ok(()) => Some(trace.id.to_string()),
            Err(e) => {
                tracing::warn!("Error creating Opik trace: {}", e);
                None
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn store_episode(
        &self,
        query_text: &str,
        library_name: &str,
        library_id: &str,
        docs: &str,
        topic: Option<&str>,
        user_id: &str,
        timings: &Timings,
    ) -> bool {
        let episode = RetrievalEpisode::builder()
            .user_query(query_text)
            .library(library_name, library_id)
            .docs(docs)
            .success(true)
            .meta("topic", topic.unwrap_or(""))
            .meta("context7_response_time_ms", timings.docs_ms)
            .meta("memory_search_time_ms", timings.memory_ms)
            .build();

        let result = match episode {
            Ok(episode) => self
                .memory
                .store_episode(user_id, &episode)
                .await
                .map_err(AgentError::from),
            Err(e) => Err(AgentError::Memory(e.into())),
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Error storing retrieval session: {}", e);
                false
            }
        }
    }

    /// Library name -> Context7 id, via cache, directory and optional model pick
    pub async fn resolve_library(&self, library_name: &str) -> AgentResult<Option<String>> {
        if let Some(id) = self.cache.get(library_name) {
            tracing::debug!("Library cache hit: '{}' → '{}'", library_name, id);
            return Ok(Some(id));
        }

        let candidates = self.docs.resolve_candidates(library_name).await?;

        let chosen = match &self.completion {
            Some(completion) => match completion.choose_library(library_name, &candidates).await {
                Ok(Some(candidate)) => Some(candidate),
                Ok(None) => select_library(&candidates),
                Err(e) => {
                    tracing::warn!("Model-assisted selection failed, using ranking: {}", e);
                    select_library(&candidates)
                }
            },
            None => select_library(&candidates),
        };

        let id = chosen.map(|c| c.id.clone());
        if let Some(id) = &id {
            tracing::info!("Resolved '{}' → '{}'", library_name, id);
            self.cache.insert(library_name, id);
        }
        Ok(id)
    }

    /// Search memory for past retrievals
    pub async fn search_memory(&self, query: &str, user_id: &str) -> AgentResult<String> {
        let query = require(query, "query")?;
        let user_id = require(user_id, "user_id")?;

        let hits = self
            .memory
            .search_similar(query, user_id, SEARCH_MEMORY_LIMIT)
            .await?;
        self.stats.record_memory_search();

        if !hits.has_context() {
            return Ok(response::no_memory(query));
        }
        Ok(response::memory_search(query, &hits))
    }

    /// Past retrievals of one library
    pub async fn library_history(
        &self,
        library_name: &str,
        user_id: &str,
        limit: usize,
    ) -> AgentResult<String> {
        let library_name = require(library_name, "library_name")?;
        let user_id = require(user_id, "user_id")?;

        let entries = self
            .memory
            .library_history(library_name, user_id, limit.max(1))
            .await?;
        Ok(response::library_history(library_name, &entries))
    }

    /// Opik project info and local usage counters
    pub fn analytics_report(&self) -> String {
        let stats = self.stats.snapshot();
        response::analytics(&AnalyticsView {
            project_name: self.analytics.project_name(),
            dashboard_url: self.analytics.dashboard_url(),
            opik_enabled: self.analytics.is_configured(),
            stats: &stats,
        })
    }

    /// Attach user feedback to a trace
    pub async fn log_feedback(
        &self,
        trace_id: &str,
        score: f64,
        comment: Option<&str>,
    ) -> AgentResult<String> {
        let trace_id = require(trace_id, "trace_id")?;
        if !(0.0..=1.0).contains(&score) {
            return Err(AgentError::invalid_argument(format!(
                "score must be between 0.0 and 1.0, got {}",
                score
            )));
        }

        self.analytics
            .log_feedback(trace_id, score, comment)
            .await
            .map_err(|e| match e {
                AnalyticsError::InvalidScore(_) | AnalyticsError::InvalidTraceId(_) => {
                    AgentError::invalid_argument(e.to_string())
                }
                other => AgentError::from(other),
            })?;
        self.stats.record_feedback();

        Ok(format!("👍 Feedback {:.2} recorded for trace {}", score, trace_id))
    }

    /// Availability of each integrated service
    pub async fn status(&self) -> Value {
        json!({
            "agent": AGENT_NAME,
            "timestamp": Utc::now().to_rfc3339(),
            "services": {
                "context7": true,
                "memmachine": self.memory.is_healthy().await,
                "opik": self.analytics.is_configured(),
                "completion": self.completion.is_some(),
            },
            "libraryCache": self.cache.len(),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use crate::analytics::AnalyticsConfig;
    use crate::completion::CompletionConfig;
    use crate::docs::DocsClientConfig;
    use docagent_memory::MemoryClientConfig;
    use mockito::{Matcher, Server, ServerGuard};

    pub(crate) const LISTING: &str = "- Title: FastAPI docs\n\
        - Context7-compatible library ID: /websites/fastapi\n\
        ----------\n\
        - Title: FastAPI\n\
        - Context7-compatible library ID: /fastapi/fastapi\n";

    pub(crate) fn tool_body(text: &str) -> String {
        json!({"jsonrpc": "2.0", "id": 1, "result": {"content": [{"type": "text", "text": text}]}})
            .to_string()
    }

    pub(crate) fn config_for(docs: &ServerGuard, memory: &ServerGuard) -> AgentConfig {
        AgentConfig {
            docs: DocsClientConfig::new("ctx-key").with_endpoint(format!("{}/mcp", docs.url())),
            docs_tokens: 3000,
            memory: MemoryClientConfig::default().with_base_url(memory.url()),
            analytics: AnalyticsConfig::default(),
            completion: None,
            default_user: "zed_user".to_string(),
            library_cache_size: 16,
            skip_health_check: false,
        }
    }

    pub(crate) fn analytics_for(opik: &ServerGuard) -> AnalyticsConfig {
        AnalyticsConfig {
            api_key: Some("opik-key".to_string()),
            workspace: Some("team".to_string()),
            url_override: Some(opik.url()),
            ..Default::default()
        }
    }

    fn completion_for(server: &ServerGuard) -> CompletionConfig {
        let mut config = CompletionConfig::new("openai-key");
        config.base_url = server.url();
        config
    }

    async fn mock_chat(server: &mut ServerGuard, answer: &str) -> mockito::Mock {
        server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"choices": [{"message": {"content": answer}}]}).to_string())
            .create_async()
            .await
    }

    async fn mock_store(server: &mut ServerGuard) -> mockito::Mock {
        server
            .mock("POST", "/v1/memories")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await
    }

    pub(crate) async fn mock_resolve(server: &mut ServerGuard, listing: &str) -> mockito::Mock {
        server
            .mock("POST", "/mcp")
            .match_body(Matcher::PartialJson(
                json!({"params": {"name": "resolve-library-id"}}),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(tool_body(listing))
            .create_async()
            .await
    }

    pub(crate) async fn mock_docs(server: &mut ServerGuard, docs: &str) -> mockito::Mock {
        server
            .mock("POST", "/mcp")
            .match_body(Matcher::PartialJson(
                json!({"params": {"name": "get-library-docs"}}),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(tool_body(docs))
            .create_async()
            .await
    }

    pub(crate) async fn mock_memory_search(server: &mut ServerGuard, body: &str) -> mockito::Mock {
        server
            .mock("POST", "/v1/memories/search")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn test_get_library_docs_full_flow() {
        let mut docs_server = Server::new_async().await;
        let mut memory_server = Server::new_async().await;

        let resolve = mock_resolve(&mut docs_server, LISTING).await;
        let fetch = docs_server
            .mock("POST", "/mcp")
            .match_body(Matcher::PartialJson(json!({
                "params": {
                    "name": "get-library-docs",
                    "arguments": {"context7CompatibleLibraryID": "/fastapi/fastapi", "topic": "routing"}
                }
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(tool_body("Use @app.get() to declare routes"))
            .create_async()
            .await;
        let search = mock_memory_search(
            &mut memory_server,
            r#"{"content": {"episodic_memory": ["fastapi dependencies"], "profile_memory": []}}"#,
        )
        .await;
        let store = memory_server
            .mock("POST", "/v1/memories")
            .match_body(Matcher::PartialJson(json!({
                "metadata": {"library_id": "/fastapi/fastapi", "topic": "routing"}
            })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let agent = DocAgent::new(config_for(&docs_server, &memory_server)).unwrap();
        let blocks = agent
            .get_library_docs("fastapi", Some("routing"), "alice")
            .await
            .unwrap();

        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].contains("Memory Context Found** (1 similar queries)"));
        assert!(blocks[0].contains("Past Query 1: fastapi dependencies"));
        assert!(blocks[1].contains("Source: Context7 ID `/fastapi/fastapi`"));
        assert!(blocks[1].contains("Topic: routing"));
        assert!(blocks[1].contains("Use @app.get() to declare routes"));

        resolve.assert_async().await;
        fetch.assert_async().await;
        search.assert_async().await;
        store.assert_async().await;

        let snapshot = agent.stats.snapshot();
        assert_eq!(snapshot.total_queries, 1);
        assert_eq!(snapshot.libraries[0].1.memory_hits, 1);
    }

    #[tokio::test]
    async fn test_memory_outage_degrades() {
        let mut docs_server = Server::new_async().await;
        let mut memory_server = Server::new_async().await;

        mock_resolve(&mut docs_server, LISTING).await;
        mock_docs(&mut docs_server, "docs body").await;
        memory_server
            .mock("POST", Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let agent = DocAgent::new(config_for(&docs_server, &memory_server)).unwrap();
        let blocks = agent.get_library_docs("fastapi", None, "u").await.unwrap();

        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].contains("docs body"));
        assert!(blocks[0].contains("Topic: General"));
    }

    #[tokio::test]
    async fn test_library_not_found() {
        let mut docs_server = Server::new_async().await;
        let mut memory_server = Server::new_async().await;

        mock_resolve(&mut docs_server, "No libraries match your query.").await;
        mock_memory_search(&mut memory_server, "{}").await;

        let agent = DocAgent::new(config_for(&docs_server, &memory_server)).unwrap();
        let err = agent
            .get_library_docs("nonexistent", None, "u")
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::LibraryNotFound(ref name) if name == "nonexistent"));
        assert_eq!(agent.stats.snapshot().libraries[0].1.failures, 1);
    }

    #[tokio::test]
    async fn test_empty_docs_invalidates_cache() {
        let mut docs_server = Server::new_async().await;
        let mut memory_server = Server::new_async().await;

        mock_resolve(&mut docs_server, LISTING).await;
        mock_docs(&mut docs_server, "").await;
        mock_memory_search(&mut memory_server, "{}").await;

        let agent = DocAgent::new(config_for(&docs_server, &memory_server)).unwrap();
        let err = agent.get_library_docs("fastapi", None, "u").await.unwrap_err();

        assert!(matches!(err, AgentError::NoDocumentation { .. }));
        assert!(agent.cache.get("fastapi").is_none());
    }

    #[tokio::test]
    async fn test_resolution_is_cached() {
        let mut docs_server = Server::new_async().await;
        let memory_server = Server::new_async().await;

        let resolve = docs_server
            .mock("POST", "/mcp")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(tool_body(LISTING))
            .expect(1)
            .create_async()
            .await;

        let agent = DocAgent::new(config_for(&docs_server, &memory_server)).unwrap();
        let first = agent.resolve_library("FastAPI").await.unwrap();
        let second = agent.resolve_library("fastapi").await.unwrap();

        assert_eq!(first.as_deref(), Some("/fastapi/fastapi"));
        assert_eq!(first, second);
        resolve.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_library_name_rejected() {
        let docs_server = Server::new_async().await;
        let memory_server = Server::new_async().await;
        let agent = DocAgent::new(config_for(&docs_server, &memory_server)).unwrap();

        let err = agent.get_library_docs("  ", None, "u").await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_search_memory_no_context() {
        let docs_server = Server::new_async().await;
        let mut memory_server = Server::new_async().await;
        mock_memory_search(&mut memory_server, r#"{"content": {}}"#).await;

        let agent = DocAgent::new(config_for(&docs_server, &memory_server)).unwrap();
        let text = agent.search_memory("tokio", "u").await.unwrap();
        assert_eq!(text, "🔍 No memory context found for query: 'tokio'");
    }

    #[tokio::test]
    async fn test_search_memory_outage_is_error() {
        let docs_server = Server::new_async().await;
        let mut memory_server = Server::new_async().await;
        memory_server
            .mock("POST", "/v1/memories/search")
            .with_status(500)
            .create_async()
            .await;

        let agent = DocAgent::new(config_for(&docs_server, &memory_server)).unwrap();
        let err = agent.search_memory("tokio", "u").await.unwrap_err();
        assert!(matches!(err, AgentError::Memory(_)));
    }

    #[tokio::test]
    async fn test_feedback_requires_analytics() {
        let docs_server = Server::new_async().await;
        let memory_server = Server::new_async().await;
        let agent = DocAgent::new(config_for(&docs_server, &memory_server)).unwrap();

        let err = agent.log_feedback("abc", 1.0, None).await.unwrap_err();
        assert!(matches!(
            err,
            AgentError::Analytics(AnalyticsError::NotConfigured)
        ));

        let err = agent.log_feedback("abc", 1.5, None).await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_check_services() {
        let docs_server = Server::new_async().await;
        let mut memory_server = Server::new_async().await;
        memory_server
            .mock("GET", "/health")
            .with_status(200)
            .with_body(r#"{"status": "healthy"}"#)
            .create_async()
            .await;

        let agent = DocAgent::new(config_for(&docs_server, &memory_server)).unwrap();
        assert!(agent.check_services().await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_query_keeps_memory_timing() {
        let mut docs_server = Server::new_async().await;
        let mut memory_server = Server::new_async().await;

        mock_resolve(&mut docs_server, "No libraries match your query.").await;
        memory_server
            .mock("POST", "/v1/memories/search")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_chunked_body(|w| {
                std::thread::sleep(Duration::from_millis(40));
                w.write_all(b"{}")
            })
            .create_async()
            .await;

        let agent = DocAgent::new(config_for(&docs_server, &memory_server)).unwrap();
        agent
            .get_library_docs("nonexistent", None, "u")
            .await
            .unwrap_err();

        let snapshot = agent.stats.snapshot();
        let usage = &snapshot.libraries[0].1;
        assert_eq!(usage.failures, 1);
        assert!(usage.memory_ms >= 40.0, "memory_ms = {}", usage.memory_ms);
        assert!(agent.analytics_report().contains("Memory "));
    }

    #[tokio::test]
    async fn test_completion_error_falls_back_to_ranking() {
        let mut docs_server = Server::new_async().await;
        let memory_server = Server::new_async().await;
        let mut completion_server = Server::new_async().await;

        mock_resolve(&mut docs_server, LISTING).await;
        let chat = completion_server
            .mock("POST", "/chat/completions")
            .with_status(503)
            .with_body("overloaded")
            .create_async()
            .await;

        let mut config = config_for(&docs_server, &memory_server);
        config.completion = Some(completion_for(&completion_server));
        let agent = DocAgent::new(config).unwrap();

        let id = agent.resolve_library("fastapi").await.unwrap();
        assert_eq!(id.as_deref(), Some("/fastapi/fastapi"));
        chat.assert_async().await;
    }

    #[tokio::test]
    async fn test_unmatched_completion_answer_falls_back() {
        let mut docs_server = Server::new_async().await;
        let memory_server = Server::new_async().await;
        let mut completion_server = Server::new_async().await;

        mock_resolve(&mut docs_server, LISTING).await;
        mock_chat(&mut completion_server, "I am not sure").await;

        let mut config = config_for(&docs_server, &memory_server);
        config.completion = Some(completion_for(&completion_server));
        let agent = DocAgent::new(config).unwrap();

        let id = agent.resolve_library("fastapi").await.unwrap();
        assert_eq!(id.as_deref(), Some("/fastapi/fastapi"));
    }

    #[tokio::test]
    async fn test_completion_pick_overrides_ranking() {
        let mut docs_server = Server::new_async().await;
        let memory_server = Server::new_async().await;
        let mut completion_server = Server::new_async().await;

        mock_resolve(&mut docs_server, LISTING).await;
        mock_chat(&mut completion_server, "`/websites/fastapi`").await;

        let mut config = config_for(&docs_server, &memory_server);
        config.completion = Some(completion_for(&completion_server));
        let agent = DocAgent::new(config).unwrap();

        let id = agent.resolve_library("fastapi").await.unwrap();
        assert_eq!(id.as_deref(), Some("/websites/fastapi"));
        assert_eq!(agent.cache.get("fastapi").as_deref(), Some("/websites/fastapi"));
    }

    #[tokio::test]
    async fn test_trace_id_in_docs_block() {
        let mut docs_server = Server::new_async().await;
        let mut memory_server = Server::new_async().await;
        let mut opik_server = Server::new_async().await;

        mock_resolve(&mut docs_server, LISTING).await;
        mock_docs(&mut docs_server, "docs body").await;
        mock_memory_search(&mut memory_server, "{}").await;
        mock_store(&mut memory_server).await;
        let traces = opik_server
            .mock("POST", "/v1/private/traces/batch")
            .match_header("comet-workspace", "team")
            .with_status(200)
            .expect(1)
            .create_async()
            .await;
        let spans = opik_server
            .mock("POST", "/v1/private/spans/batch")
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let mut config = config_for(&docs_server, &memory_server);
        config.analytics = analytics_for(&opik_server);
        let agent = DocAgent::new(config).unwrap();

        let blocks = agent.get_library_docs("fastapi", None, "u").await.unwrap();
        let block = blocks.last().unwrap();
        let trace_id = block
            .split("Trace: `")
            .nth(1)
            .and_then(|rest| rest.split('`').next())
            .expect("trace id line");
        assert!(trace_id.parse::<uuid::Uuid>().is_ok(), "bad id {}", trace_id);

        traces.assert_async().await;
        spans.assert_async().await;
    }

    #[tokio::test]
    async fn test_analytics_outage_does_not_fail_query() {
        let mut docs_server = Server::new_async().await;
        let mut memory_server = Server::new_async().await;
        let mut opik_server = Server::new_async().await;

        mock_resolve(&mut docs_server, LISTING).await;
        mock_docs(&mut docs_server, "docs body").await;
        mock_memory_search(&mut memory_server, "{}").await;
        mock_store(&mut memory_server).await;
        let traces = opik_server
            .mock("POST", "/v1/private/traces/batch")
            .with_status(500)
            .with_body("down")
            .create_async()
            .await;

        let mut config = config_for(&docs_server, &memory_server);
        config.analytics = analytics_for(&opik_server);
        let agent = DocAgent::new(config).unwrap();

        let blocks = agent.get_library_docs("fastapi", None, "u").await.unwrap();
        assert!(blocks[0].contains("docs body"));
        assert!(!blocks[0].contains("Trace:"));
        assert_eq!(agent.stats.snapshot().libraries[0].1.successes, 1);
        traces.assert_async().await;
    }
}
