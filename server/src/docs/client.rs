//! Context7 client.
//!
//! Context7 exposes its directory through a hosted MCP endpoint, so each
//! lookup is a JSON-RPC `tools/call` sent over HTTP. The endpoint may answer
//! with plain JSON or with a single-message SSE stream.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};

use super::library::{parse_candidates, LibraryCandidate};
use super::DocsError;

pub const DEFAULT_ENDPOINT: &str = "https://mcp.context7.com/mcp";

/// Lower bound accepted by `get-library-docs`
pub const MIN_TOKENS: u32 = 1000;
pub const DEFAULT_TOKENS: u32 = 3000;

#[derive(Debug, Clone)]
pub struct DocsClientConfig {
    pub endpoint: String,
    pub api_key: String,
    pub resolve_timeout: Duration,
    pub docs_timeout: Duration,
}

impl DocsClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: api_key.into(),
            resolve_timeout: Duration::from_secs(10),
            docs_timeout: Duration::from_secs(15),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct RpcMessage {
    #[serde(default)]
    result: Option<ToolResult>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolResult {
    #[serde(default)]
    content: Vec<ContentItem>,
    #[serde(default)]
    is_error: bool,
}

#[derive(Debug, Deserialize)]
struct ContentItem {
    #[serde(default)]
    text: Option<String>,
}

/// Extract the JSON-RPC message from a response body.
///
/// SSE bodies carry it on `data:` lines; the last line that parses as a
/// response wins.
fn parse_rpc_body(body: &str, is_event_stream: bool) -> Result<RpcMessage, DocsError> {
    if !is_event_stream {
        return Ok(serde_json::from_str(body)?);
    }

    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .filter_map(|data| serde_json::from_str::<RpcMessage>(data.trim()).ok())
        .filter(|msg| msg.result.is_some() || msg.error.is_some())
        .last()
        .ok_or_else(|| DocsError::malformed("event stream carried no JSON-RPC response"))
}

pub struct DocsClient {
    http: reqwest::Client,
    config: DocsClientConfig,
    next_id: AtomicU64,
}

impl DocsClient {
    pub fn new(config: DocsClientConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    /// Call one Context7 tool and return its text items
    async fn call_tool(
        &self,
        tool: &str,
        arguments: Value,
        timeout: Duration,
    ) -> Result<Vec<String>, DocsError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": "tools/call",
            "params": { "name": tool, "arguments": arguments },
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
        });

        let response = self
            .http
            .post(&self.config.endpoint)
            .header("CONTEXT7_API_KEY", &self.config.api_key)
            .header("Accept", "application/json, text/event-stream")
            .json(&payload)
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status();
        let is_event_stream = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("text/event-stream"));
        let body = response.text().await?;

        if !status.is_success() {
            return Err(DocsError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let message = parse_rpc_body(&body, is_event_stream)?;
        if let Some(err) = message.error {
            return Err(DocsError::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        let result = message.result.unwrap_or_default();
        let texts: Vec<String> = result
            .content
            .into_iter()
            .filter_map(|item| item.text)
            .filter(|text| !text.is_empty())
            .collect();

        if result.is_error {
            return Err(DocsError::Tool(texts.join("\n")));
        }
        Ok(texts)
    }

    /// All libraries matching `library_name`, in Context7's ranking order
    pub async fn resolve_candidates(
        &self,
        library_name: &str,
    ) -> Result<Vec<LibraryCandidate>, DocsError> {
        let texts = self
            .call_tool(
                "resolve-library-id",
                json!({ "libraryName": library_name }),
                self.config.resolve_timeout,
            )
            .await?;

        let candidates = texts
            .first()
            .map(|listing| parse_candidates(listing))
            .unwrap_or_default();

        if candidates.is_empty() {
            tracing::warn!("Could not resolve library: {}", library_name);
        }
        Ok(candidates)
    }

    /// Fetch documentation text; empty when Context7 had nothing
    pub async fn get_docs(
        &self,
        library_id: &str,
        topic: Option<&str>,
        tokens: u32,
    ) -> Result<String, DocsError> {
        let mut arguments = json!({
            "context7CompatibleLibraryID": library_id,
            "tokens": tokens.max(MIN_TOKENS),
        });
        if let Some(topic) = topic.filter(|t| !t.is_empty()) {
            arguments["topic"] = Value::from(topic);
        }

        let docs = self
            .call_tool("get-library-docs", arguments, self.config.docs_timeout)
            .await?
            .join("\n");

        if docs.is_empty() {
            tracing::warn!("No documentation found for library: {}", library_id);
        } else {
            tracing::info!(
                "Retrieved {} chars of docs for '{}'",
                docs.chars().count(),
                library_id
            );
        }
        Ok(docs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn client_for(server: &Server) -> DocsClient {
        DocsClient::new(DocsClientConfig::new("test-key").with_endpoint(format!("{}/mcp", server.url())))
    }

    fn tool_response(texts: &[&str]) -> String {
        let content: Vec<Value> = texts
            .iter()
            .map(|t| json!({"type": "text", "text": t}))
            .collect();
        json!({"jsonrpc": "2.0", "id": 1, "result": {"content": content}}).to_string()
    }

    #[test]
    fn test_parse_event_stream_body() {
        let body = format!(
            "event: message\ndata: {}\n\n",
            tool_response(&["hello"])
        );
        let msg = parse_rpc_body(&body, true).unwrap();
        assert_eq!(msg.result.unwrap().content.len(), 1);
    }

    #[test]
    fn test_parse_event_stream_without_message() {
        let err = parse_rpc_body("event: ping\n\n", true).unwrap_err();
        assert!(matches!(err, DocsError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_resolve_candidates_sends_key_and_parses() {
        let mut server = Server::new_async().await;
        let listing = "- Title: Axum\n- Context7-compatible library ID: /tokio-rs/axum\n";
        let mock = server
            .mock("POST", "/mcp")
            .match_header("CONTEXT7_API_KEY", "test-key")
            .match_body(Matcher::PartialJson(json!({
                "method": "tools/call",
                "params": {"name": "resolve-library-id", "arguments": {"libraryName": "axum"}}
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(tool_response(&[listing]))
            .create_async()
            .await;

        let candidates = client_for(&server).resolve_candidates("axum").await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, "/tokio-rs/axum");
        assert_eq!(candidates[0].title.as_deref(), Some("Axum"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_docs_clamps_tokens_and_joins_text() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/mcp")
            .match_body(Matcher::PartialJson(json!({
                "params": {
                    "name": "get-library-docs",
                    "arguments": {
                        "context7CompatibleLibraryID": "/fastapi/fastapi",
                        "tokens": 1000,
                        "topic": "streaming"
                    }
                }
            })))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(format!(
                "event: message\ndata: {}\n\n",
                tool_response(&["part one", "", "part two"])
            ))
            .create_async()
            .await;

        let docs = client_for(&server)
            .get_docs("/fastapi/fastapi", Some("streaming"), 200)
            .await
            .unwrap();
        assert_eq!(docs, "part one\npart two");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rpc_error_is_surfaced() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/mcp")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32602,"message":"bad args"}}"#)
            .create_async()
            .await;

        let err = client_for(&server)
            .get_docs("/x/y", None, 3000)
            .await
            .unwrap_err();
        assert!(matches!(err, DocsError::Rpc { code: -32602, .. }));
    }

    #[tokio::test]
    async fn test_http_status_error() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/mcp")
            .with_status(401)
            .with_body("unauthorized")
            .create_async()
            .await;

        let err = client_for(&server).resolve_candidates("x").await.unwrap_err();
        assert!(matches!(err, DocsError::Status { status: 401, .. }));
    }
}
