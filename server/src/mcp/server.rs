//! MCP server loop.
//!
//! Reads one request per line, routes it to the [`DocAgent`] and writes one
//! response per line. Requests are handled one at a time.

use super::protocol::*;
use super::resources::{get_all_resources, read_resource};
use super::tools::{self, get_all_tools, ToolArgs};
use super::transport::{Incoming, LineTransport, StdioTransport};
use crate::error::{AgentError, AgentResult};
use crate::pipeline::{DocAgent, HISTORY_LIMIT};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncWrite};

pub const SERVER_NAME: &str = "doc-injection-agent";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

pub struct McpServer {
    agent: Arc<DocAgent>,
}

fn to_result<T: Serialize>(id: Option<Value>, value: &T) -> JsonRpcResponse {
    match serde_json::to_value(value) {
        Ok(v) => JsonRpcResponse::success(id, v),
        Err(e) => JsonRpcResponse::error(id, JsonRpcError::internal_error(e.to_string())),
    }
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, JsonRpcError> {
    match params {
        Some(p) => serde_json::from_value(p)
            .map_err(|e| JsonRpcError::invalid_params(format!("Invalid params: {}", e))),
        None => Err(JsonRpcError::invalid_params("Missing params")),
    }
}

impl McpServer {
    pub fn new(agent: Arc<DocAgent>) -> Self {
        Self { agent }
    }

    /// Serve stdin/stdout until the client closes stdin
    pub async fn run(&mut self) -> std::io::Result<()> {
        let mut transport = StdioTransport::stdio();
        self.serve(&mut transport).await
    }

    pub async fn serve<R, W>(&mut self, transport: &mut LineTransport<R, W>) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        tracing::info!("MCP server starting...");

        while let Some(incoming) = transport.read_request().await? {
            match incoming {
                Incoming::Request(request) => {
                    if let Some(response) = self.handle_request(request).await {
                        transport.write_response(&response).await?;
                    }
                }
                Incoming::Malformed(e) => {
                    let response = JsonRpcResponse::error(
                        None,
                        JsonRpcError::parse_error(format!("Parse error: {}", e)),
                    );
                    transport.write_response(&response).await?;
                }
                Incoming::Empty => continue,
            }
        }

        tracing::info!("Client disconnected");
        Ok(())
    }

    /// Handle one message; notifications yield no response
    pub async fn handle_request(&mut self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        tracing::debug!("Handling request: {}", request.method);

        if request.is_notification() {
            match request.method.as_str() {
                "notifications/initialized" | "initialized" => {
                    tracing::info!("Client initialized");
                }
                "notifications/cancelled" => {
                    tracing::debug!("Client cancelled a request");
                }
                other => tracing::debug!("Ignoring notification: {}", other),
            }
            return None;
        }

        let id = request.id;
        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(id, request.params),
            // Some clients send these with an id
            "initialized" | "notifications/initialized" | "notifications/cancelled" => {
                JsonRpcResponse::success(id, Value::Null)
            }
            "ping" => JsonRpcResponse::success(id, Value::Object(serde_json::Map::new())),
            "tools/list" => to_result(
                id,
                &ToolsListResult {
                    tools: get_all_tools(self.agent.default_user()),
                },
            ),
            "tools/call" => self.handle_tools_call(id, request.params).await,
            "resources/list" => to_result(
                id,
                &ResourcesListResult {
                    resources: get_all_resources(),
                },
            ),
            "resources/read" => self.handle_resources_read(id, request.params).await,
            _ => JsonRpcResponse::error(id, JsonRpcError::method_not_found(&request.method)),
        };
        Some(response)
    }

    fn handle_initialize(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let params: InitializeParams = params
            .and_then(|p| serde_json::from_value(p).ok())
            .unwrap_or_default();
        if let Some(client) = &params.client_info {
            tracing::info!(
                "Initializing for {} {} (protocol {})",
                client.name,
                client.version.as_deref().unwrap_or("?"),
                params.protocol_version.as_deref().unwrap_or("?")
            );
        }

        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                resources: Some(ResourcesCapability {
                    subscribe: Some(false),
                    list_changed: Some(false),
                }),
                tools: Some(ToolsCapability {
                    list_changed: Some(false),
                }),
            },
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: Some(SERVER_VERSION.to_string()),
            },
        };
        to_result(id, &result)
    }

    async fn handle_tools_call(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let params: ToolCallParams = match parse_params(params) {
            Ok(p) => p,
            Err(e) => return JsonRpcResponse::error(id, e),
        };

        let result = match self.execute_tool(&params.name, params.arguments).await {
            Ok(Some(blocks)) => ToolCallResult::text(blocks),
            Ok(None) => {
                let err = AgentError::invalid_argument(format!("Unknown tool: {}", params.name));
                return JsonRpcResponse::error(id, err.into());
            }
            Err(e) => {
                tracing::warn!("Tool '{}' failed: {}", params.name, e);
                ToolCallResult::error(format!("❌ {}", e))
            }
        };
        to_result(id, &result)
    }

    async fn handle_resources_read(
        &self,
        id: Option<Value>,
        params: Option<Value>,
    ) -> JsonRpcResponse {
        let params: ResourceReadParams = match parse_params(params) {
            Ok(p) => p,
            Err(e) => return JsonRpcResponse::error(id, e),
        };

        match read_resource(&params.uri, &self.agent).await {
            Some(result) => to_result(id, &result),
            None => JsonRpcResponse::error(
                id,
                JsonRpcError::invalid_params(format!("Resource not found: {}", params.uri)),
            ),
        }
    }

    /// Run a tool; `Ok(None)` when the name is unknown
    async fn execute_tool(
        &self,
        name: &str,
        args: Option<Value>,
    ) -> AgentResult<Option<Vec<String>>> {
        if !tools::is_known(name) {
            return Ok(None);
        }
        let args = ToolArgs::new(args)?;
        let default_user = self.agent.default_user();

        let blocks = match name {
            tools::GET_LIBRARY_DOCS => {
                let library_name = args.required_str("library_name")?;
                let topic = args.optional_str("topic")?;
                let user_id = args.optional_str("user_id")?.unwrap_or(default_user);
                self.agent
                    .get_library_docs(library_name, topic, user_id)
                    .await?
            }
            tools::SEARCH_MEMORY => {
                let query = args.required_str("query")?;
                let user_id = args.optional_str("user_id")?.unwrap_or(default_user);
                vec![self.agent.search_memory(query, user_id).await?]
            }
            tools::GET_AGENT_ANALYTICS => vec![self.agent.analytics_report()],
            tools::GET_LIBRARY_HISTORY => {
                let library_name = args.required_str("library_name")?;
                let user_id = args.optional_str("user_id")?.unwrap_or(default_user);
                let limit = args.usize_or("limit", HISTORY_LIMIT)?;
                vec![
                    self.agent
                        .library_history(library_name, user_id, limit)
                        .await?,
                ]
            }
            tools::LOG_FEEDBACK => {
                let trace_id = args.required_str("trace_id")?;
                let score = args.required_f64("score")?;
                let comment = args.optional_str("comment")?;
                vec![self.agent.log_feedback(trace_id, score, comment).await?]
            }
            _ => return Ok(None),
        };
        Ok(Some(blocks))
    }
}
