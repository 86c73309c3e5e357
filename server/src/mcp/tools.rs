//! Tool definitions and argument handling.

use super::protocol::{PropertySchema, Tool, ToolInputSchema};
use crate::error::{AgentError, AgentResult};
use crate::pipeline::HISTORY_LIMIT;
use serde_json::Value;
use std::collections::HashMap;

pub const GET_LIBRARY_DOCS: &str = "get_library_docs";
pub const SEARCH_MEMORY: &str = "search_memory";
pub const GET_AGENT_ANALYTICS: &str = "get_agent_analytics";
pub const GET_LIBRARY_HISTORY: &str = "get_library_history";
pub const LOG_FEEDBACK: &str = "log_feedback";

const TOOL_NAMES: &[&str] = &[
    GET_LIBRARY_DOCS,
    SEARCH_MEMORY,
    GET_AGENT_ANALYTICS,
    GET_LIBRARY_HISTORY,
    LOG_FEEDBACK,
];

pub fn is_known(name: &str) -> bool {
    TOOL_NAMES.contains(&name)
}

/// All tools served by the agent
pub fn get_all_tools(default_user: &str) -> Vec<Tool> {
    vec![
        library_docs_tool(default_user),
        search_memory_tool(default_user),
        analytics_tool(),
        library_history_tool(default_user),
        feedback_tool(),
    ]
}

fn string_prop(description: &str, default: Option<&str>) -> PropertySchema {
    PropertySchema {
        property_type: "string".to_string(),
        description: Some(description.to_string()),
        default: default.map(Value::from),
        minimum: None,
        maximum: None,
    }
}

fn number_prop(
    description: &str,
    default: Option<f64>,
    range: Option<(f64, f64)>,
) -> PropertySchema {
    PropertySchema {
        property_type: "number".to_string(),
        description: Some(description.to_string()),
        default: default.map(Value::from),
        minimum: range.map(|(min, _)| min),
        maximum: range.map(|(_, max)| max),
    }
}

fn tool(
    name: &str,
    description: &str,
    properties: HashMap<String, PropertySchema>,
    required: &[&str],
) -> Tool {
    Tool {
        name: name.to_string(),
        description: Some(description.to_string()),
        input_schema: ToolInputSchema {
            schema_type: "object".to_string(),
            properties,
            required: required.iter().map(|r| r.to_string()).collect(),
        },
    }
}

fn user_prop(default_user: &str) -> PropertySchema {
    string_prop("User identifier for personalized memory", Some(default_user))
}

fn library_docs_tool(default_user: &str) -> Tool {
    let mut properties = HashMap::new();
    properties.insert(
        "library_name".to_string(),
        string_prop(
            "Name of the library (e.g., 'fastapi', 'react', 'memmachine')",
            None,
        ),
    );
    properties.insert(
        "topic".to_string(),
        string_prop(
            "Specific topic to focus on (e.g., 'authentication', 'routing')",
            None,
        ),
    );
    properties.insert("user_id".to_string(), user_prop(default_user));

    tool(
        GET_LIBRARY_DOCS,
        "Get latest documentation for a library with memory context and analytics",
        properties,
        &["library_name"],
    )
}

fn search_memory_tool(default_user: &str) -> Tool {
    let mut properties = HashMap::new();
    properties.insert(
        "query".to_string(),
        string_prop("Search query for past interactions", None),
    );
    properties.insert("user_id".to_string(), user_prop(default_user));

    tool(
        SEARCH_MEMORY,
        "Search past documentation queries and user preferences",
        properties,
        &["query"],
    )
}

fn analytics_tool() -> Tool {
    tool(
        GET_AGENT_ANALYTICS,
        "Get agent performance analytics and the Opik dashboard link",
        HashMap::new(),
        &[],
    )
}

fn library_history_tool(default_user: &str) -> Tool {
    let mut properties = HashMap::new();
    properties.insert(
        "library_name".to_string(),
        string_prop("Library to list past retrievals for", None),
    );
    properties.insert("user_id".to_string(), user_prop(default_user));
    properties.insert(
        "limit".to_string(),
        number_prop(
            "Maximum number of past retrievals",
            Some(HISTORY_LIMIT as f64),
            None,
        ),
    );

    tool(
        GET_LIBRARY_HISTORY,
        "List past documentation retrievals for one library",
        properties,
        &["library_name"],
    )
}

fn feedback_tool() -> Tool {
    let mut properties = HashMap::new();
    properties.insert(
        "trace_id".to_string(),
        string_prop("Trace id shown under a documentation answer", None),
    );
    properties.insert(
        "score".to_string(),
        number_prop("Usefulness score", None, Some((0.0, 1.0))),
    );
    properties.insert(
        "comment".to_string(),
        string_prop("Optional free-text reason", None),
    );

    tool(
        LOG_FEEDBACK,
        "Rate a documentation answer so its trace carries user feedback",
        properties,
        &["trace_id", "score"],
    )
}

/// Typed view over a `tools/call` arguments object
pub struct ToolArgs {
    args: Value,
}

impl ToolArgs {
    pub fn new(args: Option<Value>) -> AgentResult<Self> {
        match args {
            None | Some(Value::Null) => Ok(Self {
                args: Value::Object(serde_json::Map::new()),
            }),
            Some(args @ Value::Object(_)) => Ok(Self { args }),
            Some(_) => Err(AgentError::invalid_argument(
                "Tool arguments must be an object",
            )),
        }
    }

    pub fn required_str(&self, name: &str) -> AgentResult<&str> {
        self.optional_str(name)?
            .ok_or_else(|| AgentError::invalid_argument(format!("Missing '{}' parameter", name)))
    }

    pub fn optional_str(&self, name: &str) -> AgentResult<Option<&str>> {
        match self.args.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(AgentError::invalid_argument(format!(
                "'{}' must be a string",
                name
            ))),
        }
    }

    pub fn required_f64(&self, name: &str) -> AgentResult<f64> {
        match self.args.get(name) {
            Some(v) => v.as_f64().ok_or_else(|| {
                AgentError::invalid_argument(format!("'{}' must be a number", name))
            }),
            None => Err(AgentError::invalid_argument(format!(
                "Missing '{}' parameter",
                name
            ))),
        }
    }

    pub fn usize_or(&self, name: &str, default: usize) -> AgentResult<usize> {
        match self.args.get(name) {
            None | Some(Value::Null) => Ok(default),
            Some(v) => v
                .as_u64()
                .or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
                .map(|n| n as usize)
                .ok_or_else(|| {
                    AgentError::invalid_argument(format!(
                        "'{}' must be a non-negative number",
                        name
                    ))
                }),
        }
    }
}
