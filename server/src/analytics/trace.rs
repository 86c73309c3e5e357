//! Trace and span records for one tool call.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use uuid::Uuid;

use docagent_memory::preview;

/// Characters of documentation kept in a trace's output
pub const TRACE_DOCS_PREVIEW_CHARS: usize = 200;
/// Characters of a memory query kept in a span's input
pub const SPAN_QUERY_PREVIEW_CHARS: usize = 200;

fn end_of(start: DateTime<Utc>, elapsed: Duration) -> DateTime<Utc> {
    start + chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero())
}

/// Elapsed time in fractional milliseconds
pub fn millis(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1000.0
}

/// Memory service operation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryOperation {
    Search,
    Store,
}

impl MemoryOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryOperation::Search => "search",
            MemoryOperation::Store => "store",
        }
    }

    fn title(&self) -> &'static str {
        match self {
            MemoryOperation::Search => "Search",
            MemoryOperation::Store => "Store",
        }
    }
}

/// One outbound call inside a trace
#[derive(Debug, Clone, Serialize)]
pub struct SpanRecord {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub span_type: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub input: Value,
    pub output: Value,
    pub metadata: Value,
    pub tags: Vec<String>,
}

/// A documentation retrieval session and the calls it made
#[derive(Debug, Clone)]
pub struct SessionTrace {
    pub id: Uuid,
    pub name: String,
    pub user_id: String,
    pub library_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub input: Value,
    pub output: Value,
    pub metadata: Map<String, Value>,
    pub tags: Vec<String>,
    pub spans: Vec<SpanRecord>,
}

impl SessionTrace {
    pub fn start(library_name: &str, user_query: &str, user_id: &str) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: format!("Doc Retrieval: {}", library_name),
            user_id: user_id.to_string(),
            library_name: library_name.to_string(),
            start_time: Utc::now(),
            end_time: None,
            input: json!({
                "user_query": user_query,
                "library_requested": library_name,
                "user_id": user_id,
            }),
            output: Value::Null,
            metadata: Map::new(),
            tags: vec![
                "doc-retrieval".to_string(),
                library_name.to_string(),
                format!("user:{}", user_id),
            ],
            spans: Vec::new(),
        }
    }

    /// Record a memory search or store
    pub fn memory_span(
        &mut self,
        operation: MemoryOperation,
        query: &str,
        success: bool,
        result_count: usize,
        started_at: DateTime<Utc>,
        elapsed: Duration,
    ) {
        self.spans.push(SpanRecord {
            id: Uuid::now_v7(),
            name: format!("MemMachine {}", operation.title()),
            span_type: "tool".to_string(),
            start_time: started_at,
            end_time: end_of(started_at, elapsed),
            input: json!({
                "operation": operation.as_str(),
                "query": preview(query, SPAN_QUERY_PREVIEW_CHARS),
            }),
            output: json!({ "success": success, "result_count": result_count }),
            metadata: json!({
                "provider": "memmachine",
                "operation_type": operation.as_str(),
                "response_time_ms": millis(elapsed),
                "success": success,
            }),
            tags: vec![
                "memmachine".to_string(),
                operation.as_str().to_string(),
                "memory".to_string(),
            ],
        });
    }

    /// Record a Context7 resolve + fetch
    pub fn docs_span(
        &mut self,
        library_id: Option<&str>,
        success: bool,
        docs_length: usize,
        error: Option<&str>,
        started_at: DateTime<Utc>,
        elapsed: Duration,
    ) {
        self.spans.push(SpanRecord {
            id: Uuid::now_v7(),
            name: "Context7 API Call".to_string(),
            span_type: "tool".to_string(),
            start_time: started_at,
            end_time: end_of(started_at, elapsed),
            input: json!({
                "library_name": self.library_name,
                "request_type": "get_library_docs",
            }),
            output: json!({
                "success": success,
                "library_id": library_id,
                "docs_length": docs_length,
                "error": error,
            }),
            metadata: json!({
                "provider": "context7",
                "response_time_ms": millis(elapsed),
                "success": success,
            }),
            tags: vec![
                "context7".to_string(),
                "api-call".to_string(),
                self.library_name.clone(),
            ],
        });
    }

    /// Close the trace with its outcome
    pub fn finish(&mut self, library_id: &str, docs: &str, success: bool, has_memory_context: bool) {
        self.output = json!({
            "library_resolved": library_id,
            "docs_retrieved": !docs.is_empty(),
            "docs_preview": preview(docs, TRACE_DOCS_PREVIEW_CHARS),
            "success": success,
        });
        self.metadata.insert("user_id".into(), Value::from(self.user_id.clone()));
        self.metadata
            .insert("library_name".into(), Value::from(self.library_name.clone()));
        self.metadata
            .insert("library_id".into(), Value::from(library_id.to_string()));
        self.metadata.insert("context7_success".into(), Value::from(success));
        self.metadata
            .insert("docs_length".into(), Value::from(docs.chars().count()));
        self.metadata
            .insert("has_memmachine_context".into(), Value::from(has_memory_context));
        self.metadata
            .insert("timestamp".into(), Value::from(Utc::now().to_rfc3339()));
        self.end_time = Some(Utc::now());
    }

    pub fn set_meta(&mut self, key: &str, value: impl Into<Value>) {
        self.metadata.insert(key.to_string(), value.into());
    }

    /// Trace body in the analytics service's wire shape
    pub fn to_payload(&self, project_name: &str) -> Value {
        json!({
            "id": self.id,
            "project_name": project_name,
            "name": self.name,
            "start_time": self.start_time,
            "end_time": self.end_time.unwrap_or_else(Utc::now),
            "input": self.input,
            "output": self.output,
            "metadata": self.metadata,
            "tags": self.tags,
        })
    }

    /// Span bodies linked to this trace
    pub fn span_payloads(&self, project_name: &str) -> Vec<Value> {
        self.spans
            .iter()
            .map(|span| {
                let mut body = serde_json::to_value(span).unwrap_or(Value::Null);
                if let Value::Object(map) = &mut body {
                    map.insert("trace_id".into(), json!(self.id));
                    map.insert("project_name".into(), json!(project_name));
                }
                body
            })
            .collect()
    }
}
