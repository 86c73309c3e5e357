//! Text blocks returned to the editor.

use chrono::Local;
use serde_json::Value;

use crate::analytics::StatsSnapshot;
use docagent_memory::{build_context_prompt, MemoryHits};

/// Timings of one documentation retrieval, in milliseconds
#[derive(Debug, Clone, Copy, Default)]
pub struct Timings {
    pub memory_ms: f64,
    pub docs_ms: f64,
    pub store_ms: f64,
    pub total_ms: f64,
}

pub fn memory_context(hits: &MemoryHits, query: &str) -> String {
    format!(
        "🧠 **Memory Context Found** ({} similar queries)\n\n{}\n\n---\n",
        hits.len(),
        build_context_prompt(hits, query)
    )
}

pub struct DocsView<'a> {
    pub library_name: &'a str,
    pub library_id: &'a str,
    pub topic: Option<&'a str>,
    pub docs: &'a str,
    pub timings: Timings,
    pub trace_id: Option<String>,
}

pub fn documentation(view: &DocsView<'_>) -> String {
    let mut text = format!(
        "📚 **Latest Documentation: {}**\n\
         Source: Context7 ID `{}`\n\
         Topic: {}\n\
         Retrieved: {}\n\n\
         {}\n\n\
         ---\n\
         ⚡ Performance: Context7: {:.0}ms | Memory: {:.0}ms | Total: {:.0}ms",
        view.library_name,
        view.library_id,
        view.topic.unwrap_or("General"),
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        view.docs,
        view.timings.docs_ms,
        view.timings.memory_ms,
        view.timings.total_ms,
    );
    if let Some(trace_id) = &view.trace_id {
        text.push_str(&format!("\nTrace: `{}`", trace_id));
    }
    text
}

pub fn memory_search(query: &str, hits: &MemoryHits) -> String {
    format!(
        "🧠 **Memory Search Results**\n\
         Query: {}\n\
         Found: {} relevant memories\n\n\
         {}",
        query,
        hits.len(),
        build_context_prompt(hits, query)
    )
}

pub fn no_memory(query: &str) -> String {
    format!("🔍 No memory context found for query: '{}'", query)
}

pub fn library_history(library_name: &str, entries: &[Value]) -> String {
    if entries.is_empty() {
        return format!("🔍 No past retrievals of '{}' in memory", library_name);
    }

    let mut text = format!(
        "🗂️ **Past retrievals: {}** ({} found)\n",
        library_name,
        entries.len()
    );
    for (i, entry) in entries.iter().enumerate() {
        let line = match entry {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        text.push_str(&format!("\n{}. {}", i + 1, line));
    }
    text
}

pub struct AnalyticsView<'a> {
    pub project_name: &'a str,
    pub dashboard_url: &'a str,
    pub opik_enabled: bool,
    pub stats: &'a StatsSnapshot,
}

pub fn analytics(view: &AnalyticsView<'_>) -> String {
    let mut text = if view.opik_enabled {
        format!(
            "📊 **Agent Analytics**\n\
             Project: {}\n\
             Status: active\n\
             Opik Dashboard: {}\n",
            view.project_name, view.dashboard_url
        )
    } else {
        "📊 **Agent Analytics**\n\
         Opik analytics not available. Set OPIK_API_KEY (or OPIK_URL_OVERRIDE) to enable tracing.\n"
            .to_string()
    };

    let stats = view.stats;
    text.push_str(&format!(
        "\nSession: {} documentation queries | {} memory searches | {} feedback scores\n",
        stats.total_queries, stats.memory_searches, stats.feedback_logged
    ));
    for (name, usage) in &stats.libraries {
        text.push_str(&format!(
            "- {}: {} queries ({} ok, {} failed, {} with memory) avg {:.0}ms \
             (Context7 {:.0}ms, Memory {:.0}ms)\n",
            name,
            usage.queries,
            usage.successes,
            usage.failures,
            usage.memory_hits,
            usage.avg_total_ms(),
            usage.avg_docs_ms(),
            usage.avg_memory_ms()
        ));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::LibraryUsage;
    use serde_json::json;

    #[test]
    fn test_documentation_block() {
        let text = documentation(&DocsView {
            library_name: "fastapi",
            library_id: "/fastapi/fastapi",
            topic: None,
            docs: "Use @app.get()",
            timings: Timings {
                memory_ms: 12.4,
                docs_ms: 850.6,
                store_ms: 20.0,
                total_ms: 901.2,
            },
            trace_id: None,
        });
        assert!(text.starts_with("📚 **Latest Documentation: fastapi**"));
        assert!(text.contains("Source: Context7 ID `/fastapi/fastapi`"));
        assert!(text.contains("Topic: General"));
        assert!(text.contains("Context7: 851ms | Memory: 12ms | Total: 901ms"));
        assert!(!text.contains("Trace:"));
    }

    #[test]
    fn test_documentation_block_with_trace() {
        let text = documentation(&DocsView {
            library_name: "react",
            library_id: "/facebook/react",
            topic: Some("hooks"),
            docs: "useState",
            timings: Timings::default(),
            trace_id: Some("0190-abc".to_string()),
        });
        assert!(text.contains("Topic: hooks"));
        assert!(text.ends_with("Trace: `0190-abc`"));
    }

    #[test]
    fn test_memory_context_counts_episodes() {
        let hits = MemoryHits {
            episodic: vec![json!("a"), json!("b")],
            profile: vec![],
        };
        let text = memory_context(&hits, "q");
        assert!(text.contains("(2 similar queries)"));
        assert!(text.ends_with("---\n"));
    }

    #[test]
    fn test_library_history_empty() {
        assert_eq!(
            library_history("django", &[]),
            "🔍 No past retrievals of 'django' in memory"
        );
        let text = library_history("django", &[json!("first"), json!({"a": 1})]);
        assert!(text.contains("\n1. first"));
        assert!(text.contains("\n2. {\"a\":1}"));
    }

    #[test]
    fn test_analytics_disabled_still_lists_stats() {
        let stats = StatsSnapshot {
            total_queries: 2,
            memory_searches: 1,
            feedback_logged: 0,
            libraries: vec![(
                "tokio".to_string(),
                LibraryUsage {
                    queries: 2,
                    successes: 2,
                    total_ms: 400.0,
                    docs_ms: 300.0,
                    memory_ms: 60.0,
                    ..Default::default()
                },
            )],
        };
        let text = analytics(&AnalyticsView {
            project_name: "p",
            dashboard_url: "d",
            opik_enabled: false,
            stats: &stats,
        });
        assert!(text.contains("Opik analytics not available"));
        assert!(text.contains("- tokio: 2 queries (2 ok, 0 failed, 0 with memory) avg 200ms (Context7 150ms, Memory 30ms)"));
    }
}
