//! In-process usage statistics.
//!
//! Counters live for the lifetime of the server process and back the
//! analytics tool's local report.

use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Outcome of one `get_library_docs` call
#[derive(Debug, Clone, Default)]
pub struct QueryOutcome {
    pub library_name: String,
    pub success: bool,
    pub memory_hit: bool,
    pub docs_ms: f64,
    pub memory_ms: f64,
    pub total_ms: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LibraryUsage {
    pub queries: u64,
    pub successes: u64,
    pub failures: u64,
    pub memory_hits: u64,
    pub total_ms: f64,
    pub docs_ms: f64,
    pub memory_ms: f64,
}

impl LibraryUsage {
    fn per_query(&self, sum: f64) -> f64 {
        if self.queries == 0 {
            0.0
        } else {
            sum / self.queries as f64
        }
    }

    pub fn avg_total_ms(&self) -> f64 {
        self.per_query(self.total_ms)
    }

    /// Average Context7 time, failed lookups included
    pub fn avg_docs_ms(&self) -> f64 {
        self.per_query(self.docs_ms)
    }

    pub fn avg_memory_ms(&self) -> f64 {
        self.per_query(self.memory_ms)
    }
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub total_queries: u64,
    pub memory_searches: u64,
    pub feedback_logged: u64,
    /// Sorted by query count, most used first
    pub libraries: Vec<(String, LibraryUsage)>,
}

#[derive(Debug, Default)]
pub struct UsageStats {
    libraries: DashMap<String, LibraryUsage>,
    total_queries: AtomicU64,
    memory_searches: AtomicU64,
    feedback_logged: AtomicU64,
}

impl UsageStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_query(&self, outcome: &QueryOutcome) {
        self.total_queries.fetch_add(1, Ordering::Relaxed);

        let key = outcome.library_name.to_lowercase();
        let mut usage = self.libraries.entry(key).or_default();
        usage.queries += 1;
        if outcome.success {
            usage.successes += 1;
        } else {
            usage.failures += 1;
        }
        if outcome.memory_hit {
            usage.memory_hits += 1;
        }
        usage.total_ms += outcome.total_ms;
        usage.docs_ms += outcome.docs_ms;
        usage.memory_ms += outcome.memory_ms;
    }

    pub fn record_memory_search(&self) {
        self.memory_searches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_feedback(&self) {
        self.feedback_logged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let mut libraries: Vec<(String, LibraryUsage)> = self
            .libraries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        libraries.sort_by(|a, b| b.1.queries.cmp(&a.1.queries).then_with(|| a.0.cmp(&b.0)));

        StatsSnapshot {
            total_queries: self.total_queries.load(Ordering::Relaxed),
            memory_searches: self.memory_searches.load(Ordering::Relaxed),
            feedback_logged: self.feedback_logged.load(Ordering::Relaxed),
            libraries,
        }
    }
}
