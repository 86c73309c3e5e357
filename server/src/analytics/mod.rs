//! Analytics: trace upload to Opik plus local usage counters.

pub mod client;
pub mod stats;
pub mod trace;

pub use client::{AnalyticsClient, AnalyticsConfig, DASHBOARD_URL, DEFAULT_PROJECT};
pub use stats::{LibraryUsage, QueryOutcome, StatsSnapshot, UsageStats};
pub use trace::{millis, MemoryOperation, SessionTrace, SpanRecord};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Opik returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Opik analytics not configured")]
    NotConfigured,

    #[error("Feedback score must be between 0.0 and 1.0, got {0}")]
    InvalidScore(f64),

    #[error("Invalid trace id: {0}")]
    InvalidTraceId(String),
}
