//! Opik REST client.

use std::time::Duration;

use serde_json::{json, Value};
use uuid::Uuid;

use super::trace::SessionTrace;
use super::AnalyticsError;

pub const DEFAULT_BASE_URL: &str = "https://www.comet.com/opik/api";
pub const DEFAULT_PROJECT: &str = "doc-injection-agent";
pub const DASHBOARD_URL: &str = "https://www.comet.com/opik";
pub const FEEDBACK_SCORE_NAME: &str = "user_feedback";

#[derive(Debug, Clone)]
pub struct AnalyticsConfig {
    pub api_key: Option<String>,
    pub workspace: Option<String>,
    /// Self-hosted deployment; enables analytics without an API key
    pub url_override: Option<String>,
    pub project_name: String,
    pub timeout: Duration,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            workspace: None,
            url_override: None,
            project_name: DEFAULT_PROJECT.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl AnalyticsConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() || self.url_override.is_some()
    }

    pub fn base_url(&self) -> &str {
        self.url_override
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
    }
}

pub struct AnalyticsClient {
    http: reqwest::Client,
    config: AnalyticsConfig,
}

impl AnalyticsClient {
    pub fn new(config: AnalyticsConfig) -> Self {
        if config.is_configured() {
            tracing::info!(
                "Opik client initialized for project: {}",
                config.project_name
            );
        } else {
            tracing::warn!("Opik client not configured - analytics will be disabled");
        }
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    pub fn project_name(&self) -> &str {
        &self.config.project_name
    }

    pub fn dashboard_url(&self) -> &str {
        match &self.config.url_override {
            Some(url) => url.trim_end_matches('/'),
            None => DASHBOARD_URL,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .http
            .request(method, format!("{}{}", self.config.base_url(), path))
            .timeout(self.config.timeout);
        if let Some(key) = &self.config.api_key {
            builder = builder.header(reqwest::header::AUTHORIZATION, key);
        }
        if let Some(workspace) = &self.config.workspace {
            builder = builder.header("Comet-Workspace", workspace);
        }
        builder
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<(), AnalyticsError> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalyticsError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    /// Upload a finished trace and its spans
    pub async fn record(&self, trace: &SessionTrace) -> Result<(), AnalyticsError> {
        if !self.is_configured() {
            tracing::debug!("Opik client not configured, skipping trace");
            return Ok(());
        }

        let project = &self.config.project_name;
        let traces = json!({ "traces": [trace.to_payload(project)] });
        self.send(
            self.request(reqwest::Method::POST, "/v1/private/traces/batch")
                .json(&traces),
        )
        .await?;

        let spans = trace.span_payloads(project);
        if !spans.is_empty() {
            self.send(
                self.request(reqwest::Method::POST, "/v1/private/spans/batch")
                    .json(&json!({ "spans": spans })),
            )
            .await?;
        }

        tracing::info!(
            "Created Opik trace {} with {} spans for {}",
            trace.id,
            trace.spans.len(),
            trace.library_name
        );
        Ok(())
    }

    /// Attach a user feedback score (0.0 to 1.0) to a trace
    pub async fn log_feedback(
        &self,
        trace_id: &str,
        score: f64,
        comment: Option<&str>,
    ) -> Result<(), AnalyticsError> {
        if !self.is_configured() {
            return Err(AnalyticsError::NotConfigured);
        }
        if !(0.0..=1.0).contains(&score) {
            return Err(AnalyticsError::InvalidScore(score));
        }
        let trace_id: Uuid = trace_id
            .parse()
            .map_err(|_| AnalyticsError::InvalidTraceId(trace_id.to_string()))?;

        let mut body = json!({
            "name": FEEDBACK_SCORE_NAME,
            "value": score,
            "source": "sdk",
        });
        if let Some(comment) = comment {
            body["reason"] = Value::from(comment);
        }

        self.send(
            self.request(
                reqwest::Method::PUT,
                &format!("/v1/private/traces/{}/feedback-scores", trace_id),
            )
            .json(&body),
        )
        .await?;

        tracing::info!("Logged user feedback for trace {}: {}", trace_id, score);
        Ok(())
    }
}
