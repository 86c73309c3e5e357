//! Completion-service assisted library selection.
//!
//! Context7's directory often returns several plausible matches for a name
//! (a website mirror, a fork, the upstream repository). When an OpenAI-
//! compatible key is configured the agent asks the model to pick one; the
//! answer is only trusted if it names one of the candidates.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::docs::LibraryCandidate;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Completion service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Empty completion")]
    EmptyResponse,
}

#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl CompletionConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

fn selection_prompt(library_name: &str, candidates: &[LibraryCandidate]) -> String {
    let mut prompt = format!(
        "A developer asked for documentation of the library \"{}\".\n\
         Pick the single best matching library from this list. Prefer the \
         official upstream project over mirrors, forks and websites.\n\n",
        library_name
    );
    for c in candidates {
        prompt.push_str(&format!(
            "- id: {} | title: {} | snippets: {} | trust: {}\n",
            c.id,
            c.title.as_deref().unwrap_or("-"),
            c.code_snippets.map(|n| n.to_string()).unwrap_or_else(|| "-".into()),
            c.trust_score.map(|n| n.to_string()).unwrap_or_else(|| "-".into()),
        ));
    }
    prompt.push_str("\nAnswer with the id only.");
    prompt
}

/// Map a free-form model answer onto one of the candidate ids
fn match_answer<'a>(answer: &str, candidates: &'a [LibraryCandidate]) -> Option<&'a LibraryCandidate> {
    let answer = answer.trim().trim_matches(|c| c == '`' || c == '"' || c == '\'');
    candidates
        .iter()
        .find(|c| c.id == answer)
        .or_else(|| {
            // Longest id first so "/a/b-extra" is not shadowed by "/a/b"
            let mut by_len: Vec<&LibraryCandidate> = candidates.iter().collect();
            by_len.sort_by_key(|c| std::cmp::Reverse(c.id.len()));
            by_len.into_iter().find(|c| answer.contains(c.id.as_str()))
        })
}

pub struct CompletionClient {
    http: reqwest::Client,
    config: CompletionConfig,
}

impl CompletionClient {
    pub fn new(config: CompletionConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let body = json!({
            "model": self.config.model,
            "temperature": 0,
            "max_tokens": 64,
            "messages": [
                {"role": "system", "content": "You select software libraries. Reply with one id."},
                {"role": "user", "content": prompt},
            ],
        });

        let response = self
            .http
            .post(format!(
                "{}/chat/completions",
                self.config.base_url.trim_end_matches('/')
            ))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .timeout(self.config.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(CompletionError::EmptyResponse)
    }

    /// Ask the model to choose among `candidates`.
    ///
    /// Returns `Ok(None)` when the answer does not name a candidate.
    pub async fn choose_library<'a>(
        &self,
        library_name: &str,
        candidates: &'a [LibraryCandidate],
    ) -> Result<Option<&'a LibraryCandidate>, CompletionError> {
        if candidates.len() < 2 {
            return Ok(candidates.first());
        }

        let answer = self
            .complete(&selection_prompt(library_name, candidates))
            .await?;
        let chosen = match_answer(&answer, candidates);
        match chosen {
            Some(c) => tracing::debug!("Model picked '{}' for '{}'", c.id, library_name),
            None => tracing::warn!("Model answer '{}' matched no candidate", answer.trim()),
        }
        Ok(chosen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn candidates() -> Vec<LibraryCandidate> {
        vec![
            LibraryCandidate::new("/websites/memmachine_ai"),
            LibraryCandidate::new("/memmachine/memmachine"),
            LibraryCandidate::new("/memmachine/memmachine-docs"),
        ]
    }

    #[test]
    fn test_match_answer_exact_and_embedded() {
        let c = candidates();
        assert_eq!(
            match_answer("`/memmachine/memmachine`", &c).unwrap().id,
            "/memmachine/memmachine"
        );
        assert_eq!(
            match_answer("The best is /memmachine/memmachine-docs.", &c)
                .unwrap()
                .id,
            "/memmachine/memmachine-docs"
        );
        assert!(match_answer("/other/lib", &c).is_none());
    }

    #[test]
    fn test_prompt_lists_every_candidate() {
        let prompt = selection_prompt("MemMachine", &candidates());
        assert!(prompt.contains("\"MemMachine\""));
        assert_eq!(prompt.matches("- id: ").count(), 3);
    }

    #[tokio::test]
    async fn test_choose_library_uses_model_answer() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"/memmachine/memmachine"}}]}"#)
            .create_async()
            .await;

        let mut config = CompletionConfig::new("sk-test");
        config.base_url = server.url();
        let client = CompletionClient::new(config);

        let c = candidates();
        let chosen = client.choose_library("MemMachine", &c).await.unwrap();
        assert_eq!(chosen.unwrap().id, "/memmachine/memmachine");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_single_candidate_skips_model() {
        let client = CompletionClient::new(CompletionConfig::new("unused"));
        let c = vec![LibraryCandidate::new("/only/one")];
        let chosen = client.choose_library("one", &c).await.unwrap();
        assert_eq!(chosen.unwrap().id, "/only/one");
    }

    #[tokio::test]
    async fn test_status_error() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_body("slow down")
            .create_async()
            .await;

        let mut config = CompletionConfig::new("sk-test");
        config.base_url = server.url();
        let err = CompletionClient::new(config)
            .choose_library("MemMachine", &candidates())
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::Status { status: 429, .. }));
    }
}
