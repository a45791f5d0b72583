//! Local Ollama provider.
//!
//! `complete` goes through `/api/generate`, which has no system role, so the
//! system prompt is folded into the prompt text. `chat` goes through
//! `/api/chat` with native roles. Streaming is always disabled.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::types::{ChatMessage, ProviderError};
use super::{post_json, LlmProvider};

/// Local inference is slow on commodity hardware.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OllamaProvider {
    pub fn new(base_url: &str, model: &str, client: Client) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        debug!(base_url = %base_url, model, "Initialized Ollama provider");
        Self {
            client,
            base_url,
            model: model.to_string(),
            timeout: REQUEST_TIMEOUT,
        }
    }

    /// Override the per-request timeout (default [`REQUEST_TIMEOUT`]).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Merge a system prompt into the prompt text for `/api/generate`.
fn fold_system_prompt(prompt: &str, system_prompt: Option<&str>) -> String {
    match system_prompt.filter(|s| !s.is_empty()) {
        Some(system) => format!("{system}\n\n{prompt}"),
        None => prompt.to_string(),
    }
}

// ── Ollama API request/response types ───────────────────────────────

#[derive(Serialize)]
struct Options {
    temperature: f32,
    num_predict: u32,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: Options,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: Options,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, ProviderError> {
        let full_prompt = fold_system_prompt(prompt, system_prompt);
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model: &self.model,
            prompt: &full_prompt,
            stream: false,
            options: Options {
                temperature,
                num_predict: max_tokens,
            },
        };

        debug!(model = %self.model, url = %url, "Sending Ollama generate request");

        let res: GenerateResponse =
            post_json(&self.client, self.name(), &url, None, &body, self.timeout).await?;
        Ok(res.response)
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, ProviderError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
            options: Options {
                temperature,
                num_predict: max_tokens,
            },
        };

        debug!(model = %self.model, url = %url, msg_count = messages.len(), "Sending Ollama chat request");

        let res: ChatResponse =
            post_json(&self.client, self.name(), &url, None, &body, self.timeout).await?;
        Ok(res.message.content)
    }
}
