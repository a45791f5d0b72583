//! OpenAI-compatible LLM provider.
//!
//! Talks to any backend exposing `POST {base}/chat/completions` with bearer
//! auth. Groq is the default; OpenAI and OpenRouter share the same wire format
//! and only differ in base URL.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::types::{ChatMessage, ProviderError};
use super::{post_json, LlmProvider};

/// Known provider base URLs.
const PROVIDER_URLS: &[(&str, &str)] = &[
    ("groq", crate::config::GROQ_API_BASE),
    ("openai", "https://api.openai.com/v1"),
    ("openrouter", "https://openrouter.ai/api/v1"),
];

/// Remote inference is fast; anything slower than this is treated as a failure.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// OpenAI-compatible provider.
pub struct OpenAiProvider {
    client: Client,
    name: String,
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OpenAiProvider {
    /// Create a new provider.
    ///
    /// # Arguments
    /// * `provider_name` - Provider identifier (e.g., "groq", "openai")
    /// * `api_key` - API key for bearer authentication
    /// * `api_base` - Custom base URL (overrides the default for the provider)
    /// * `model` - Model identifier sent with every request
    pub fn new(
        provider_name: &str,
        api_key: &str,
        api_base: Option<&str>,
        model: &str,
        client: Client,
    ) -> Self {
        let base_url = api_base
            .map(|s| s.to_string())
            .unwrap_or_else(|| {
                PROVIDER_URLS
                    .iter()
                    .find(|(name, _)| *name == provider_name)
                    .map(|(_, url)| url.to_string())
                    .unwrap_or_else(|| crate::config::GROQ_API_BASE.to_string())
            })
            .trim_end_matches('/')
            .to_string();

        debug!(provider = provider_name, base_url = %base_url, model, "Initialized remote LLM provider");

        Self {
            client,
            name: provider_name.to_string(),
            api_key: api_key.to_string(),
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

// ── OpenAI API request/response types ───────────────────────────────

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageResponse,
}

#[derive(Deserialize)]
struct MessageResponse {
    content: Option<String>,
}

// ── LlmProvider implementation ──────────────────────────────────────

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, ProviderError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system_prompt.filter(|s| !s.is_empty()) {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(prompt));

        self.chat(&messages, temperature, max_tokens).await
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = CompletionRequest {
            model: &self.model,
            messages,
            temperature,
            max_tokens,
        };

        debug!(provider = %self.name, model = %self.model, url = %url, msg_count = messages.len(), "Sending chat completion request");

        let completion: CompletionResponse = post_json(
            &self.client,
            &self.name,
            &url,
            Some(&self.api_key),
            &body,
            self.timeout,
        )
        .await?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
            .ok_or_else(|| ProviderError::Decode {
                provider: self.name.clone(),
                reason: "response contained no choices".into(),
            })
    }
}
