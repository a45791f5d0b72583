//! LLM provider trait and shared HTTP plumbing.
//!
//! Defines the `LlmProvider` trait that every backend implements. Two
//! backends exist:
//!
//! - [`openai`] — OpenAI-compatible `/chat/completions` (Groq by default)
//! - [`ollama`] — local Ollama daemon (`/api/generate`, `/api/chat`)
//!
//! Both expose the same two methods so the gateway can swap one for the
//! other without knowing which backend it is talking to.

pub mod ollama;
pub mod openai;
pub mod types;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub use types::{AllProvidersFailedError, ChatMessage, ProviderError, Role};

/// Trait for LLM providers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Short provider name used in logs and health reports (e.g. "groq").
    fn name(&self) -> &str;

    /// Generate text from a single prompt with an optional system prompt.
    async fn complete(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, ProviderError>;

    /// Generate the next assistant turn for a message history.
    async fn chat(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, ProviderError>;
}

// ── Error bodies ────────────────────────────────────────────────────

/// Error payloads seen in the wild: OpenAI-style `{"error": {"message"}}`,
/// Ollama-style `{"error": "..."}`, and arrays of the former.
#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorResponse {
    Nested { error: ErrorDetail },
    Flat { error: String },
    Multiple(Vec<NestedBody>),
}

#[derive(Deserialize)]
struct NestedBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

impl ErrorResponse {
    fn message(self) -> String {
        match self {
            Self::Nested { error } => error.message,
            Self::Flat { error } => error,
            Self::Multiple(v) => v
                .into_iter()
                .next()
                .map(|b| b.error.message)
                .unwrap_or_else(|| "Unknown error".into()),
        }
    }
}

/// Extract a readable error message from a non-2xx response body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body)
        .map(ErrorResponse::message)
        .unwrap_or_else(|_| body.trim().to_string())
}

fn transport_error(provider: &str, timeout: Duration, e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout {
            provider: provider.to_string(),
            timeout,
        }
    } else {
        ProviderError::Transport {
            provider: provider.to_string(),
            source: e,
        }
    }
}

/// POST a JSON body and decode a JSON response, bounded by `timeout`.
///
/// Any non-2xx status becomes [`ProviderError::Status`]; the call is never
/// retried here.
pub(crate) async fn post_json<B, R>(
    client: &Client,
    provider: &str,
    url: &str,
    bearer: Option<&str>,
    body: &B,
    timeout: Duration,
) -> Result<R, ProviderError>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let mut request = client.post(url).timeout(timeout).json(body);
    if let Some(key) = bearer {
        request = request.header("Authorization", format!("Bearer {key}"));
    }

    let response = request
        .send()
        .await
        .map_err(|e| transport_error(provider, timeout, e))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| transport_error(provider, timeout, e))?;

    debug!(provider, status = status.as_u16(), bytes = text.len(), "Provider responded");

    if !status.is_success() {
        return Err(ProviderError::Status {
            provider: provider.to_string(),
            status: status.as_u16(),
            message: error_message(&text),
        });
    }

    serde_json::from_str(&text).map_err(|e| ProviderError::Decode {
        provider: provider.to_string(),
        reason: e.to_string(),
    })
}
