//! LLM provider types shared across all provider implementations.
//!
//! These types define the contract between the gateway and any LLM backend.
//! Both the OpenAI-compatible and Ollama wire formats accept `ChatMessage`
//! serialized as `{"role": ..., "content": ...}`.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: &str) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: &str) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: &str) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Failure of a single provider call.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} API error ({status}): {message}")]
    Status {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("{provider} request timed out after {timeout:?}")]
    Timeout { provider: String, timeout: Duration },

    #[error("{provider} request failed: {source}")]
    Transport {
        provider: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} returned an unusable response: {reason}")]
    Decode { provider: String, reason: String },
}

impl ProviderError {
    /// Name of the provider that produced this error.
    pub fn provider(&self) -> &str {
        match self {
            Self::Status { provider, .. }
            | Self::Timeout { provider, .. }
            | Self::Transport { provider, .. }
            | Self::Decode { provider, .. } => provider,
        }
    }
}

/// Both the primary and the fallback provider failed within one gateway call.
///
/// `fallback` is `None` when no distinct fallback provider was available.
#[derive(Debug, Error)]
#[error("All LLM providers failed: {primary}")]
pub struct AllProvidersFailedError {
    #[source]
    pub primary: ProviderError,
    pub fallback: Option<ProviderError>,
}
