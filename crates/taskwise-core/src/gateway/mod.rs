//! LLM gateway: one primary provider plus a local fallback.
//!
//! Every call goes to the primary first. If it fails for any reason the same
//! request is sent once to the fallback, strictly after the primary has
//! returned. The caller only sees the text; which provider produced it is
//! visible in the logs, not in the return value.

#[cfg(test)]
pub(crate) mod stub;

use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::config::LlmConfig;
use crate::provider::ollama::OllamaProvider;
use crate::provider::openai::OpenAiProvider;
use crate::provider::{AllProvidersFailedError, ChatMessage, LlmProvider, ProviderError};

/// Prompt and token cap used by `health_check` probes.
const PROBE_PROMPT: &str = "Hello";
const PROBE_MAX_TOKENS: u32 = 10;

/// Availability of one provider as seen by `health_check`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ProviderHealth {
    Ok { provider: String },
    Error { error: String },
}

impl ProviderHealth {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub primary: ProviderHealth,
    pub fallback: ProviderHealth,
}

/// Primary/fallback LLM gateway.
///
/// Immutable after construction; share it behind an `Arc`.
pub struct LlmGateway {
    primary: Arc<dyn LlmProvider>,
    fallback: Arc<dyn LlmProvider>,
    temperature: f32,
    max_tokens: u32,
}

impl LlmGateway {
    /// Build a gateway from explicit providers and generation defaults.
    ///
    /// Passing the same `Arc` for both disables the fallback hop.
    pub fn new(
        primary: Arc<dyn LlmProvider>,
        fallback: Arc<dyn LlmProvider>,
        temperature: f32,
        max_tokens: u32,
    ) -> Self {
        Self {
            primary,
            fallback,
            temperature,
            max_tokens,
        }
    }

    /// Build the gateway described by the configuration.
    ///
    /// The remote provider is primary only when it is selected and has an API
    /// key; otherwise Ollama is primary. An Ollama fallback is always built.
    pub fn from_config(config: &LlmConfig, client: Client) -> Self {
        let fallback: Arc<dyn LlmProvider> = Arc::new(OllamaProvider::new(
            &config.ollama.base_url,
            &config.ollama.model,
            client.clone(),
        ));

        let primary: Arc<dyn LlmProvider> = if config.use_remote_primary() {
            Arc::new(OpenAiProvider::new(
                config.provider.as_str(),
                &config.groq.api_key,
                config.groq.api_base.as_deref(),
                &config.groq.model,
                client,
            ))
        } else {
            Arc::new(OllamaProvider::new(
                &config.ollama.base_url,
                &config.ollama.model,
                client,
            ))
        };

        debug!(primary = primary.name(), fallback = fallback.name(), "LLM gateway ready");

        Self::new(primary, fallback, config.temperature, config.max_tokens)
    }

    pub fn primary_name(&self) -> &str {
        self.primary.name()
    }

    pub fn fallback_name(&self) -> &str {
        self.fallback.name()
    }

    fn has_distinct_fallback(&self) -> bool {
        !Arc::ptr_eq(&self.primary, &self.fallback)
    }

    fn resolve(&self, temperature: Option<f32>, max_tokens: Option<u32>) -> (f32, u32) {
        (
            temperature.unwrap_or(self.temperature),
            max_tokens.unwrap_or(self.max_tokens),
        )
    }

    /// Generate text for a single prompt, falling back once on failure.
    pub async fn complete(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        temperature: Option<f32>,
        max_tokens: Option<u32>,
    ) -> Result<String, AllProvidersFailedError> {
        let (temperature, max_tokens) = self.resolve(temperature, max_tokens);

        let primary_err = match self
            .primary
            .complete(prompt, system_prompt, temperature, max_tokens)
            .await
        {
            Ok(text) => return Ok(text),
            Err(e) => e,
        };

        if !self.has_distinct_fallback() {
            return Err(self.exhausted("complete", primary_err, None));
        }
        warn!(
            provider = self.primary.name(),
            fallback = self.fallback.name(),
            error = %primary_err,
            "Primary provider failed, trying fallback"
        );

        self.fallback
            .complete(prompt, system_prompt, temperature, max_tokens)
            .await
            .map_err(|e| self.exhausted("complete", primary_err, Some(e)))
    }

    /// Generate the next assistant turn for a conversation, falling back once.
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        temperature: Option<f32>,
        max_tokens: Option<u32>,
    ) -> Result<String, AllProvidersFailedError> {
        let (temperature, max_tokens) = self.resolve(temperature, max_tokens);

        let primary_err = match self.primary.chat(messages, temperature, max_tokens).await {
            Ok(text) => return Ok(text),
            Err(e) => e,
        };

        if !self.has_distinct_fallback() {
            return Err(self.exhausted("chat", primary_err, None));
        }
        warn!(
            provider = self.primary.name(),
            fallback = self.fallback.name(),
            error = %primary_err,
            "Primary provider failed, trying fallback"
        );

        self.fallback
            .chat(messages, temperature, max_tokens)
            .await
            .map_err(|e| self.exhausted("chat", primary_err, Some(e)))
    }

    fn exhausted(
        &self,
        op: &str,
        primary: ProviderError,
        fallback: Option<ProviderError>,
    ) -> AllProvidersFailedError {
        error!(
            op,
            primary_error = %primary,
            fallback_error = ?fallback.as_ref().map(ToString::to_string),
            "All LLM providers failed"
        );
        AllProvidersFailedError { primary, fallback }
    }

    /// Probe both providers independently. Never fails.
    pub async fn health_check(&self) -> HealthReport {
        HealthReport {
            primary: self.probe(self.primary.as_ref()).await,
            fallback: self.probe(self.fallback.as_ref()).await,
        }
    }

    async fn probe(&self, provider: &dyn LlmProvider) -> ProviderHealth {
        match provider
            .complete(PROBE_PROMPT, None, self.temperature, PROBE_MAX_TOKENS)
            .await
        {
            Ok(_) => ProviderHealth::Ok {
                provider: provider.name().to_string(),
            },
            Err(e) => {
                debug!(provider = provider.name(), error = %e, "Health probe failed");
                ProviderHealth::Error {
                    error: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::stub::StubProvider;
    use super::*;
    use crate::config::ProviderKind;

    fn gateway(primary: &Arc<StubProvider>, fallback: &Arc<StubProvider>) -> LlmGateway {
        LlmGateway::new(primary.clone(), fallback.clone(), 0.7, 1024)
    }

    #[tokio::test]
    async fn test_primary_success_skips_fallback() {
        let primary = Arc::new(StubProvider::replying("groq", "from primary"));
        let fallback = Arc::new(StubProvider::replying("ollama", "from fallback"));

        let text = gateway(&primary, &fallback).complete("hi", None, None, None).await.unwrap();
        assert_eq!(text, "from primary");
        assert_eq!(fallback.call_count(), 0);
    }

    #[tokio::test]
    async fn test_fallback_serves_when_primary_fails() {
        let primary = Arc::new(StubProvider::failing("groq", "rate limited"));
        let fallback = Arc::new(StubProvider::replying("ollama", "from fallback"));
        let gw = gateway(&primary, &fallback);

        assert_eq!(gw.complete("hi", Some("sys"), None, None).await.unwrap(), "from fallback");
        assert_eq!(gw.chat(&[ChatMessage::user("hi")], None, None).await.unwrap(), "from fallback");
        assert_eq!(primary.call_count(), 2);
        assert_eq!(fallback.call_count(), 2);

        let call = fallback.last_call().unwrap();
        assert_eq!(call.prompt, "hi");
    }

    #[tokio::test]
    async fn test_both_failing_reports_primary_error() {
        let primary = Arc::new(StubProvider::failing("groq", "bad key"));
        let fallback = Arc::new(StubProvider::failing("ollama", "connection refused"));
        let gw = gateway(&primary, &fallback);

        let err = gw.complete("hi", None, None, None).await.unwrap_err();
        assert!(err.to_string().starts_with("All LLM providers failed"));
        assert!(err.to_string().contains("bad key"));
        assert!(err.fallback.as_ref().unwrap().to_string().contains("connection refused"));

        let err = gw.chat(&[ChatMessage::user("hi")], None, None).await.unwrap_err();
        assert_eq!(err.primary.provider(), "groq");
    }

    #[tokio::test]
    async fn test_same_instance_is_not_retried() {
        let only = Arc::new(StubProvider::failing("ollama", "down"));
        let gw = LlmGateway::new(only.clone(), only.clone(), 0.7, 1024);

        let err = gw.complete("hi", None, None, None).await.unwrap_err();
        assert!(err.fallback.is_none());
        assert_eq!(only.call_count(), 1);
    }

    #[tokio::test]
    async fn test_defaults_applied_and_explicit_zero_kept() {
        let primary = Arc::new(StubProvider::replying("groq", "ok"));
        let fallback = Arc::new(StubProvider::replying("ollama", "ok"));
        let gw = LlmGateway::new(primary.clone(), fallback.clone(), 0.7, 1024);

        gw.complete("hi", None, None, None).await.unwrap();
        let call = primary.last_call().unwrap();
        assert!((call.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(call.max_tokens, 1024);

        gw.complete("hi", None, Some(0.0), Some(50)).await.unwrap();
        let call = primary.last_call().unwrap();
        assert_eq!(call.temperature, 0.0);
        assert_eq!(call.max_tokens, 50);
    }

    #[tokio::test]
    async fn test_health_check_never_fails() {
        let primary = Arc::new(StubProvider::failing("groq", "bad key"));
        let fallback = Arc::new(StubProvider::failing("ollama", "down"));

        let report = gateway(&primary, &fallback).health_check().await;
        assert!(!report.primary.is_ok());
        assert!(!report.fallback.is_ok());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["primary"]["status"], "error");
        assert!(json["fallback"]["error"].as_str().unwrap().contains("down"));
    }

    #[tokio::test]
    async fn test_health_check_probes_in_isolation() {
        let primary = Arc::new(StubProvider::replying("groq", "Hi"));
        let fallback = Arc::new(StubProvider::failing("ollama", "down"));

        let report = gateway(&primary, &fallback).health_check().await;
        assert_eq!(report.primary, ProviderHealth::Ok { provider: "groq".into() });
        assert!(!report.fallback.is_ok());

        let probe = primary.last_call().unwrap();
        assert_eq!(probe.prompt, "Hello");
        assert_eq!(probe.max_tokens, 10);
    }

    #[test]
    fn test_from_config_selects_primary() {
        let mut config = LlmConfig::default();
        let gw = LlmGateway::from_config(&config, Client::new());
        assert_eq!(gw.primary_name(), "ollama");
        assert_eq!(gw.fallback_name(), "ollama");
        assert!(gw.has_distinct_fallback());

        config.groq.api_key = "gsk_real".into();
        let gw = LlmGateway::from_config(&config, Client::new());
        assert_eq!(gw.primary_name(), "groq");

        config.provider = ProviderKind::Ollama;
        let gw = LlmGateway::from_config(&config, Client::new());
        assert_eq!(gw.primary_name(), "ollama");
    }
}
