//! Scripted in-process provider for gateway and agent tests.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::provider::{ChatMessage, LlmProvider, ProviderError};

#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

pub(crate) struct StubProvider {
    name: String,
    reply: Result<String, String>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl StubProvider {
    pub fn replying(name: &str, text: &str) -> Self {
        Self {
            name: name.into(),
            reply: Ok(text.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(name: &str, message: &str) -> Self {
        Self {
            name: name.into(),
            reply: Err(message.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_call(&self) -> Option<RecordedCall> {
        self.calls.lock().unwrap().last().cloned()
    }

    fn answer(&self, call: RecordedCall) -> Result<String, ProviderError> {
        self.calls.lock().unwrap().push(call);
        self.reply.clone().map_err(|message| ProviderError::Status {
            provider: self.name.clone(),
            status: 503,
            message,
        })
    }
}

#[async_trait]
impl LlmProvider for StubProvider {
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
        self.answer(RecordedCall {
            prompt: prompt.into(),
            system_prompt: system_prompt.map(str::to_string),
            temperature,
            max_tokens,
        })
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, ProviderError> {
        let prompt = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.answer(RecordedCall {
            prompt,
            system_prompt: None,
            temperature,
            max_tokens,
        })
    }
}
