//! Chat agent: free-form conversation grounded in the user's task list.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use super::prompt::task_line;
use super::types::{AgentResponse, AgentType, TaskSnapshot};
use super::Agent;
use crate::gateway::LlmGateway;

const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 500;

/// Longest accepted user message, in characters.
pub const MAX_MESSAGE_CHARS: usize = 2000;

/// Tasks beyond this many are left out of the context.
pub const MAX_CONTEXT_TASKS: usize = 20;

const SYSTEM_PROMPT: &str = "You are a helpful AI task management assistant. You help users manage their todo list.";

const GUIDANCE: &str = "Be helpful, concise, and actionable in your responses. If the user asks about prioritization, suggest specific tasks to focus on. If they ask about breaking down tasks, provide concrete subtasks.";

/// Why a chat message was rejected before reaching the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidMessage {
    #[error("Message is required.")]
    Empty,

    #[error("Message must be at most {MAX_MESSAGE_CHARS} characters.")]
    TooLong,
}

/// Trim a user message and check it is 1 to [`MAX_MESSAGE_CHARS`] characters.
pub fn validate_message(message: &str) -> Result<&str, InvalidMessage> {
    let message = message.trim();
    if message.is_empty() {
        Err(InvalidMessage::Empty)
    } else if message.chars().count() > MAX_MESSAGE_CHARS {
        Err(InvalidMessage::TooLong)
    } else {
        Ok(message)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChatInput {
    pub message: String,
    pub tasks: Vec<TaskSnapshot>,
}

pub struct ChatAgent {
    gateway: Arc<LlmGateway>,
}

impl ChatAgent {
    pub fn new(gateway: Arc<LlmGateway>) -> Self {
        Self { gateway }
    }

    fn full_system_prompt(&self, tasks: &[TaskSnapshot]) -> String {
        let context = tasks
            .iter()
            .take(MAX_CONTEXT_TASKS)
            .map(task_line)
            .collect::<Vec<_>>()
            .join("\n");
        format!("{SYSTEM_PROMPT}\n\nUser's current tasks:\n{context}\n\n{GUIDANCE}")
    }
}

#[async_trait]
impl Agent for ChatAgent {
    type Input = ChatInput;

    fn agent_type(&self) -> AgentType {
        AgentType::Chat
    }

    fn system_prompt(&self) -> &str {
        SYSTEM_PROMPT
    }

    async fn execute(&self, input: ChatInput) -> AgentResponse {
        let message = match validate_message(&input.message) {
            Ok(message) => message,
            Err(e) => {
                let reason = match e {
                    InvalidMessage::Empty => "Empty message",
                    InvalidMessage::TooLong => "Message too long",
                };
                return AgentResponse::failed(self.agent_type(), e.to_string(), reason);
            }
        };

        let system_prompt = self.full_system_prompt(&input.tasks);

        match self
            .gateway
            .complete(message, Some(&system_prompt), Some(TEMPERATURE), Some(MAX_TOKENS))
            .await
        {
            Ok(reply) => {
                info!(agent = %self.agent_type(), reply_len = reply.len(), "Chat reply ready");
                AgentResponse::succeeded(self.agent_type(), json!({ "response": &reply }), reply)
            }
            Err(e) => {
                warn!(agent = %self.agent_type(), error = %e, "Chat failed");
                AgentResponse::failed(
                    self.agent_type(),
                    format!("Failed to get response: {e}"),
                    e.to_string(),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::types::TaskPriority;
    use crate::gateway::stub::StubProvider;

    fn agent_with(primary: &Arc<StubProvider>) -> ChatAgent {
        let fallback = Arc::new(StubProvider::failing("ollama", "offline"));
        ChatAgent::new(Arc::new(LlmGateway::new(primary.clone(), fallback, 0.7, 1024)))
    }

    #[tokio::test]
    async fn test_reply_with_task_context() {
        let primary = Arc::new(StubProvider::replying("groq", "Start with the report."));
        let input = ChatInput {
            message: "  What first?  ".into(),
            tasks: vec![TaskSnapshot::new("t1", "Quarterly report").with_priority(TaskPriority::High)],
        };
        let response = agent_with(&primary).execute(input).await;

        assert!(response.success());
        assert_eq!(response.message(), "Start with the report.");
        assert_eq!(response.data()["response"], "Start with the report.");

        let call = primary.last_call().unwrap();
        assert_eq!(call.prompt, "What first?");
        assert_eq!(call.max_tokens, 500);
        let system = call.system_prompt.unwrap();
        assert!(system.contains("User's current tasks:\n- Quarterly report (priority: high, completed: false, due: none)"));
    }

    #[tokio::test]
    async fn test_context_limited_to_twenty_tasks() {
        let primary = Arc::new(StubProvider::replying("groq", "ok"));
        let tasks = (0..25).map(|i| TaskSnapshot::new(&i.to_string(), &format!("Task {i}"))).collect();
        agent_with(&primary)
            .execute(ChatInput { message: "hi".into(), tasks })
            .await;

        let system = primary.last_call().unwrap().system_prompt.unwrap();
        assert!(system.contains("- Task 19 "));
        assert!(!system.contains("- Task 20 "));
    }

    #[tokio::test]
    async fn test_invalid_messages_skip_llm() {
        let primary = Arc::new(StubProvider::replying("groq", "ok"));
        let agent = agent_with(&primary);

        let empty = agent.execute(ChatInput { message: "   ".into(), tasks: vec![] }).await;
        assert!(!empty.success());

        let long = agent
            .execute(ChatInput { message: "x".repeat(MAX_MESSAGE_CHARS + 1), tasks: vec![] })
            .await;
        assert!(!long.success());
        assert_eq!(primary.call_count(), 0);
    }

    #[test]
    fn test_validate_message_counts_trimmed_chars() {
        let padded = format!("  {}  ", "é".repeat(MAX_MESSAGE_CHARS));
        assert_eq!(validate_message(&padded).map(|m| m.chars().count()), Ok(MAX_MESSAGE_CHARS));
        assert_eq!(validate_message(" \n\t "), Err(InvalidMessage::Empty));
        assert_eq!(
            validate_message(&"x".repeat(MAX_MESSAGE_CHARS + 1)),
            Err(InvalidMessage::TooLong)
        );
    }

    #[tokio::test]
    async fn test_failure_message_carries_error() {
        let primary = Arc::new(StubProvider::failing("groq", "bad key"));
        let response = agent_with(&primary)
            .execute(ChatInput { message: "hi".into(), tasks: vec![] })
            .await;

        assert!(!response.success());
        assert!(response.message().starts_with("Failed to get response: All LLM providers failed"));
    }
}
