//! Task agents.
//!
//! Each agent owns a fixed system prompt, turns structured task data into a
//! user prompt, calls the [`LlmGateway`](crate::gateway::LlmGateway), and
//! parses the reply into typed recommendations. Agents never return errors:
//! provider failures and bad input both come back as an [`AgentResponse`]
//! with `success == false`, and unparseable replies degrade to a best-effort
//! result.

pub mod chat;
pub mod decomposer;
pub mod prioritizer;
mod prompt;
pub mod types;

use async_trait::async_trait;

pub use chat::{ChatAgent, ChatInput};
pub use decomposer::{DecomposeInput, DecomposerAgent};
pub use prioritizer::{PrioritizeInput, PrioritizerAgent};
pub use types::{
    AgentResponse, AgentType, DetailLevel, PriorityRecommendation, SubtaskRecommendation,
    TaskPriority, TaskSnapshot,
};

/// Common shape of every agent, so callers can log and dispatch uniformly.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Agent-specific input.
    type Input: Send;

    fn agent_type(&self) -> AgentType;

    fn system_prompt(&self) -> &str;

    async fn execute(&self, input: Self::Input) -> AgentResponse;
}
