//! Agent service: the request flow around the agents.
//!
//! For each request the service loads and ownership-checks tasks, runs the
//! matching agent, times it, and writes an execution log entry. HTTP
//! handlers (outside this crate) map [`ServiceError`] to status codes.

pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

use crate::agent::chat::{validate_message, MAX_CONTEXT_TASKS};
use crate::agent::decomposer::DEFAULT_MAX_SUBTASKS;
use crate::agent::{
    Agent, AgentResponse, AgentType, ChatAgent, ChatInput, DecomposeInput, DecomposerAgent,
    DetailLevel, PrioritizeInput, PrioritizerAgent, PriorityRecommendation,
    SubtaskRecommendation,
};
use crate::gateway::{HealthReport, LlmGateway};
use crate::provider::Role;
use store::{AgentLogEntry, AgentLogStore, AgentMessage, AgentStatus, TaskStore};

/// Allowed range for `DecomposeRequest::max_subtasks`.
pub const MAX_SUBTASKS_RANGE: std::ops::RangeInclusive<usize> = 1..=20;

/// Log summaries keep this many characters of input/output.
const SUMMARY_CHARS: usize = 100;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

// ── Requests ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrioritizeRequest {
    pub task_ids: Vec<String>,
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecomposeRequest {
    pub task_id: String,
    #[serde(default = "default_max_subtasks")]
    pub max_subtasks: usize,
    #[serde(default)]
    pub detail_level: DetailLevel,
}

fn default_max_subtasks() -> usize {
    DEFAULT_MAX_SUBTASKS
}

impl DecomposeRequest {
    pub fn new(task_id: &str) -> Self {
        Self {
            task_id: task_id.into(),
            max_subtasks: DEFAULT_MAX_SUBTASKS,
            detail_level: DetailLevel::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default = "default_chat_agent")]
    pub agent_type: AgentType,
}

fn default_chat_agent() -> AgentType {
    AgentType::Chat
}

impl ChatRequest {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.into(),
            agent_type: AgentType::Chat,
        }
    }
}

// ── Outcomes ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct PrioritizeOutcome {
    pub success: bool,
    pub priorities: Vec<PriorityRecommendation>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DecomposeOutcome {
    pub success: bool,
    pub parent_task_id: String,
    pub subtasks: Vec<SubtaskRecommendation>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatOutcome {
    pub success: bool,
    pub message: String,
    pub agent_type: AgentType,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentLogSummary {
    pub id: String,
    pub agent_type: AgentType,
    pub status: AgentStatus,
    pub input_summary: String,
    pub output_summary: String,
    pub execution_time_ms: u64,
    pub created_at: DateTime<Utc>,
}

impl From<&AgentLogEntry> for AgentLogSummary {
    fn from(entry: &AgentLogEntry) -> Self {
        Self {
            id: entry.id.clone(),
            agent_type: entry.agent_type,
            status: entry.status,
            input_summary: summarize(&entry.input),
            output_summary: summarize(&entry.output),
            execution_time_ms: entry.execution_time_ms,
            created_at: entry.created_at,
        }
    }
}

fn summarize(value: &Value) -> String {
    value.to_string().chars().take(SUMMARY_CHARS).collect()
}

// ── Service ─────────────────────────────────────────────────────────

pub struct AgentService {
    gateway: Arc<LlmGateway>,
    tasks: Arc<dyn TaskStore>,
    logs: Arc<dyn AgentLogStore>,
    prioritizer: PrioritizerAgent,
    decomposer: DecomposerAgent,
    chat: ChatAgent,
}

impl AgentService {
    pub fn new(
        gateway: Arc<LlmGateway>,
        tasks: Arc<dyn TaskStore>,
        logs: Arc<dyn AgentLogStore>,
    ) -> Self {
        Self {
            prioritizer: PrioritizerAgent::new(Arc::clone(&gateway)),
            decomposer: DecomposerAgent::new(Arc::clone(&gateway)),
            chat: ChatAgent::new(Arc::clone(&gateway)),
            gateway,
            tasks,
            logs,
        }
    }

    /// Suggest priorities for the caller's tasks among `task_ids`.
    ///
    /// Unknown ids and tasks owned by someone else are skipped silently.
    pub async fn prioritize(
        &self,
        user_id: &str,
        request: PrioritizeRequest,
    ) -> Result<PrioritizeOutcome, ServiceError> {
        let started = Instant::now();

        let mut tasks = Vec::with_capacity(request.task_ids.len());
        for id in &request.task_ids {
            match self.tasks.get(id).await? {
                Some(stored) if stored.owner_id == user_id => tasks.push(stored.task),
                _ => debug!(task_id = %id, user_id, "Skipping unknown or foreign task"),
            }
        }
        if tasks.is_empty() {
            return Err(ServiceError::NotFound(
                "No valid tasks found for prioritization".into(),
            ));
        }

        let input = PrioritizeInput {
            tasks,
            user_context: request.context.clone(),
        };
        let response = self.prioritizer.execute(input).await;

        self.record(
            user_id,
            &response,
            json!({ "task_ids": request.task_ids, "context": request.context }),
            started,
        )
        .await?;

        Ok(PrioritizeOutcome {
            success: response.success(),
            priorities: response.priorities(),
            message: response.message().to_string(),
        })
    }

    /// Break one of the caller's tasks into subtasks.
    pub async fn decompose(
        &self,
        user_id: &str,
        request: DecomposeRequest,
    ) -> Result<DecomposeOutcome, ServiceError> {
        let started = Instant::now();

        if !MAX_SUBTASKS_RANGE.contains(&request.max_subtasks) {
            return Err(ServiceError::InvalidRequest(format!(
                "max_subtasks must be between {} and {}",
                MAX_SUBTASKS_RANGE.start(),
                MAX_SUBTASKS_RANGE.end()
            )));
        }

        let stored = self
            .tasks
            .get(&request.task_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Task {} not found", request.task_id)))?;
        if stored.owner_id != user_id {
            return Err(ServiceError::Forbidden(
                "Not authorized to access this task".into(),
            ));
        }

        let input = DecomposeInput {
            task: stored.task,
            max_subtasks: request.max_subtasks,
            detail_level: request.detail_level,
        };
        let response = self.decomposer.execute(input).await;

        self.record(
            user_id,
            &response,
            json!({ "task_id": request.task_id, "max_subtasks": request.max_subtasks }),
            started,
        )
        .await?;

        Ok(DecomposeOutcome {
            success: response.success(),
            parent_task_id: request.task_id,
            subtasks: response.subtasks(),
            message: response.message().to_string(),
        })
    }

    /// Answer a free-form question about the caller's tasks.
    ///
    /// Only successful exchanges are persisted.
    pub async fn chat(&self, user_id: &str, request: ChatRequest) -> Result<ChatOutcome, ServiceError> {
        let started = Instant::now();

        validate_message(&request.message)
            .map_err(|e| ServiceError::InvalidRequest(e.to_string()))?;

        let tasks = self
            .tasks
            .list_for_user(user_id, MAX_CONTEXT_TASKS)
            .await?
            .into_iter()
            .map(|s| s.task)
            .collect();

        let response = self
            .chat
            .execute(ChatInput {
                message: request.message.clone(),
                tasks,
            })
            .await;

        if response.success() {
            self.logs
                .append_message(AgentMessage::new(user_id, Role::User, &request.message, AgentType::Chat))
                .await?;
            self.logs
                .append_message(AgentMessage::new(user_id, Role::Assistant, response.message(), AgentType::Chat))
                .await?;
            self.record(user_id, &response, json!({ "message": request.message }), started)
                .await?;
        }

        Ok(ChatOutcome {
            success: response.success(),
            message: response.message().to_string(),
            agent_type: request.agent_type,
        })
    }

    /// Recent agent executions for the caller, newest first.
    pub async fn logs(&self, user_id: &str, limit: usize) -> Result<Vec<AgentLogSummary>, ServiceError> {
        let entries = self.logs.recent_logs(user_id, limit).await?;
        Ok(entries.iter().map(AgentLogSummary::from).collect())
    }

    pub async fn health(&self) -> HealthReport {
        self.gateway.health_check().await
    }

    async fn record(
        &self,
        user_id: &str,
        response: &AgentResponse,
        input: Value,
        started: Instant,
    ) -> Result<(), ServiceError> {
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let status = if response.success() {
            AgentStatus::Completed
        } else {
            AgentStatus::Failed
        };

        info!(
            agent = %response.agent_type(),
            user_id,
            success = response.success(),
            elapsed_ms,
            "Agent execution finished"
        );

        self.logs
            .append_log(AgentLogEntry {
                id: uuid::Uuid::new_v4().to_string(),
                user_id: user_id.into(),
                agent_type: response.agent_type(),
                input,
                output: Value::Object(response.data().clone()),
                status,
                error: response.error().map(str::to_string),
                execution_time_ms: elapsed_ms,
                created_at: Utc::now(),
            })
            .await?;
        Ok(())
    }
}
