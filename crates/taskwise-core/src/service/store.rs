//! Storage seams used by the agent service.
//!
//! The relational store lives outside this crate; these traits are the only
//! operations the service needs from it. `MemoryStore` backs the CLI and the
//! tests.

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Mutex, MutexGuard};

use crate::agent::{AgentType, TaskSnapshot};
use crate::provider::Role;

/// A task together with the user who owns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredTask {
    pub owner_id: String,
    pub task: TaskSnapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// One agent execution, as persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentLogEntry {
    pub id: String,
    pub user_id: String,
    pub agent_type: AgentType,
    pub input: Value,
    pub output: Value,
    pub status: AgentStatus,
    pub error: Option<String>,
    pub execution_time_ms: u64,
    pub created_at: DateTime<Utc>,
}

/// One chat turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    pub id: String,
    pub user_id: String,
    pub role: Role,
    pub content: String,
    pub agent_type: AgentType,
    pub created_at: DateTime<Utc>,
}

impl AgentMessage {
    pub fn new(user_id: &str, role: Role, content: &str, agent_type: AgentType) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            role,
            content: content.into(),
            agent_type,
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn get(&self, task_id: &str) -> anyhow::Result<Option<StoredTask>>;

    /// Up to `limit` tasks owned by `user_id`, in storage order.
    async fn list_for_user(&self, user_id: &str, limit: usize) -> anyhow::Result<Vec<StoredTask>>;
}

#[async_trait]
pub trait AgentLogStore: Send + Sync {
    async fn append_log(&self, entry: AgentLogEntry) -> anyhow::Result<()>;

    /// Most recent entries for `user_id`, newest first.
    async fn recent_logs(&self, user_id: &str, limit: usize) -> anyhow::Result<Vec<AgentLogEntry>>;

    async fn append_message(&self, message: AgentMessage) -> anyhow::Result<()>;
}

/// Process-local store implementing both traits.
#[derive(Default)]
pub struct MemoryStore {
    tasks: Mutex<Vec<StoredTask>>,
    logs: Mutex<Vec<AgentLogEntry>>,
    messages: Mutex<Vec<AgentMessage>>,
}

fn lock<T>(m: &Mutex<T>) -> anyhow::Result<MutexGuard<'_, T>> {
    m.lock().map_err(|_| anyhow!("memory store lock poisoned"))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a task by id.
    pub fn insert_task(&self, owner_id: &str, task: TaskSnapshot) -> anyhow::Result<()> {
        let mut tasks = lock(&self.tasks)?;
        let stored = StoredTask {
            owner_id: owner_id.into(),
            task,
        };
        match tasks.iter_mut().find(|t| t.task.id == stored.task.id) {
            Some(existing) => *existing = stored,
            None => tasks.push(stored),
        }
        Ok(())
    }

    /// All chat messages for a user, oldest first.
    pub fn messages(&self, user_id: &str) -> anyhow::Result<Vec<AgentMessage>> {
        Ok(lock(&self.messages)?
            .iter()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn get(&self, task_id: &str) -> anyhow::Result<Option<StoredTask>> {
        Ok(lock(&self.tasks)?.iter().find(|t| t.task.id == task_id).cloned())
    }

    async fn list_for_user(&self, user_id: &str, limit: usize) -> anyhow::Result<Vec<StoredTask>> {
        Ok(lock(&self.tasks)?
            .iter()
            .filter(|t| t.owner_id == user_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AgentLogStore for MemoryStore {
    async fn append_log(&self, entry: AgentLogEntry) -> anyhow::Result<()> {
        lock(&self.logs)?.push(entry);
        Ok(())
    }

    async fn recent_logs(&self, user_id: &str, limit: usize) -> anyhow::Result<Vec<AgentLogEntry>> {
        Ok(lock(&self.logs)?
            .iter()
            .rev()
            .filter(|e| e.user_id == user_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn append_message(&self, message: AgentMessage) -> anyhow::Result<()> {
        lock(&self.messages)?.push(message);
        Ok(())
    }
}
