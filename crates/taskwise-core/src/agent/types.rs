//! Inputs and outputs shared by every agent.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Priority level of a stored task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    High,
    Medium,
    Low,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only view of a task handed to the agents.
///
/// Nothing here is validated; a missing title is rendered as `Untitled`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskSnapshot {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    pub tags: Vec<String>,
    pub due_date: Option<NaiveDate>,
    pub completed: bool,
}

impl TaskSnapshot {
    pub fn new(id: &str, title: &str) -> Self {
        Self {
            id: id.into(),
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_due_date(mut self, due: NaiveDate) -> Self {
        self.due_date = Some(due);
        self
    }

    /// The title if it is present and not blank.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref().filter(|t| !t.trim().is_empty())
    }
}

/// One suggested priority change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityRecommendation {
    pub task_id: String,
    pub priority: String,
    pub reason: String,
}

/// One suggested subtask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtaskRecommendation {
    pub title: String,
    pub description: String,
    pub priority: String,
    pub effort: String,
}

impl SubtaskRecommendation {
    /// A subtask with every optional field at its default.
    pub fn titled(title: &str) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            priority: "medium".into(),
            effort: "medium".into(),
        }
    }
}

/// How much detail the decomposer should put into each subtask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailLevel {
    Brief,
    #[default]
    Medium,
    Detailed,
}

impl DetailLevel {
    pub(crate) fn instruction(&self) -> &'static str {
        match self {
            Self::Brief => "Keep subtasks concise and high-level.",
            Self::Medium => "Provide moderate detail for each subtask.",
            Self::Detailed => "Include comprehensive details and descriptions.",
        }
    }
}

impl FromStr for DetailLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "brief" => Ok(Self::Brief),
            "medium" => Ok(Self::Medium),
            "detailed" => Ok(Self::Detailed),
            other => Err(format!("unknown detail level '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentType {
    Prioritizer,
    Decomposer,
    Scheduler,
    Reminder,
    Chat,
}

impl AgentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prioritizer => "prioritizer",
            Self::Decomposer => "decomposer",
            Self::Scheduler => "scheduler",
            Self::Reminder => "reminder",
            Self::Chat => "chat",
        }
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Envelope returned by every agent invocation.
///
/// Built once and never modified; callers read it through the accessors.
#[derive(Debug, Clone, Serialize)]
pub struct AgentResponse {
    success: bool,
    agent_type: AgentType,
    data: Map<String, Value>,
    message: String,
    timestamp: DateTime<Utc>,
    error: Option<String>,
}

impl AgentResponse {
    pub fn succeeded(agent_type: AgentType, data: Value, message: impl Into<String>) -> Self {
        Self {
            success: true,
            agent_type,
            data: into_map(data),
            message: message.into(),
            timestamp: Utc::now(),
            error: None,
        }
    }

    pub fn failed(
        agent_type: AgentType,
        message: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            agent_type,
            data: Map::new(),
            message: message.into(),
            timestamp: Utc::now(),
            error: Some(error.into()),
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn agent_type(&self) -> AgentType {
        self.agent_type
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Priority recommendations carried in `data.priorities`, if any.
    pub fn priorities(&self) -> Vec<PriorityRecommendation> {
        self.typed_list("priorities")
    }

    /// Subtask recommendations carried in `data.subtasks`, if any.
    pub fn subtasks(&self) -> Vec<SubtaskRecommendation> {
        self.typed_list("subtasks")
    }

    fn typed_list<T: serde::de::DeserializeOwned>(&self, key: &str) -> Vec<T> {
        self.data
            .get(key)
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }
}

fn into_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("value".into(), other);
            map
        }
    }
}
