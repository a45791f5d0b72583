//! Prioritizer agent: suggests a high/medium/low priority for each task.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::prompt::{display_id, display_title, first_balanced_array, join_tags};
use super::types::{AgentResponse, AgentType, PriorityRecommendation, TaskSnapshot};
use super::Agent;
use crate::gateway::LlmGateway;

const TEMPERATURE: f32 = 0.3;
const MAX_TOKENS: u32 = 1024;

const UNPARSED_REASON: &str = "Could not parse AI response";

const SYSTEM_PROMPT: &str = r#"You are an expert task prioritization assistant. Your job is to analyze tasks and assign appropriate priorities based on:

1. **Urgency**: Due dates, deadlines, time-sensitivity
2. **Importance**: Impact on goals, dependencies, consequences of not completing
3. **Effort**: Estimated time and complexity
4. **Context**: Tags, descriptions, relationships to other tasks

Priority levels:
- **high**: Critical tasks that need immediate attention
- **medium**: Important tasks that should be done soon
- **low**: Tasks that can wait or are nice-to-have

Always respond with valid JSON containing your priority recommendations."#;

const RESPONSE_FORMAT: &str = r#"

Respond with a JSON array of objects, each containing:
- "task_id": the task ID
- "priority": "high", "medium", or "low"
- "reason": brief explanation (1-2 sentences)

Example response:
[
  {"task_id": "abc123", "priority": "high", "reason": "Due tomorrow and blocks other work."},
  {"task_id": "def456", "priority": "medium", "reason": "Important but no urgent deadline."}
]"#;

#[derive(Debug, Clone, Default)]
pub struct PrioritizeInput {
    pub tasks: Vec<TaskSnapshot>,
    pub user_context: Option<String>,
}

impl PrioritizeInput {
    pub fn new(tasks: Vec<TaskSnapshot>) -> Self {
        Self {
            tasks,
            user_context: None,
        }
    }

    pub fn with_context(mut self, context: &str) -> Self {
        self.user_context = Some(context.into());
        self
    }
}

pub struct PrioritizerAgent {
    gateway: Arc<LlmGateway>,
}

impl PrioritizerAgent {
    pub fn new(gateway: Arc<LlmGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Agent for PrioritizerAgent {
    type Input = PrioritizeInput;

    fn agent_type(&self) -> AgentType {
        AgentType::Prioritizer
    }

    fn system_prompt(&self) -> &str {
        SYSTEM_PROMPT
    }

    async fn execute(&self, input: PrioritizeInput) -> AgentResponse {
        let PrioritizeInput {
            tasks,
            user_context,
        } = input;

        if tasks.is_empty() {
            return AgentResponse::succeeded(
                self.agent_type(),
                json!({ "priorities": [] }),
                "No tasks to prioritize.",
            );
        }

        let prompt = build_prompt(&tasks, user_context.as_deref());
        debug!(tasks = tasks.len(), prompt_len = prompt.len(), "Prioritizing tasks");

        match self
            .gateway
            .complete(&prompt, Some(SYSTEM_PROMPT), Some(TEMPERATURE), Some(MAX_TOKENS))
            .await
        {
            Ok(raw) => {
                let priorities = parse_priorities(&raw, &tasks);
                info!(agent = %self.agent_type(), tasks = tasks.len(), priorities = priorities.len(), "Prioritization complete");
                AgentResponse::succeeded(
                    self.agent_type(),
                    json!({ "priorities": priorities, "raw_response": raw }),
                    format!("Successfully analyzed {} tasks.", tasks.len()),
                )
            }
            Err(e) => {
                warn!(agent = %self.agent_type(), error = %e, "Prioritization failed");
                AgentResponse::failed(self.agent_type(), "Failed to prioritize tasks.", e.to_string())
            }
        }
    }
}

fn build_prompt(tasks: &[TaskSnapshot], user_context: Option<&str>) -> String {
    let mut parts = vec!["Please analyze these tasks and assign priorities:\n".to_string()];

    for (i, task) in tasks.iter().enumerate() {
        parts.push(format!("\n{}. Task ID: {}", i + 1, display_id(task)));
        parts.push(format!("   Title: {}", display_title(task)));
        if let Some(desc) = task.description.as_deref().filter(|d| !d.is_empty()) {
            parts.push(format!("   Description: {desc}"));
        }
        if let Some(due) = task.due_date {
            parts.push(format!("   Due Date: {due}"));
        }
        if !task.tags.is_empty() {
            parts.push(format!("   Tags: {}", join_tags(&task.tags)));
        }
        if let Some(priority) = task.priority {
            parts.push(format!("   Current Priority: {priority}"));
        }
    }

    if let Some(ctx) = user_context.filter(|c| !c.is_empty()) {
        parts.push(format!("\nUser Context: {ctx}"));
    }

    parts.push(RESPONSE_FORMAT.to_string());
    parts.join("\n")
}

/// Parse the model's reply into recommendations.
///
/// Falls back to one `medium` entry per input task, in input order, when no
/// JSON array can be decoded.
pub fn parse_priorities(raw: &str, tasks: &[TaskSnapshot]) -> Vec<PriorityRecommendation> {
    let decoded = first_balanced_array(raw)
        .and_then(|span| serde_json::from_str::<Vec<Value>>(span).ok());

    match decoded {
        Some(items) => items.iter().filter_map(recommendation).collect(),
        None => {
            warn!(tasks = tasks.len(), "Could not parse priorities, using defaults");
            tasks
                .iter()
                .map(|t| PriorityRecommendation {
                    task_id: t.id.clone(),
                    priority: "medium".into(),
                    reason: UNPARSED_REASON.into(),
                })
                .collect()
        }
    }
}

fn recommendation(item: &Value) -> Option<PriorityRecommendation> {
    let obj = item.as_object()?;
    let task_id = match obj.get("task_id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    let priority = obj
        .get("priority")
        .and_then(Value::as_str)
        .filter(|p| !p.is_empty())
        .unwrap_or("medium");
    let reason = obj.get("reason").and_then(Value::as_str).unwrap_or_default();

    Some(PriorityRecommendation {
        task_id,
        priority: priority.to_string(),
        reason: reason.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::types::TaskPriority;
    use crate::gateway::stub::StubProvider;
    use chrono::NaiveDate;

    fn agent_with(primary: &Arc<StubProvider>) -> PrioritizerAgent {
        let fallback = Arc::new(StubProvider::failing("ollama", "offline"));
        PrioritizerAgent::new(Arc::new(LlmGateway::new(primary.clone(), fallback, 0.7, 1024)))
    }

    fn sample_tasks() -> Vec<TaskSnapshot> {
        vec![
            TaskSnapshot::new("a1", "File taxes")
                .with_description("Federal and state")
                .with_due_date(NaiveDate::from_ymd_opt(2026, 4, 15).unwrap())
                .with_tags(&["finance", "admin"])
                .with_priority(TaskPriority::Low),
            TaskSnapshot::new("b2", "Water plants"),
        ]
    }

    #[tokio::test]
    async fn test_empty_tasks_skip_llm() {
        let primary = Arc::new(StubProvider::replying("groq", "[]"));
        let response = agent_with(&primary).execute(PrioritizeInput::default()).await;

        assert!(response.success());
        assert_eq!(response.message(), "No tasks to prioritize.");
        assert!(response.priorities().is_empty());
        assert_eq!(primary.call_count(), 0);
    }

    #[tokio::test]
    async fn test_parses_embedded_array() {
        let reply = r#"Here you go:
[
  {"task_id": "a1", "priority": "high", "reason": "Deadline soon."},
  {"task_id": "b2", "priority": "low", "reason": "Can wait."}
]
Let me know if you need more."#;
        let primary = Arc::new(StubProvider::replying("groq", reply));
        let response = agent_with(&primary).execute(PrioritizeInput::new(sample_tasks())).await;

        assert!(response.success());
        assert_eq!(response.message(), "Successfully analyzed 2 tasks.");
        let priorities = response.priorities();
        assert_eq!(priorities.len(), 2);
        assert_eq!(priorities[0].priority, "high");
        assert_eq!(priorities[1].task_id, "b2");
        assert_eq!(response.data()["raw_response"], reply);

        let call = primary.last_call().unwrap();
        assert!((call.temperature - 0.3).abs() < f32::EPSILON);
        assert_eq!(call.max_tokens, 1024);
        assert_eq!(call.system_prompt.as_deref(), Some(SYSTEM_PROMPT));
    }

    #[tokio::test]
    async fn test_unparseable_reply_falls_back_per_task() {
        let primary = Arc::new(StubProvider::replying("groq", "I think taxes matter most."));
        let response = agent_with(&primary).execute(PrioritizeInput::new(sample_tasks())).await;

        assert!(response.success());
        let priorities = response.priorities();
        let ids: Vec<_> = priorities.iter().map(|p| p.task_id.as_str()).collect();
        assert_eq!(ids, ["a1", "b2"]);
        assert!(priorities.iter().all(|p| p.priority == "medium" && p.reason == UNPARSED_REASON));
    }

    #[tokio::test]
    async fn test_provider_failure_yields_failure_envelope() {
        let primary = Arc::new(StubProvider::failing("groq", "bad key"));
        let response = agent_with(&primary).execute(PrioritizeInput::new(sample_tasks())).await;

        assert!(!response.success());
        assert_eq!(response.message(), "Failed to prioritize tasks.");
        assert!(response.error().unwrap().contains("All LLM providers failed"));
        assert!(response.data().is_empty());
    }

    #[test]
    fn test_prompt_layout() {
        let prompt = build_prompt(&sample_tasks(), Some("Busy week"));
        assert!(prompt.starts_with("Please analyze these tasks and assign priorities:\n"));
        assert!(prompt.contains("\n1. Task ID: a1\n   Title: File taxes\n   Description: Federal and state\n   Due Date: 2026-04-15\n   Tags: finance, admin\n   Current Priority: low"));
        assert!(prompt.contains("\n2. Task ID: b2\n   Title: Water plants\n"));
        assert!(prompt.contains("\nUser Context: Busy week"));
        assert!(prompt.ends_with("\"Important but no urgent deadline.\"}\n]"));
    }

    #[test]
    fn test_parse_tolerates_numeric_ids_and_missing_fields() {
        let parsed = parse_priorities(r#"[{"task_id": 42}, "junk", {"priority": "low"}]"#, &[]);
        assert_eq!(
            parsed,
            vec![
                PriorityRecommendation {
                    task_id: "42".into(),
                    priority: "medium".into(),
                    reason: String::new(),
                },
                PriorityRecommendation {
                    task_id: String::new(),
                    priority: "low".into(),
                    reason: String::new(),
                },
            ]
        );
    }

    #[test]
    fn test_reparse_is_stable() {
        let tasks = sample_tasks();
        let first = parse_priorities(
            r#"[{"task_id": "a1", "priority": "high", "reason": "x"}, {"task_id": "b2"}]"#,
            &tasks,
        );
        let again = parse_priorities(&serde_json::to_string(&first).unwrap(), &tasks);
        assert_eq!(first, again);
    }
}
