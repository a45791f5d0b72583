//! Decomposer agent: breaks one task into ordered, actionable subtasks.

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

use super::prompt::{display_title, greedy_array, join_tags};
use super::types::{AgentResponse, AgentType, DetailLevel, SubtaskRecommendation, TaskSnapshot};
use super::Agent;
use crate::gateway::LlmGateway;

const TEMPERATURE: f32 = 0.5;
const MAX_TOKENS: u32 = 1500;

/// Default number of subtasks requested.
pub const DEFAULT_MAX_SUBTASKS: usize = 10;

/// Upper bound on subtasks recovered from bullet lines.
const LINE_FALLBACK_LIMIT: usize = 10;

static NUMBERED_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.").expect("valid regex"));
static LINE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-*•\d.]+\s*").expect("valid regex"));

const SYSTEM_PROMPT: &str = r#"You are an expert task decomposition assistant. Your job is to break down complex tasks into smaller, actionable subtasks.

Guidelines for decomposition:
1. **Actionable**: Each subtask should be a concrete action that can be completed
2. **Specific**: Subtasks should be clear and unambiguous
3. **Appropriately sized**: Not too large (should take minutes to hours, not days)
4. **Ordered**: List subtasks in logical execution order when applicable
5. **Complete**: Cover all aspects needed to complete the parent task

For each subtask, provide:
- A clear title (action-oriented, starts with a verb)
- A brief description if needed
- Suggested priority (high/medium/low)
- Estimated effort (small/medium/large)

Always respond with valid JSON containing the subtasks."#;

const RESPONSE_FORMAT: &str = r#"Respond with a JSON array of subtask objects:
```json
[
  {
    "title": "Action-oriented title",
    "description": "Brief description (optional)",
    "priority": "high|medium|low",
    "effort": "small|medium|large"
  }
]
```

Generate the subtasks now:"#;

#[derive(Debug, Clone)]
pub struct DecomposeInput {
    pub task: TaskSnapshot,
    pub max_subtasks: usize,
    pub detail_level: DetailLevel,
}

impl DecomposeInput {
    pub fn new(task: TaskSnapshot) -> Self {
        Self {
            task,
            max_subtasks: DEFAULT_MAX_SUBTASKS,
            detail_level: DetailLevel::default(),
        }
    }

    pub fn max_subtasks(mut self, max: usize) -> Self {
        self.max_subtasks = max;
        self
    }

    pub fn detail_level(mut self, level: DetailLevel) -> Self {
        self.detail_level = level;
        self
    }
}

pub struct DecomposerAgent {
    gateway: Arc<LlmGateway>,
}

impl DecomposerAgent {
    pub fn new(gateway: Arc<LlmGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Agent for DecomposerAgent {
    type Input = DecomposeInput;

    fn agent_type(&self) -> AgentType {
        AgentType::Decomposer
    }

    fn system_prompt(&self) -> &str {
        SYSTEM_PROMPT
    }

    async fn execute(&self, input: DecomposeInput) -> AgentResponse {
        let DecomposeInput {
            task,
            max_subtasks,
            detail_level,
        } = input;

        if task.title().is_none() {
            return AgentResponse::failed(
                self.agent_type(),
                "Task title is required.",
                "Missing task title",
            );
        }

        let prompt = build_prompt(&task, max_subtasks, detail_level);
        debug!(task_id = %task.id, max_subtasks, ?detail_level, "Decomposing task");

        match self
            .gateway
            .complete(&prompt, Some(SYSTEM_PROMPT), Some(TEMPERATURE), Some(MAX_TOKENS))
            .await
        {
            Ok(raw) => {
                let subtasks = parse_subtasks(&raw, max_subtasks);
                info!(agent = %self.agent_type(), task_id = %task.id, subtasks = subtasks.len(), "Decomposition complete");
                let message = format!("Generated {} subtasks.", subtasks.len());
                AgentResponse::succeeded(
                    self.agent_type(),
                    json!({
                        "parent_task_id": task.id,
                        "subtasks": subtasks,
                        "raw_response": raw,
                    }),
                    message,
                )
            }
            Err(e) => {
                warn!(agent = %self.agent_type(), task_id = %task.id, error = %e, "Decomposition failed");
                AgentResponse::failed(self.agent_type(), "Failed to decompose task.", e.to_string())
            }
        }
    }
}

fn build_prompt(task: &TaskSnapshot, max_subtasks: usize, detail_level: DetailLevel) -> String {
    let mut prompt = format!(
        "Please break down this task into actionable subtasks:\n\n**Task Title**: {}\n",
        display_title(task)
    );

    if let Some(desc) = task.description.as_deref().filter(|d| !d.is_empty()) {
        prompt.push_str(&format!("**Description**: {desc}\n"));
    }
    if !task.tags.is_empty() {
        prompt.push_str(&format!("**Tags**: {}\n", join_tags(&task.tags)));
    }
    if let Some(due) = task.due_date {
        prompt.push_str(&format!("**Due Date**: {due}\n"));
    }

    prompt.push_str(&format!(
        "\n**Instructions**:\n- Generate up to {max_subtasks} subtasks\n- {}\n- List them in logical execution order\n\n",
        detail_level.instruction()
    ));
    prompt.push_str(RESPONSE_FORMAT);
    prompt
}

/// Parse the model's reply into subtasks.
///
/// Uses the span from the first `[` to the last `]` when it decodes as JSON,
/// keeping at most `max_subtasks` entries. Otherwise recovers titles from
/// bulleted or numbered lines, capped at ten whatever `max_subtasks` says.
pub fn parse_subtasks(raw: &str, max_subtasks: usize) -> Vec<SubtaskRecommendation> {
    let decoded = greedy_array(raw).and_then(|span| serde_json::from_str::<Vec<Value>>(span).ok());

    match decoded {
        Some(items) => items.iter().filter_map(normalize).take(max_subtasks).collect(),
        None => {
            warn!("Could not decode subtask JSON, extracting bullet lines");
            subtasks_from_lines(raw)
        }
    }
}

fn normalize(item: &Value) -> Option<SubtaskRecommendation> {
    let obj = item.as_object()?;
    let title = obj.get("title").and_then(Value::as_str).map(str::trim)?;
    if title.is_empty() {
        return None;
    }

    let text_or = |key: &str, default: &str| {
        obj.get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or(default)
            .to_string()
    };

    Some(SubtaskRecommendation {
        title: title.to_string(),
        description: text_or("description", ""),
        priority: text_or("priority", "medium"),
        effort: text_or("effort", "medium"),
    })
}

fn subtasks_from_lines(raw: &str) -> Vec<SubtaskRecommendation> {
    raw.lines()
        .map(str::trim)
        .filter(|line| {
            line.starts_with(['-', '*', '•']) || NUMBERED_LINE.is_match(line)
        })
        .map(|line| LINE_MARKER.replace(line, ""))
        .filter(|title| !title.is_empty())
        .map(|title| SubtaskRecommendation::titled(&title))
        .take(LINE_FALLBACK_LIMIT)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::stub::StubProvider;

    fn agent_with(primary: &Arc<StubProvider>) -> DecomposerAgent {
        let fallback = Arc::new(StubProvider::failing("ollama", "offline"));
        DecomposerAgent::new(Arc::new(LlmGateway::new(primary.clone(), fallback, 0.7, 1024)))
    }

    #[test]
    fn test_parse_embedded_json() {
        let subtasks = parse_subtasks(r#"Intro text [{"title":"Buy milk","priority":"high"}] trailing"#, DEFAULT_MAX_SUBTASKS);
        assert_eq!(
            subtasks,
            vec![SubtaskRecommendation {
                title: "Buy milk".into(),
                description: String::new(),
                priority: "high".into(),
                effort: "medium".into(),
            }]
        );
    }

    #[test]
    fn test_parse_bullet_fallback() {
        let subtasks = parse_subtasks("- Do thing one\n* Do thing two\n1. Do thing three", DEFAULT_MAX_SUBTASKS);
        let titles: Vec<_> = subtasks.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, ["Do thing one", "Do thing two", "Do thing three"]);
        assert!(subtasks.iter().all(|s| s.priority == "medium" && s.effort == "medium"));
    }

    #[test]
    fn test_bullet_fallback_caps_at_ten() {
        let raw: String = (1..=15).map(|i| format!("{i}. Step {i}\n")).collect();
        let subtasks = parse_subtasks(&raw, 20);
        assert_eq!(subtasks.len(), 10);
        assert_eq!(subtasks[9].title, "Step 10");
    }

    #[test]
    fn test_bullet_fallback_ignores_prose_and_empty_markers() {
        let raw = "Here is a plan:\n  • Book venue\n-\nThanks!\n10. Send invites";
        let titles: Vec<_> = parse_subtasks(raw, DEFAULT_MAX_SUBTASKS).into_iter().map(|s| s.title).collect();
        assert_eq!(titles, ["Book venue", "Send invites"]);
    }

    #[test]
    fn test_untitled_elements_dropped() {
        let raw = r#"[{"title": "  "}, {"description": "no title"}, 7, {"title": " Call bank ", "effort": "small"}]"#;
        let subtasks = parse_subtasks(raw, DEFAULT_MAX_SUBTASKS);
        assert_eq!(subtasks.len(), 1);
        assert_eq!(subtasks[0].title, "Call bank");
        assert_eq!(subtasks[0].effort, "small");
    }

    #[test]
    fn test_reparse_is_stable() {
        let first = parse_subtasks(
            r#"[{"title": "A"}, {"title": "B", "description": "d", "priority": "low", "effort": "large"}]"#,
            DEFAULT_MAX_SUBTASKS,
        );
        let again = parse_subtasks(&serde_json::to_string(&first).unwrap(), DEFAULT_MAX_SUBTASKS);
        assert_eq!(first, again);
    }

    #[test]
    fn test_prompt_layout() {
        let task = TaskSnapshot::new("t9", "Plan offsite")
            .with_description("Two days, 20 people")
            .with_tags(&["team"]);
        let prompt = build_prompt(&task, 5, DetailLevel::Brief);
        assert!(prompt.contains("**Task Title**: Plan offsite\n**Description**: Two days, 20 people\n**Tags**: team\n"));
        assert!(prompt.contains("- Generate up to 5 subtasks\n- Keep subtasks concise and high-level.\n"));
        assert!(prompt.ends_with("Generate the subtasks now:"));
        assert!(!prompt.contains("**Due Date**"));
    }

    #[tokio::test]
    async fn test_missing_title_skips_llm() {
        let primary = Arc::new(StubProvider::replying("groq", "[]"));
        let task = TaskSnapshot {
            id: "t1".into(),
            ..Default::default()
        };
        let response = agent_with(&primary).execute(DecomposeInput::new(task)).await;

        assert!(!response.success());
        assert_eq!(response.error(), Some("Missing task title"));
        assert_eq!(primary.call_count(), 0);
    }

    #[tokio::test]
    async fn test_execute_truncates_and_reports() {
        let reply = r#"[{"title": "One"}, {"title": "Two"}, {"title": "Three"}]"#;
        let primary = Arc::new(StubProvider::replying("groq", reply));
        let input = DecomposeInput::new(TaskSnapshot::new("t1", "Launch")).max_subtasks(2);
        let response = agent_with(&primary).execute(input).await;

        assert!(response.success());
        assert_eq!(response.message(), "Generated 2 subtasks.");
        assert_eq!(response.data()["parent_task_id"], "t1");
        assert_eq!(response.subtasks().len(), 2);

        let call = primary.last_call().unwrap();
        assert!((call.temperature - 0.5).abs() < f32::EPSILON);
        assert_eq!(call.max_tokens, 1500);
    }

    #[tokio::test]
    async fn test_bullet_fallback_ignores_requested_limit() {
        let primary = Arc::new(StubProvider::replying("groq", "- a\n- b\n- c\n- d\n- e"));
        let input = DecomposeInput::new(TaskSnapshot::new("t1", "Launch")).max_subtasks(2);
        let response = agent_with(&primary).execute(input).await;

        assert!(response.success());
        assert_eq!(response.message(), "Generated 5 subtasks.");
        let titles: Vec<_> = response.subtasks().into_iter().map(|s| s.title).collect();
        assert_eq!(titles, ["a", "b", "c", "d", "e"]);
    }

    #[tokio::test]
    async fn test_provider_failure_yields_failure_envelope() {
        let primary = Arc::new(StubProvider::failing("groq", "timeout"));
        let response = agent_with(&primary)
            .execute(DecomposeInput::new(TaskSnapshot::new("t1", "Launch")))
            .await;

        assert!(!response.success());
        assert_eq!(response.message(), "Failed to decompose task.");
        assert!(response.error().is_some());
    }
}
