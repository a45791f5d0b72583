//! Prompt formatting and response scanning helpers shared by the agents.

use regex::Regex;
use std::sync::LazyLock;

use super::types::TaskSnapshot;

/// Matches a greedy JSON-array-shaped span: first `[` through last `]`.
static GREEDY_ARRAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[\s\S]*\]").expect("valid regex"));

pub(crate) fn display_title(task: &TaskSnapshot) -> &str {
    task.title().unwrap_or("Untitled")
}

pub(crate) fn display_id(task: &TaskSnapshot) -> &str {
    if task.id.is_empty() {
        "unknown"
    } else {
        &task.id
    }
}

pub(crate) fn join_tags(tags: &[String]) -> String {
    tags.join(", ")
}

/// One-line summary of a task, used for chat context.
pub(crate) fn task_line(task: &TaskSnapshot) -> String {
    format!(
        "- {} (priority: {}, completed: {}, due: {})",
        display_title(task),
        task.priority.map(|p| p.as_str()).unwrap_or("none"),
        task.completed,
        task.due_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "none".into()),
    )
}

/// Find the first `[` and return the span up to its matching `]`.
///
/// Brackets inside JSON strings are ignored. Returns `None` when there is no
/// `[` or it is never closed.
pub(crate) fn first_balanced_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Span from the first `[` to the last `]`, if any.
pub(crate) fn greedy_array(text: &str) -> Option<&str> {
    GREEDY_ARRAY.find(text).map(|m| m.as_str())
}
