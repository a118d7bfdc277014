// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::events::TodoItem;
use crate::tool::{OutputCategory, Tool, ToolCall, ToolOutput};

/// Shared in-memory task list. One instance is created per session by the
/// supervisor agent and handed to both [`TaskListTool`] and [`TaskClearTool`]
/// so they operate on the same state.
pub type TaskListState = Arc<Mutex<Vec<TodoItem>>>;

#[derive(Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum TaskAction {
    Add { content: String },
    Complete { id: String },
    List,
}

/// Adds, completes, and lists personal reminders/tasks. Never destructive on
/// its own - clearing the list is a separate tool so it can carry its own
/// confirmation requirement.
pub struct TaskListTool {
    pub state: TaskListState,
}

#[async_trait]
impl Tool for TaskListTool {
    fn name(&self) -> &str {
        "task_list"
    }

    fn description(&self) -> &str {
        "Add, complete, or list personal tasks/reminders for this session."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": { "type": "string", "enum": ["add", "complete", "list"] },
                "content": { "type": "string", "description": "Task text, required for action=add" },
                "id": { "type": "string", "description": "Task id, required for action=complete" }
            },
            "required": ["action"]
        })
    }

    /// `list` renders one line per task, highest-priority (earliest-added)
    /// first — the same ordered-match-list shape as a search result.
    fn output_category(&self) -> OutputCategory {
        OutputCategory::MatchList
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let action: TaskAction = match serde_json::from_value(call.args.clone()) {
            Ok(a) => a,
            Err(e) => return ToolOutput::err(&call.id, format!("invalid arguments: {e}")),
        };

        let mut tasks = self.state.lock().await;
        match action {
            TaskAction::Add { content } => {
                let id = format!("t{}", tasks.len() + 1);
                tasks.push(TodoItem { id: id.clone(), content, status: "pending".into() });
                ToolOutput::ok(&call.id, format!("added task {id}"))
            }
            TaskAction::Complete { id } => {
                match tasks.iter_mut().find(|t| t.id == id) {
                    Some(t) => {
                        t.status = "completed".into();
                        ToolOutput::ok(&call.id, format!("completed task {id}"))
                    }
                    None => ToolOutput::err(&call.id, format!("no such task: {id}")),
                }
            }
            TaskAction::List => {
                if tasks.is_empty() {
                    ToolOutput::ok(&call.id, "no tasks")
                } else {
                    let lines: Vec<String> = tasks
                        .iter()
                        .map(|t| format!("[{}] {} - {}", t.id, t.status, t.content))
                        .collect();
                    ToolOutput::ok(&call.id, lines.join("\n"))
                }
            }
        }
    }
}

/// Clears every task in the list. Destructive and irreversible, so the
/// supervisor agent must route calls to this tool through its
/// pending-confirmation gate before executing them.
pub struct TaskClearTool {
    pub state: TaskListState,
}

#[async_trait]
impl Tool for TaskClearTool {
    fn name(&self) -> &str {
        "task_clear"
    }

    fn description(&self) -> &str {
        "Remove every task from the list. Irreversible."
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    fn needs_confirmation(&self) -> bool {
        true
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let mut tasks = self.state.lock().await;
        let n = tasks.len();
        tasks.clear();
        ToolOutput::ok(&call.id, format!("cleared {n} task(s)"))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> TaskListState {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn call(args: Value) -> ToolCall {
        ToolCall { id: "1".into(), name: "task_list".into(), args }
    }

    #[tokio::test]
    async fn add_then_list_shows_pending_task() {
        let st = state();
        let tool = TaskListTool { state: st.clone() };
        tool.execute(&call(json!({"action": "add", "content": "buy milk"}))).await;
        let out = tool.execute(&call(json!({"action": "list"}))).await;
        assert!(out.content.contains("buy milk"));
        assert!(out.content.contains("pending"));
    }

    #[tokio::test]
    async fn list_empty_reports_no_tasks() {
        let tool = TaskListTool { state: state() };
        let out = tool.execute(&call(json!({"action": "list"}))).await;
        assert_eq!(out.content, "no tasks");
    }

    #[tokio::test]
    async fn complete_unknown_task_is_an_error() {
        let tool = TaskListTool { state: state() };
        let out = tool.execute(&call(json!({"action": "complete", "id": "nope"}))).await;
        assert!(out.is_error);
    }

    #[tokio::test]
    async fn complete_marks_task_completed() {
        let st = state();
        let tool = TaskListTool { state: st.clone() };
        tool.execute(&call(json!({"action": "add", "content": "x"}))).await;
        let out = tool.execute(&call(json!({"action": "complete", "id": "t1"}))).await;
        assert!(!out.is_error);
        let list = tool.execute(&call(json!({"action": "list"}))).await;
        assert!(list.content.contains("completed"));
    }

    #[tokio::test]
    async fn invalid_action_returns_error() {
        let tool = TaskListTool { state: state() };
        let out = tool.execute(&call(json!({"action": "bogus"}))).await;
        assert!(out.is_error);
    }

    #[test]
    fn task_list_tool_does_not_need_confirmation() {
        assert!(!TaskListTool { state: state() }.needs_confirmation());
    }

    #[test]
    fn task_clear_tool_needs_confirmation() {
        assert!(TaskClearTool { state: state() }.needs_confirmation());
    }

    #[test]
    fn task_list_tool_output_category_is_match_list() {
        assert_eq!(TaskListTool { state: state() }.output_category(), OutputCategory::MatchList);
    }

    #[tokio::test]
    async fn clear_empties_shared_state() {
        let st = state();
        TaskListTool { state: st.clone() }
            .execute(&call(json!({"action": "add", "content": "a"})))
            .await;
        let clear = TaskClearTool { state: st.clone() };
        let out = clear.execute(&ToolCall { id: "2".into(), name: "task_clear".into(), args: json!({}) }).await;
        assert!(out.content.contains("cleared 1"));
        assert!(st.lock().await.is_empty());
    }
}
