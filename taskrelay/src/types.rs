//! Plan and task records shared by every engine component

use chrono::{FixedOffset, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Mapping from call-key (`{tool}_{n}`) to the textual tool result
pub type ResultLog = IndexMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Created,
    Running,
    Success,
    Failed,
}

impl PlanStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, PlanStatus::Success | PlanStatus::Failed)
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PlanStatus::Created => "created",
            PlanStatus::Running => "running",
            PlanStatus::Success => "success",
            PlanStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    NotStarted,
    Pending,
    Success,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::NotStarted => "not_started",
            TaskStatus::Pending => "pending",
            TaskStatus::Success => "success",
            TaskStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationRole {
    User,
    Assistant,
}

impl ConversationRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ConversationRole::User => "user",
            ConversationRole::Assistant => "assistant",
        }
    }
}

/// One turn of the room conversation as seen by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: ConversationRole,
    pub content: String,
    /// Present for messages read back from persistence; absent for the live query
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
}

impl ConversationMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ConversationRole::User,
            content: content.into(),
            created_at: None,
            sender: None,
        }
    }
}

/// Arguments of a tool-call intent as returned by the oracle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum IntentArguments {
    Resolved { values: Map<String, Value> },
    /// The payload could not be parsed into an argument object; the call is skipped at
    /// execution time.
    Unresolved { raw: String, reason: String },
}

impl IntentArguments {
    pub fn resolved(&self) -> Option<&Map<String, Value>> {
        match self {
            IntentArguments::Resolved { values } => Some(values),
            IntentArguments::Unresolved { .. } => None,
        }
    }
}

impl Default for IntentArguments {
    fn default() -> Self {
        IntentArguments::Resolved { values: Map::new() }
    }
}

/// A structured {tool, arguments} decision bound to one provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallIntent {
    pub tool_name: String,
    pub target_provider: String,
    #[serde(default)]
    pub arguments: IntentArguments,
}

impl ToolCallIntent {
    pub fn new(
        tool_name: impl Into<String>,
        target_provider: impl Into<String>,
        values: Map<String, Value>,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            target_provider: target_provider.into(),
            arguments: IntentArguments::Resolved { values },
        }
    }

    /// Value of one argument, when the arguments resolved
    pub fn argument(&self, name: &str) -> Option<&Value> {
        self.arguments.resolved().and_then(|m| m.get(name))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub plan_id: String,
    /// 1-based, unique and contiguous within a plan
    pub step_number: u32,
    pub name: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub expected_result: String,
    /// Provider that executes this task. `None` only for the synthesized default task.
    #[serde(default)]
    pub assigned_provider: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallIntent>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub results: ResultLog,
}

impl Task {
    pub fn new(plan_id: impl Into<String>, step_number: u32, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            plan_id: plan_id.into(),
            step_number,
            name: name.into(),
            explanation: String::new(),
            expected_result: String::new(),
            assigned_provider: None,
            tool_calls: Vec::new(),
            status: TaskStatus::NotStarted,
            results: ResultLog::new(),
        }
    }
}

/// Kind of a plan log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanLogKind {
    PlanCreated,
    AskForPlanApproval,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanLogEntry {
    pub id: String,
    pub created_at: String,
    #[serde(rename = "type")]
    pub kind: PlanLogKind,
    pub content: String,
    pub plan_id: Option<String>,
    pub task_id: Option<String>,
    #[serde(default)]
    pub skills: Vec<ToolCallIntent>,
}

impl PlanLogEntry {
    pub fn new(
        kind: PlanLogKind,
        content: impl Into<String>,
        plan_id: Option<String>,
        created_at: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created_at,
            kind,
            content: content.into(),
            plan_id,
            task_id: None,
            skills: Vec::new(),
        }
    }
}

/// What the plan was derived from, stored alongside the plan record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PlanContext {
    /// The raw JSON object extracted from the oracle response
    pub plan: Value,
    pub conversations: Vec<ConversationMessage>,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub name: String,
    pub overview: String,
    pub room_id: String,
    #[serde(default)]
    pub assigner: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub reviewer: Option<String>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    pub status: PlanStatus,
    /// 0..=100
    pub progress: u8,
    #[serde(default)]
    pub logs: Vec<PlanLogEntry>,
    /// Per-step tool results, keyed by step number
    #[serde(default)]
    pub step_results: BTreeMap<u32, ResultLog>,
    #[serde(default)]
    pub context: PlanContext,
    #[serde(default)]
    pub no_skills_needed: bool,
}

impl Plan {
    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    pub fn task_mut(&mut self, task_id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == task_id)
    }
}

/// A user's request to plan work in a room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest {
    pub room_id: String,
    pub query: String,
    #[serde(default)]
    pub assigner: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub reviewer: Option<String>,
}

/// A plan together with one of its tasks, as sent by the caller for planning or execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRequest {
    pub plan: Plan,
    pub task: Task,
}

/// Proposed administrative actions awaiting confirmation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub plan_id: String,
    pub actions: Vec<ToolCallIntent>,
    pub requester_id: String,
    pub trust: bool,
}

/// Current time at a fixed UTC offset, RFC 3339 formatted
pub fn timestamp(utc_offset_hours: i32) -> String {
    match FixedOffset::east_opt(utc_offset_hours * 3600) {
        Some(offset) => Utc::now().with_timezone(&offset).to_rfc3339(),
        None => Utc::now().to_rfc3339(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn statuses_serialize_snake_case() {
        assert_eq!(json!(TaskStatus::NotStarted), json!("not_started"));
        assert_eq!(json!(PlanStatus::Running), json!("running"));
        assert_eq!(TaskStatus::Pending.to_string(), "pending");
    }

    #[test]
    fn unresolved_arguments_round_trip_through_records() {
        let intent = ToolCallIntent {
            tool_name: "search".to_string(),
            target_provider: "web".to_string(),
            arguments: IntentArguments::Unresolved {
                raw: "{q: x".to_string(),
                reason: "EOF while parsing".to_string(),
            },
        };
        let value = serde_json::to_value(&intent).unwrap();
        assert_eq!(value["arguments"]["state"], "unresolved");
        assert!(intent.argument("q").is_none());
    }

    #[test]
    fn timestamp_carries_offset() {
        assert!(timestamp(8).ends_with("+08:00"));
    }
}
