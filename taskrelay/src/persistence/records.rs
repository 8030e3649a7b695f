//! Records exchanged with the persistence service

use crate::types::{PlanLogEntry, PlanStatus, ResultLog, Task, TaskStatus, ToolCallIntent};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A stored chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub sender: SenderRef,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Message senders come back either as a bare id or as an embedded user record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SenderRef {
    Id(String),
    User(UserRecord),
}

impl SenderRef {
    pub fn id(&self) -> &str {
        match self {
            SenderRef::Id(id) => id,
            SenderRef::User(user) => &user.user_id,
        }
    }

    /// Best display name: the username when known, else the id
    pub fn display_name(&self) -> &str {
        match self {
            SenderRef::Id(id) => id,
            SenderRef::User(user) if !user.username.is_empty() => &user.username,
            SenderRef::User(user) => &user.user_id,
        }
    }
}

impl Default for SenderRef {
    fn default() -> Self {
        SenderRef::Id(String::new())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct UserRecord {
    #[serde(default, alias = "id")]
    pub user_id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Pagination {
    #[serde(default)]
    pub total: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RoomUsers {
    #[serde(default)]
    pub users: Vec<UserRecord>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

impl RoomUsers {
    pub fn total(&self) -> u64 {
        self.pagination
            .as_ref()
            .and_then(|p| p.total)
            .unwrap_or(self.users.len() as u64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomUserFilter {
    pub limit: u32,
    pub offset: u32,
    pub search: String,
    pub role: String,
}

impl Default for RoomUserFilter {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
            search: String::new(),
            role: String::new(),
        }
    }
}

/// Partial task update; absent fields are left untouched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TaskUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, rename = "skills", skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallIntent>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<ResultLog>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_number: Option<u32>,
}

/// Plan logs are either one step's tool results or a structured log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlanLogPayload {
    Entry(PlanLogEntry),
    StepResults(ResultLog),
}

/// Partial plan update; absent fields are left untouched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PlanUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PlanStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<PlanLogPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

/// A stored task as read back for reconciliation. Statuses the engine does not know are
/// kept as `None` and count as non-terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    #[serde(alias = "task_id")]
    pub id: String,
    #[serde(default)]
    pub step_number: u32,
    #[serde(default, deserialize_with = "lenient_status")]
    pub status: Option<TaskStatus>,
}

impl From<&Task> for TaskSnapshot {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            step_number: task.step_number,
            status: Some(task.status),
        }
    }
}

fn lenient_status<'de, D>(deserializer: D) -> Result<Option<TaskStatus>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| serde_json::from_value(Value::String(s)).ok()))
}
