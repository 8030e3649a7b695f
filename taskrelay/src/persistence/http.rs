use super::{
    ChatMessage, PersistenceService, PlanUpdate, RoomUserFilter, RoomUsers, TaskSnapshot,
    TaskUpdate, UserRecord,
};
use crate::config::PersistenceConfig;
use crate::error::{RelayError, RelayResult};
use crate::types::{Plan, Task};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// REST client for the plan/task store
pub struct HttpPersistence {
    base_url: String,
    client: Client,
}

impl HttpPersistence {
    pub fn new(config: &PersistenceConfig) -> RelayResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, route: &str) -> String {
        format!("{}{}", self.base_url, route)
    }

    async fn checked(operation: &str, response: Response) -> RelayResult<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(RelayError::persistence(
            operation,
            format!("status {}: {}", status, body),
        ))
    }

    async fn put(&self, operation: &str, route: &str, body: Value) -> RelayResult<()> {
        debug!(operation, route, "persistence update");
        let response = self.client.put(self.url(route)).json(&body).send().await?;
        Self::checked(operation, response).await?;
        Ok(())
    }
}

/// Merge a serialized partial update into a body that already names its target
fn with_fields(mut body: Value, fields: Value) -> Value {
    if let (Some(target), Value::Object(fields)) = (body.as_object_mut(), fields) {
        target.extend(fields);
    }
    body
}

fn task_record(task: &Task) -> Value {
    json!({
        "task_id": task.id,
        "step_number": task.step_number,
        "task_name": task.name,
        "task_explanation": task.explanation,
        "expected_result": task.expected_result,
        "mcp_server": task.assigned_provider,
        "skills": task.tool_calls,
        "status": task.status,
    })
}

fn plan_record(plan: &Plan) -> Value {
    json!({
        "plan_id": plan.id,
        "plan_name": plan.name,
        "plan_overview": plan.overview,
        "room_id": plan.room_id,
        "context": plan.context,
        "assigner": plan.assigner,
        "assignee": plan.assignee,
        "reviewer": plan.reviewer,
        "logs": plan.logs,
        "no_skills_needed": plan.no_skills_needed,
    })
}

/// Some routes wrap their payload (`{"tasks": [...]}`), others return it bare
fn unwrap_field(value: Value, field: &str) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key(field) => map.remove(field).unwrap_or_default(),
        other => other,
    }
}

#[async_trait]
impl PersistenceService for HttpPersistence {
    async fn fetch_recent_messages(&self, room_id: &str, limit: usize) -> RelayResult<Vec<ChatMessage>> {
        let response = self
            .client
            .post(self.url("/api/chat/get_messages"))
            .json(&json!({ "roomId": room_id, "limit": limit }))
            .send()
            .await?;
        let body: Value = Self::checked("get_messages", response).await?.json().await?;
        Ok(serde_json::from_value(unwrap_field(body, "messages"))?)
    }

    async fn create_plan(&self, plan: &Plan) -> RelayResult<()> {
        let response = self
            .client
            .post(self.url("/api/plan/create_plan"))
            .json(&plan_record(plan))
            .send()
            .await?;
        Self::checked("create_plan", response).await?;
        Ok(())
    }

    async fn create_tasks(&self, plan_id: &str, tasks: &[Task]) -> RelayResult<()> {
        let records: Vec<Value> = tasks.iter().map(task_record).collect();
        let response = self
            .client
            .post(self.url("/api/plan/create_tasks"))
            .json(&json!({ "plan_id": plan_id, "tasks": records }))
            .send()
            .await?;
        Self::checked("create_tasks", response).await?;
        Ok(())
    }

    async fn update_task(&self, task_id: &str, update: TaskUpdate) -> RelayResult<()> {
        let body = with_fields(json!({ "task_id": task_id }), serde_json::to_value(&update)?);
        self.put("update_task", "/api/plan/update_task", body).await
    }

    async fn update_plan(&self, plan_id: &str, update: PlanUpdate) -> RelayResult<()> {
        let body = with_fields(json!({ "plan_id": plan_id }), serde_json::to_value(&update)?);
        self.put("update_plan", "/api/plan/update_plan", body).await
    }

    async fn get_tasks(&self, plan_id: &str) -> RelayResult<Vec<TaskSnapshot>> {
        let response = self
            .client
            .get(self.url("/api/plan/get_tasks"))
            .query(&[("plan_id", plan_id)])
            .send()
            .await?;
        let body: Value = Self::checked("get_tasks", response).await?.json().await?;
        Ok(serde_json::from_value(unwrap_field(body, "tasks"))?)
    }

    async fn get_user(&self, user_id: &str) -> RelayResult<UserRecord> {
        let response = self
            .client
            .get(self.url("/api/user/get_user_by_id"))
            .query(&[("user_id", user_id)])
            .send()
            .await?;
        let body: Value = Self::checked("get_user", response).await?.json().await?;
        Ok(serde_json::from_value(unwrap_field(body, "user"))?)
    }

    async fn get_room_users(&self, room_id: &str, filter: &RoomUserFilter) -> RelayResult<RoomUsers> {
        let response = self
            .client
            .post(self.url("/api/user/get_users"))
            .json(&json!({
                "room_id": room_id,
                "limit": filter.limit,
                "offset": filter.offset,
                "search": filter.search,
                "role": filter.role,
            }))
            .send()
            .await?;
        let body: Value = Self::checked("get_users", response).await?.json().await?;
        Ok(serde_json::from_value(body)?)
    }
}
