//! In-memory persistence
//!
//! Keeps plans, tasks, users and chat history in process. Used by tests and for offline runs
//! of the agent. Updates are applied to the stored records and also journaled so callers can
//! inspect the exact sequence of writes.

use super::{
    ChatMessage, PersistenceService, PlanLogPayload, PlanUpdate, RoomUserFilter, RoomUsers,
    TaskSnapshot, TaskUpdate, UserRecord,
};
use crate::error::{RelayError, RelayResult};
use crate::types::{Plan, Task};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

#[derive(Default)]
struct Store {
    messages: HashMap<String, Vec<ChatMessage>>,
    plans: HashMap<String, Plan>,
    users: HashMap<String, UserRecord>,
    room_users: HashMap<String, Vec<UserRecord>>,
    plan_updates: Vec<(String, PlanUpdate)>,
    task_updates: Vec<(String, TaskUpdate)>,
    failing: HashSet<String>,
}

#[derive(Default)]
pub struct InMemoryPersistence {
    store: RwLock<Store>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_message(&self, room_id: &str, message: ChatMessage) {
        self.store
            .write()
            .await
            .messages
            .entry(room_id.to_string())
            .or_default()
            .push(message);
    }

    pub async fn add_user(&self, user: UserRecord) {
        self.store
            .write()
            .await
            .users
            .insert(user.user_id.clone(), user);
    }

    pub async fn add_room_user(&self, room_id: &str, user: UserRecord) {
        let mut store = self.store.write().await;
        store.users.insert(user.user_id.clone(), user.clone());
        store
            .room_users
            .entry(room_id.to_string())
            .or_default()
            .push(user);
    }

    /// Make every subsequent call of `operation` (e.g. `"update_plan"`) fail
    pub async fn fail_on(&self, operation: &str) {
        self.store.write().await.failing.insert(operation.to_string());
    }

    pub async fn plan(&self, plan_id: &str) -> Option<Plan> {
        self.store.read().await.plans.get(plan_id).cloned()
    }

    pub async fn plan_updates(&self) -> Vec<(String, PlanUpdate)> {
        self.store.read().await.plan_updates.clone()
    }

    pub async fn task_updates(&self) -> Vec<(String, TaskUpdate)> {
        self.store.read().await.task_updates.clone()
    }

    fn check(store: &Store, operation: &str) -> RelayResult<()> {
        if store.failing.contains(operation) {
            return Err(RelayError::persistence(operation, "injected failure"));
        }
        Ok(())
    }
}

fn find_task<'a>(plans: &'a mut HashMap<String, Plan>, task_id: &str) -> Option<&'a mut Task> {
    plans.values_mut().find_map(|plan| plan.task_mut(task_id))
}

#[async_trait]
impl PersistenceService for InMemoryPersistence {
    async fn fetch_recent_messages(&self, room_id: &str, limit: usize) -> RelayResult<Vec<ChatMessage>> {
        let store = self.store.read().await;
        Self::check(&store, "get_messages")?;
        let messages = store.messages.get(room_id).cloned().unwrap_or_default();
        let skip = messages.len().saturating_sub(limit);
        Ok(messages.into_iter().skip(skip).collect())
    }

    async fn create_plan(&self, plan: &Plan) -> RelayResult<()> {
        let mut store = self.store.write().await;
        Self::check(&store, "create_plan")?;
        // keyed by the engine-assigned id, so a retry replaces rather than duplicates.
        // Tasks only arrive through create_tasks.
        let mut stored = plan.clone();
        stored.tasks.clear();
        store.plans.insert(plan.id.clone(), stored);
        Ok(())
    }

    async fn create_tasks(&self, plan_id: &str, tasks: &[Task]) -> RelayResult<()> {
        let mut store = self.store.write().await;
        Self::check(&store, "create_tasks")?;
        let plan = store
            .plans
            .get_mut(plan_id)
            .ok_or_else(|| RelayError::persistence("create_tasks", format!("plan {} not found", plan_id)))?;
        for task in tasks {
            match plan.task_mut(&task.id) {
                Some(existing) => *existing = task.clone(),
                None => plan.tasks.push(task.clone()),
            }
        }
        Ok(())
    }

    async fn update_task(&self, task_id: &str, update: TaskUpdate) -> RelayResult<()> {
        let mut store = self.store.write().await;
        Self::check(&store, "update_task")?;
        let task = find_task(&mut store.plans, task_id)
            .ok_or_else(|| RelayError::persistence("update_task", format!("task {} not found", task_id)))?;
        if let Some(status) = update.status {
            task.status = status;
        }
        if let Some(tool_calls) = &update.tool_calls {
            task.tool_calls = tool_calls.clone();
        }
        if let Some(logs) = &update.logs {
            task.results = logs.clone();
        }
        store.task_updates.push((task_id.to_string(), update));
        Ok(())
    }

    async fn update_plan(&self, plan_id: &str, update: PlanUpdate) -> RelayResult<()> {
        let mut store = self.store.write().await;
        Self::check(&store, "update_plan")?;
        let plan = store
            .plans
            .get_mut(plan_id)
            .ok_or_else(|| RelayError::persistence("update_plan", format!("plan {} not found", plan_id)))?;
        if let Some(status) = update.status {
            plan.status = status;
        }
        if let Some(progress) = update.progress {
            plan.progress = progress;
        }
        match (&update.logs, update.step_number) {
            (Some(PlanLogPayload::Entry(entry)), _) => plan.logs.push(entry.clone()),
            (Some(PlanLogPayload::StepResults(results)), Some(step)) => {
                plan.step_results.insert(step, results.clone());
            }
            _ => {}
        }
        store.plan_updates.push((plan_id.to_string(), update));
        Ok(())
    }

    async fn get_tasks(&self, plan_id: &str) -> RelayResult<Vec<TaskSnapshot>> {
        let store = self.store.read().await;
        Self::check(&store, "get_tasks")?;
        Ok(store
            .plans
            .get(plan_id)
            .map(|plan| plan.tasks.iter().map(TaskSnapshot::from).collect())
            .unwrap_or_default())
    }

    async fn get_user(&self, user_id: &str) -> RelayResult<UserRecord> {
        let store = self.store.read().await;
        Self::check(&store, "get_user")?;
        store
            .users
            .get(user_id)
            .cloned()
            .ok_or_else(|| RelayError::persistence("get_user", format!("user {} not found", user_id)))
    }

    async fn get_room_users(&self, room_id: &str, filter: &RoomUserFilter) -> RelayResult<RoomUsers> {
        let store = self.store.read().await;
        Self::check(&store, "get_users")?;
        let search = filter.search.to_lowercase();
        let matching: Vec<UserRecord> = store
            .room_users
            .get(room_id)
            .map(|users| {
                users
                    .iter()
                    .filter(|u| search.is_empty() || u.username.to_lowercase().contains(&search))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        let total = matching.len() as u64;
        let users = matching
            .into_iter()
            .skip(filter.offset as usize)
            .take(filter.limit as usize)
            .collect();
        Ok(RoomUsers {
            users,
            pagination: Some(super::Pagination { total: Some(total) }),
        })
    }
}
