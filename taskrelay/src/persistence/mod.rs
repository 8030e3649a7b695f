//! Persistence service boundary
//!
//! The plan/task store is an external REST service. All calls are best-effort: no automatic
//! retry and no rollback of earlier calls when a later one fails.

pub mod http;
pub mod memory;
pub mod records;

use crate::error::RelayResult;
use crate::types::{Plan, Task};
use async_trait::async_trait;

pub use http::HttpPersistence;
pub use memory::InMemoryPersistence;
pub use records::*;

#[async_trait]
pub trait PersistenceService: Send + Sync {
    async fn fetch_recent_messages(&self, room_id: &str, limit: usize) -> RelayResult<Vec<ChatMessage>>;

    /// Store a new plan. The plan id is assigned by the engine, so a retried call can be
    /// de-duplicated by id.
    async fn create_plan(&self, plan: &Plan) -> RelayResult<()>;

    async fn create_tasks(&self, plan_id: &str, tasks: &[Task]) -> RelayResult<()>;

    async fn update_task(&self, task_id: &str, update: TaskUpdate) -> RelayResult<()>;

    async fn update_plan(&self, plan_id: &str, update: PlanUpdate) -> RelayResult<()>;

    async fn get_tasks(&self, plan_id: &str) -> RelayResult<Vec<TaskSnapshot>>;

    async fn get_user(&self, user_id: &str) -> RelayResult<UserRecord>;

    async fn get_room_users(&self, room_id: &str, filter: &RoomUserFilter) -> RelayResult<RoomUsers>;
}
