//! Plan progress and terminal status
//!
//! Two update paths that can disagree. The per-step path runs after each task and drives
//! in-flight progress; reconciliation looks at every stored task and is the authority for the
//! terminal status.

use crate::types::{Plan, PlanStatus, TaskStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub status: PlanStatus,
    pub progress: u8,
}

impl ProgressUpdate {
    pub fn apply_to(&self, plan: &mut Plan) {
        plan.status = self.status;
        plan.progress = self.progress;
    }
}

pub struct StatusTracker;

impl StatusTracker {
    /// Progress after the task at `step_number` of `total_tasks` completed:
    /// floor(100 * step / total), running until the last step. A zero-task plan is a success.
    pub fn after_step(step_number: u32, total_tasks: usize) -> ProgressUpdate {
        if total_tasks == 0 {
            return ProgressUpdate {
                status: PlanStatus::Success,
                progress: 100,
            };
        }
        let step = step_number as usize;
        let progress = (100 * step / total_tasks).min(100) as u8;
        let status = if step < total_tasks {
            PlanStatus::Running
        } else {
            PlanStatus::Success
        };
        ProgressUpdate { status, progress }
    }

    /// Terminal status once every task is success or failed: success only if all succeeded,
    /// progress = round(100 * successes / total). `None` while any task is still open or when
    /// there are no tasks. Unknown statuses count as open.
    pub fn reconcile(statuses: &[Option<TaskStatus>]) -> Option<ProgressUpdate> {
        if statuses.is_empty() {
            return None;
        }
        if !statuses.iter().all(|s| s.is_some_and(TaskStatus::is_terminal)) {
            return None;
        }
        let total = statuses.len();
        let successes = statuses
            .iter()
            .filter(|s| **s == Some(TaskStatus::Success))
            .count();
        // integer round-half-up of 100 * successes / total
        let progress = ((200 * successes + total) / (2 * total)) as u8;
        let status = if successes == total {
            PlanStatus::Success
        } else {
            PlanStatus::Failed
        };
        Some(ProgressUpdate { status, progress })
    }
}
