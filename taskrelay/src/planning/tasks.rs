//! Plan draft to ordered tasks

use super::generator::PlanDraft;
use crate::types::Task;
use tracing::{debug, warn};

pub const DEFAULT_TASK_NAME: &str = "Execute request";
const DEFAULT_TASK_EXPLANATION: &str = "Process the user request";
const DEFAULT_TASK_RESULT: &str = "Complete the requested task";

/// Turns a plan draft into tasks with contiguous step numbers
pub struct TaskExtractor<'a> {
    registered: &'a [String],
}

impl<'a> TaskExtractor<'a> {
    /// `registered` is the set of provider names a task may be assigned to
    pub fn new(registered: &'a [String]) -> Self {
        Self { registered }
    }

    /// Step keys are ordered lexicographically, so `step_10` comes before `step_2`. Steps
    /// without a usable assignee are dropped and the survivors are numbered 1..N.
    pub fn extract(&self, draft: &PlanDraft, plan_id: &str) -> Vec<Task> {
        if draft.is_zero_task() {
            debug!(plan_id, "zero-task plan");
            return Vec::new();
        }

        let mut keys: Vec<&String> = draft.steps.keys().collect();
        keys.sort();

        let mut tasks = Vec::new();
        for key in keys {
            let step = &draft.steps[key.as_str()];
            let Some(assignee) = step.assignee.as_deref().map(str::trim) else {
                debug!(plan_id, step = %key, "dropping step without assignee");
                continue;
            };
            if assignee.is_empty() || assignee.to_lowercase().contains("none") {
                debug!(plan_id, step = %key, assignee, "dropping unassigned step");
                continue;
            }
            if !self.registered.iter().any(|name| name == assignee) {
                warn!(plan_id, step = %key, assignee, "dropping step assigned to unknown provider");
                continue;
            }

            let step_number = tasks.len() as u32 + 1;
            let name = step
                .name
                .clone()
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| format!("Step {}", step_number));
            let mut task = Task::new(plan_id, step_number, name);
            task.explanation = step.explanation.clone();
            task.expected_result = step.expected_result.clone();
            task.assigned_provider = Some(assignee.to_string());
            tasks.push(task);
        }

        if tasks.is_empty() {
            debug!(plan_id, "no assignable steps, using the default task");
            let mut task = Task::new(plan_id, 1, DEFAULT_TASK_NAME);
            task.explanation = draft
                .plan_overview
                .clone()
                .unwrap_or_else(|| DEFAULT_TASK_EXPLANATION.to_string());
            task.expected_result = DEFAULT_TASK_RESULT.to_string();
            tasks.push(task);
        }
        tasks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn registered() -> Vec<String> {
        vec!["web".to_string(), "weather".to_string()]
    }

    fn extract(plan: serde_json::Value) -> Vec<Task> {
        let draft = PlanDraft::from_value(plan).unwrap();
        TaskExtractor::new(&registered()).extract(&draft, "p1")
    }

    #[test]
    fn steps_sort_lexicographically_and_renumber() {
        let tasks = extract(json!({
            "plan_name": "Trip",
            "plan": {
                "step_2": {"name": "second", "assignee": "web"},
                "step_10": {"name": "tenth", "assignee": "weather"},
                "step_1": {"name": "first", "assignee": "web"}
            }
        }));
        let names: Vec<_> = tasks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["first", "tenth", "second"]);
        let steps: Vec<_> = tasks.iter().map(|t| t.step_number).collect();
        assert_eq!(steps, vec![1, 2, 3]);
    }

    #[test]
    fn unassigned_steps_are_dropped_and_gaps_closed() {
        let tasks = extract(json!({
            "plan_name": "Trip",
            "plan": {
                "step_1": {"name": "a", "assignee": "web"},
                "step_2": {"name": "b", "assignee": "None"},
                "step_3": {"name": "c"},
                "step_4": {"name": "d", "assignee": "nobody (none needed)"},
                "step_5": {"name": "e", "assignee": "ghost"},
                "step_6": {"name": "f", "assignee": "weather"}
            }
        }));
        let summary: Vec<_> = tasks
            .iter()
            .map(|t| (t.step_number, t.name.as_str(), t.assigned_provider.as_deref()))
            .collect();
        assert_eq!(summary, vec![(1, "a", Some("web")), (2, "f", Some("weather"))]);
        assert!(tasks.iter().all(|t| t.plan_id == "p1"));
    }

    #[test]
    fn all_dropped_yields_default_task() {
        let tasks = extract(json!({
            "plan_name": "Trip",
            "plan_overview": "Plan a trip",
            "plan": {"step_1": {"name": "a", "assignee": "none"}}
        }));
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].name, DEFAULT_TASK_NAME);
        assert_eq!(tasks[0].explanation, "Plan a trip");
        assert_eq!(tasks[0].expected_result, "Complete the requested task");
        assert_eq!(tasks[0].step_number, 1);
        assert_eq!(tasks[0].assigned_provider, None);
    }

    #[test]
    fn zero_task_plans_yield_nothing() {
        assert!(extract(json!({"plan_name": "x", "plan": {}})).is_empty());
        assert!(extract(json!({
            "plan_name": "Null_Plan",
            "plan": {"step_1": {"name": "a", "assignee": "web"}}
        }))
        .is_empty());
        assert!(extract(json!({
            "plan_name": "x",
            "no_skills_needed": true,
            "plan": {"step_1": {"name": "a", "assignee": "none"}}
        }))
        .is_empty());
    }

    #[test]
    fn missing_names_use_the_step_number() {
        let tasks = extract(json!({
            "plan_name": "Trip",
            "plan": {"step_1": {"assignee": "none"}, "step_2": {"assignee": "web"}}
        }));
        assert_eq!(tasks[0].name, "Step 1");
    }
}
