mod common;

use common::{fenced, user, FakeSession, Harness};
use pretty_assertions::assert_eq;
use serde_json::json;
use taskrelay::persistence::{ChatMessage, PersistenceService, PlanLogPayload, SenderRef};
use taskrelay::types::{PlanLogKind, PlanRequest, PlanStatus, Task, TaskStatus};
use taskrelay::{Plan, ProgressUpdate};

fn request(query: &str) -> PlanRequest {
    PlanRequest {
        room_id: "room-1".to_string(),
        query: query.to_string(),
        assigner: Some("u-owner".to_string()),
        assignee: Some("u-agent".to_string()),
        reviewer: None,
    }
}

async fn harness() -> Harness {
    let h = Harness::new(vec![
        (
            "web",
            "You provide the web search",
            FakeSession::new().tool("search", Err("pipe closed")).tool("fetch", Ok("page body")),
        ),
        (
            "weather",
            "You provide the weather forecasts",
            FakeSession::new().tool("forecast", Ok("sunny")),
        ),
    ])
    .await;
    h.persistence.add_user(user("u-agent", "relay-bot")).await;
    h
}

fn three_step_plan() -> String {
    fenced(json!({
        "plan_name": "Weekend trip",
        "plan_overview": "Check weather and find things to do",
        "plan": {
            "step_1": {"name": "Forecast", "explanation": "need weather", "expected_result": "forecast", "assignee": "weather"},
            "step_2": {"name": "Search", "explanation": "find events", "expected_result": "events", "assignee": "web"},
            "step_3": {"name": "Wrap up", "assignee": "none"},
            "step_4": {"name": "Read", "explanation": "read details", "expected_result": "details", "assignee": "web"}
        }
    }))
}

async fn created_plan(h: &Harness) -> Plan {
    h.oracle.reply_text(&three_step_plan());
    h.engine.create_plan(&request("@agent plan my weekend")).await.unwrap()
}

#[tokio::test]
async fn test_create_plan_persists_tasks_and_announces() {
    let h = harness().await;
    h.persistence
        .add_message(
            "room-1",
            ChatMessage {
                id: None,
                sender: SenderRef::Id("agent".to_string()),
                content: "Hello, how can I help?".to_string(),
                created_at: Some("2025-05-01T10:00:00+08:00".to_string()),
            },
        )
        .await;

    let plan = created_plan(&h).await;

    let steps: Vec<_> = plan
        .tasks
        .iter()
        .map(|t| (t.step_number, t.name.as_str(), t.assigned_provider.as_deref()))
        .collect();
    assert_eq!(
        steps,
        vec![(1, "Forecast", Some("weather")), (2, "Search", Some("web")), (3, "Read", Some("web"))]
    );
    assert_eq!(plan.status, PlanStatus::Created);
    assert!(!plan.no_skills_needed);
    assert_eq!(plan.context.query, "plan my weekend");
    assert_eq!(plan.logs[0].kind, PlanLogKind::PlanCreated);
    assert_eq!(plan.logs[0].content, "Plan **Weekend trip** has been created");

    let stored = h.persistence.plan(&plan.id).await.unwrap();
    assert_eq!(stored.tasks.len(), 3);
    assert_eq!(stored.name, "Weekend trip");

    let messages = h.notifier.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].sender.username, "relay-bot");
    assert!(messages[0].content.contains("**Plan ID:** `"));
    assert!(messages[0].content.contains(&plan.id));

    let prompt = &h.oracle.request(0).messages[0].content;
    assert!(prompt.contains("Assistant [2025-05-01T10:00:00+08:00]: Hello, how can I help?"));
    assert!(prompt.contains("User: plan my weekend"));
    assert!(prompt.contains("assistant name: web"));
    assert!(prompt.contains("The assistant has web search"));
    assert!(prompt.contains("- search: search tool\n"));
}

#[tokio::test]
async fn test_zero_task_plan_is_immediately_successful() {
    let h = harness().await;
    h.oracle.reply_text(&fenced(json!({
        "plan_name": "null_plan",
        "plan_overview": "Just a greeting",
        "plan": {"step_1": {"name": "Say hi", "assignee": "web"}}
    })));

    let plan = h.engine.create_plan(&request("@agent hi")).await.unwrap();
    assert!(plan.tasks.is_empty());
    assert!(plan.no_skills_needed);
    assert_eq!((plan.status, plan.progress), (PlanStatus::Success, 100));

    let stored = h.persistence.plan(&plan.id).await.unwrap();
    assert_eq!((stored.status, stored.progress), (PlanStatus::Success, 100));
    let updates = h.persistence.plan_updates().await;
    assert_eq!(updates.len(), 1);
    assert!(updates[0].1.completed_at.is_some());
}

#[tokio::test]
async fn test_unparseable_plan_yields_nothing() {
    let h = harness().await;
    h.oracle.reply_text("I would rather not.");
    assert!(h.engine.create_plan(&request("@agent plan")).await.is_none());
    assert!(h.notifier.messages().is_empty());
    assert!(h.persistence.plan_updates().await.is_empty());
}

#[tokio::test]
async fn test_plan_survives_failed_task_persistence() {
    let h = harness().await;
    h.persistence.fail_on("create_tasks").await;
    let plan = created_plan(&h).await;
    assert_eq!(plan.tasks.len(), 3);
    assert!(h.persistence.plan(&plan.id).await.unwrap().tasks.is_empty());
}

#[tokio::test]
async fn test_connectivity_failure_skips_call_and_task_succeeds() {
    let h = harness().await;
    let plan = created_plan(&h).await;
    let search_task = plan.tasks[1].clone();

    h.oracle.reply_tool_calls(vec![
        ("search", json!({"q": "x"})),
        ("fetch", json!({"q": "events page"})),
        ("delete_everything", json!({})),
    ]);
    let planned = h.engine.plan_task(&plan, &search_task).await.unwrap();
    assert_eq!(planned.status, TaskStatus::Pending);
    let tools: Vec<_> = planned.tool_calls.iter().map(|c| c.tool_name.as_str()).collect();
    assert_eq!(tools, vec!["search", "fetch"]);

    let tool_request = h.oracle.request(1);
    assert_eq!(tool_request.tools.len(), 2);
    assert!(tool_request.system.contains("You provide the web search"));

    let report = h.engine.execute_task(&plan, &planned).await;
    assert_eq!(report.status, TaskStatus::Success);
    assert!(report.had_failures());
    assert!(!report.results.keys().any(|k| k.starts_with("search")));
    assert_eq!(report.results["fetch_0"], "page body");

    let stored = h.persistence.plan(&plan.id).await.unwrap();
    let task = stored.task(&search_task.id).unwrap();
    assert_eq!(task.status, TaskStatus::Success);
    assert_eq!(task.tool_calls.len(), 2);
    assert_eq!(stored.step_results[&2]["fetch_0"], "page body");
    assert_eq!((stored.status, stored.progress), (PlanStatus::Running, 66));

    let notes: Vec<_> = h.notifier.notifications().into_iter().map(|n| n.message).collect();
    assert_eq!(
        notes,
        vec![
            format!("Task {} has been created", search_task.id),
            format!("Task {} has been executed", search_task.id),
        ]
    );
}

#[tokio::test]
async fn test_sequential_execution_advances_progress() {
    let h = harness().await;
    let plan = created_plan(&h).await;

    for task in &plan.tasks {
        let tool = if task.assigned_provider.as_deref() == Some("weather") {
            "forecast"
        } else {
            "fetch"
        };
        // callers pass the plan as currently stored, with earlier step results
        let current = h.persistence.plan(&plan.id).await.unwrap();
        h.oracle.reply_tool_calls(vec![(tool, json!({"q": "x"}))]);
        let planned = h.engine.plan_task(&current, task).await.unwrap();
        h.engine.execute_task(&current, &planned).await;
    }

    let progress: Vec<_> = h
        .persistence
        .plan_updates()
        .await
        .into_iter()
        .filter(|(_, u)| matches!(u.logs, Some(PlanLogPayload::StepResults(_))))
        .map(|(_, u)| (u.status.unwrap(), u.progress.unwrap()))
        .collect();
    assert_eq!(
        progress,
        vec![
            (PlanStatus::Running, 33),
            (PlanStatus::Running, 66),
            (PlanStatus::Success, 100),
        ]
    );

    // the third task saw the first two steps' results
    let last_prompt = &h.oracle.request(3).messages[0].content;
    assert!(last_prompt.contains("Step 1: Skill: forecast_0\nResult: sunny"));
    assert!(last_prompt.contains("Step 2: Skill: fetch_0\nResult: page body"));
}

#[tokio::test]
async fn test_unknown_task_count_keeps_progress_but_records_results() {
    let h = harness().await;
    let plan = created_plan(&h).await;
    let forecast_task = plan.tasks[0].clone();
    h.oracle.reply_tool_calls(vec![("forecast", json!({"city": "Paris"}))]);
    let planned = h.engine.plan_task(&plan, &forecast_task).await.unwrap();

    // the caller's view carries no tasks and the store cannot list them
    let mut without_tasks = plan.clone();
    without_tasks.tasks.clear();
    h.persistence.fail_on("get_tasks").await;
    let report = h.engine.execute_task(&without_tasks, &planned).await;
    assert_eq!(report.results["forecast_0"], "sunny");

    let updates = h.persistence.plan_updates().await;
    let (_, last) = updates.last().unwrap();
    assert_eq!((last.status, last.progress), (None, None));
    assert_eq!(last.step_number, Some(1));

    let stored = h.persistence.plan(&plan.id).await.unwrap();
    assert_eq!((stored.status, stored.progress), (PlanStatus::Created, 0));
    assert_eq!(stored.step_results[&1]["forecast_0"], "sunny");
}

#[tokio::test]
async fn test_task_without_provider_plans_no_calls() {
    let h = harness().await;
    let plan = created_plan(&h).await;
    let orphan = Task::new(&plan.id, 1, "Execute request");

    let planned = h.engine.plan_task(&plan, &orphan).await.unwrap();
    assert!(planned.tool_calls.is_empty());
    // only the plan request reached the oracle
    assert_eq!(h.oracle.requests.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_reconcile_mixed_outcome() {
    let h = harness().await;
    let plan = created_plan(&h).await;
    let outcomes = [TaskStatus::Success, TaskStatus::Success, TaskStatus::Failed];
    for (task, status) in plan.tasks.iter().zip(outcomes) {
        h.persistence
            .update_task(
                &task.id,
                taskrelay::persistence::TaskUpdate {
                    status: Some(status),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }

    let update = h.engine.reconcile_plan(&plan.id).await.unwrap();
    assert_eq!(update, ProgressUpdate { status: PlanStatus::Failed, progress: 67 });

    let stored = h.persistence.plan(&plan.id).await.unwrap();
    assert_eq!((stored.status, stored.progress), (PlanStatus::Failed, 67));
}

#[tokio::test]
async fn test_reconcile_waits_for_open_tasks() {
    let h = harness().await;
    let plan = created_plan(&h).await;
    assert_eq!(h.engine.reconcile_plan(&plan.id).await, None);
    assert_eq!(h.engine.reconcile_plan("no-such-plan").await, None);
    assert_eq!(h.persistence.plan(&plan.id).await.unwrap().status, PlanStatus::Created);
}

#[tokio::test]
async fn test_servers_snapshot() {
    let h = harness().await;
    let servers = h.engine.servers(false).await;
    let names: Vec<_> = servers.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["web", "weather"]);
    assert_eq!(servers[0].catalog.len(), 2);
}
