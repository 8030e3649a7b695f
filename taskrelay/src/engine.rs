//! Engine workflows
//!
//! Each public operation runs one workflow end to end and never returns an error: failures
//! are logged and the operation returns whatever it got done. Plan and task records are an
//! advisory log, so a failed write leaves the in-memory view ahead of the store until a later
//! reconciliation.

use crate::approval::{AdminInstruction, ApprovalGate, ApprovalOutcome};
use crate::config::{EngineConfig, RelayConfig};
use crate::conversation::{strip_mention, to_conversation};
use crate::execution::{ExecutionReport, ProgressUpdate, StatusTracker, ToolExecutor};
use crate::llm::ModelOracle;
use crate::notify::{NotificationChannel, OutboundMessage, OutboundNotification};
use crate::persistence::{PersistenceService, PlanLogPayload, PlanUpdate, TaskUpdate};
use crate::planning::{PlanDraft, PlanGenerator, PlanningInput, TaskExtractor, ToolCallPlanner};
use crate::registry::{ServerDescriptor, ServerRegistry};
use crate::types::{
    timestamp, ConversationMessage, Plan, PlanContext, PlanLogEntry, PlanLogKind, PlanRequest,
    PlanStatus, Task, TaskStatus,
};
use crate::utils::bounded;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub struct Engine {
    registry: Arc<ServerRegistry>,
    persistence: Arc<dyn PersistenceService>,
    notifier: Arc<dyn NotificationChannel>,
    generator: PlanGenerator,
    planner: ToolCallPlanner,
    executor: ToolExecutor,
    gate: ApprovalGate,
    config: EngineConfig,
    message_limit: usize,
}

impl Engine {
    pub fn new(
        config: &RelayConfig,
        registry: Arc<ServerRegistry>,
        oracle: Arc<dyn ModelOracle>,
        persistence: Arc<dyn PersistenceService>,
        notifier: Arc<dyn NotificationChannel>,
    ) -> Self {
        let engine = config.engine.clone();
        let message_limit = config.persistence.message_limit;
        Self {
            generator: PlanGenerator::new(oracle.clone()).with_temperature(config.llm.temperature),
            planner: ToolCallPlanner::new(oracle.clone()),
            executor: ToolExecutor::new(registry.clone())
                .with_call_timeout(engine.tool_call_timeout()),
            gate: ApprovalGate::new(
                oracle,
                registry.clone(),
                persistence.clone(),
                notifier.clone(),
                engine.clone(),
                message_limit,
            ),
            registry,
            persistence,
            notifier,
            config: engine,
            message_limit,
        }
    }

    pub fn registry(&self) -> &Arc<ServerRegistry> {
        &self.registry
    }

    fn now(&self) -> String {
        timestamp(self.config.utc_offset_hours)
    }

    /// Draft a plan for the request, store it with its tasks and announce it in the room.
    /// Returns `None` only when no plan could be drafted.
    pub async fn create_plan(&self, request: &PlanRequest) -> Option<Plan> {
        let room_id = request.room_id.as_str();
        let messages = self
            .persistence
            .fetch_recent_messages(room_id, self.message_limit)
            .await
            .unwrap_or_else(|e| {
                warn!(room_id, "could not fetch messages: {}", e);
                Vec::new()
            });
        let query = strip_mention(&request.query);
        let mut conversation = to_conversation(&messages, &self.config.agent_sender);
        conversation.push(ConversationMessage::user(query.clone()));

        let provider_names = self.registry.provider_names().await;
        let descriptions = self.registry.describe_providers().await;
        let additional_context = format!("Current datetime: {}", self.now());
        let input = PlanningInput {
            conversation: &conversation,
            provider_names: &provider_names,
            provider_descriptions: &descriptions,
            additional_context: &additional_context,
        };

        let draft = match bounded(
            "plan generation",
            Some(self.config.plan_timeout()),
            self.generator.generate(&input),
        )
        .await
        {
            Ok(draft) => draft,
            Err(e) => {
                error!(room_id, "plan generation failed: {}", e);
                return None;
            }
        };

        let mut plan = self.new_plan(request, &draft, conversation, query);
        let tasks = TaskExtractor::new(&provider_names).extract(&draft, &plan.id);
        info!(plan_id = %plan.id, tasks = tasks.len(), "plan created");

        if let Err(e) = self.persistence.create_plan(&plan).await {
            error!(plan_id = %plan.id, "could not store plan: {}", e);
            plan.tasks = tasks;
            return Some(plan);
        }
        self.announce_plan(&plan).await;

        if tasks.is_empty() {
            let update = StatusTracker::after_step(0, 0);
            update.apply_to(&mut plan);
            self.write_plan_update(
                &plan.id,
                PlanUpdate {
                    status: Some(update.status),
                    progress: Some(update.progress),
                    completed_at: Some(self.now()),
                    ..PlanUpdate::default()
                },
            )
            .await;
        } else if let Err(e) = self.persistence.create_tasks(&plan.id, &tasks).await {
            error!(plan_id = %plan.id, "could not store tasks: {}", e);
        }
        plan.tasks = tasks;
        Some(plan)
    }

    fn new_plan(
        &self,
        request: &PlanRequest,
        draft: &PlanDraft,
        conversation: Vec<ConversationMessage>,
        query: String,
    ) -> Plan {
        let id = Uuid::new_v4().to_string();
        let created = PlanLogEntry::new(
            PlanLogKind::PlanCreated,
            format!("Plan **{}** has been created", draft.name()),
            Some(id.clone()),
            self.now(),
        );
        Plan {
            id,
            name: draft.name().to_string(),
            overview: draft.overview().to_string(),
            room_id: request.room_id.clone(),
            assigner: request.assigner.clone(),
            assignee: request.assignee.clone(),
            reviewer: request.reviewer.clone(),
            tasks: Vec::new(),
            status: PlanStatus::Created,
            progress: 0,
            logs: vec![created],
            step_results: Default::default(),
            context: PlanContext {
                plan: draft.raw.clone(),
                conversations: conversation,
                query,
            },
            no_skills_needed: draft.is_zero_task(),
        }
    }

    async fn announce_plan(&self, plan: &Plan) {
        let Some(assignee) = plan.assignee.as_deref() else {
            debug!(plan_id = %plan.id, "plan has no assignee to announce as");
            return;
        };
        let sender = match self.persistence.get_user(assignee).await {
            Ok(user) => user,
            Err(e) => {
                warn!(plan_id = %plan.id, user_id = assignee, "could not fetch assignee: {}", e);
                return;
            }
        };
        let content = format!(
            "✅ **A new plan has been created!**\n\n\
             **Plan Name:** `{}`\n\
             **Plan ID:** `{}`\n\n\
             **Plan Overview:**\n{}\n\n\
             Review the plan or assign its tasks; use the Plan ID above to refer to it.",
            plan.name, plan.id, plan.overview
        );
        let message = OutboundMessage::new(&plan.room_id, sender, content, self.now());
        if let Err(e) = self.notifier.send_message(message).await {
            warn!(plan_id = %plan.id, "plan announcement not delivered: {}", e);
        }
    }

    /// Ask the oracle which tools the task should call, store them on the task and mark it
    /// pending. Returns the updated task, or `None` when the oracle call failed.
    pub async fn plan_task(&self, plan: &Plan, task: &Task) -> Option<Task> {
        let intents = match self.provider_for(task).await {
            Some(provider) => {
                match bounded(
                    "tool-call planning",
                    Some(self.config.plan_timeout()),
                    self.planner.plan(plan, task, &provider),
                )
                .await
                {
                    Ok(intents) => intents,
                    Err(e) => {
                        error!(plan_id = %plan.id, task_id = %task.id, "tool-call planning failed: {}", e);
                        return None;
                    }
                }
            }
            None => Vec::new(),
        };

        let mut planned = task.clone();
        planned.tool_calls = intents;
        planned.status = TaskStatus::Pending;
        let update = TaskUpdate {
            status: Some(TaskStatus::Pending),
            tool_calls: Some(planned.tool_calls.clone()),
            ..TaskUpdate::default()
        };
        if let Err(e) = self.persistence.update_task(&task.id, update).await {
            error!(task_id = %task.id, "could not store planned tool calls: {}", e);
        }
        self.notify(plan, format!("Task {} has been created", task.id)).await;
        Some(planned)
    }

    async fn provider_for(&self, task: &Task) -> Option<ServerDescriptor> {
        let Some(name) = task.assigned_provider.as_deref() else {
            warn!(task_id = %task.id, "task has no assigned provider");
            return None;
        };
        let descriptor = self.registry.descriptor(name).await;
        if descriptor.is_none() {
            warn!(task_id = %task.id, provider = name, "assigned provider is not registered");
        }
        descriptor
    }

    /// Run the task's planned calls, store the results and advance the plan's progress.
    pub async fn execute_task(&self, plan: &Plan, task: &Task) -> ExecutionReport {
        let report = self.executor.execute(task).await;
        if report.had_failures() {
            warn!(task_id = %task.id, skipped = report.skipped.len(), "task finished with skipped calls");
        }

        let update = TaskUpdate {
            status: Some(report.status),
            logs: Some(report.results.clone()),
            step_number: Some(task.step_number),
            ..TaskUpdate::default()
        };
        if let Err(e) = self.persistence.update_task(&task.id, update).await {
            error!(task_id = %task.id, "could not store task results: {}", e);
        }

        // without a task count only the step results are recorded
        let progress = self
            .task_count(plan)
            .await
            .map(|total| {
                StatusTracker::after_step(task.step_number, total.max(task.step_number as usize))
            });
        self.write_plan_update(
            &plan.id,
            PlanUpdate {
                status: progress.map(|p| p.status),
                progress: progress.map(|p| p.progress),
                logs: Some(PlanLogPayload::StepResults(report.results.clone())),
                step_number: Some(task.step_number),
                completed_at: None,
            },
        )
        .await;

        self.notify(plan, format!("Task {} has been executed", task.id)).await;
        report
    }

    /// Number of tasks in the plan, `None` when it cannot be determined
    async fn task_count(&self, plan: &Plan) -> Option<usize> {
        if !plan.tasks.is_empty() {
            return Some(plan.tasks.len());
        }
        match self.persistence.get_tasks(&plan.id).await {
            Ok(tasks) if !tasks.is_empty() => Some(tasks.len()),
            Ok(_) => {
                warn!(plan_id = %plan.id, "plan has no stored tasks, progress left unchanged");
                None
            }
            Err(e) => {
                warn!(plan_id = %plan.id, "could not count tasks, progress left unchanged: {}", e);
                None
            }
        }
    }

    /// Settle the plan's terminal status from its stored tasks. `None` when the tasks could
    /// not be read or some are still open.
    pub async fn reconcile_plan(&self, plan_id: &str) -> Option<ProgressUpdate> {
        let tasks = match self.persistence.get_tasks(plan_id).await {
            Ok(tasks) => tasks,
            Err(e) => {
                error!(plan_id, "could not read tasks: {}", e);
                return None;
            }
        };
        let statuses: Vec<_> = tasks.iter().map(|t| t.status).collect();
        let update = StatusTracker::reconcile(&statuses)?;
        self.write_plan_update(
            plan_id,
            PlanUpdate {
                status: Some(update.status),
                progress: Some(update.progress),
                completed_at: Some(self.now()),
                ..PlanUpdate::default()
            },
        )
        .await;
        info!(plan_id, status = %update.status, progress = update.progress, "plan reconciled");
        Some(update)
    }

    pub async fn process_admin_message(&self, instruction: &AdminInstruction) -> Option<ApprovalOutcome> {
        match self.gate.process(instruction).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!(room_id = %instruction.room_id, "administrator instruction failed: {}", e);
                None
            }
        }
    }

    /// Provider snapshot, optionally re-listing every catalog first
    pub async fn servers(&self, refresh: bool) -> Vec<ServerDescriptor> {
        self.registry.servers(refresh).await
    }

    async fn write_plan_update(&self, plan_id: &str, update: PlanUpdate) {
        if let Err(e) = self.persistence.update_plan(plan_id, update).await {
            error!(plan_id, "could not update plan: {}", e);
        }
    }

    async fn notify(&self, plan: &Plan, message: String) {
        let notification = OutboundNotification::new(
            &plan.room_id,
            message,
            plan.assignee.clone(),
            Some(plan.id.clone()),
            self.now(),
        );
        if let Err(e) = self.notifier.send_notification(notification).await {
            warn!(plan_id = %plan.id, "notification not delivered: {}", e);
        }
    }
}

