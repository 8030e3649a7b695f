//! Trust-gated administrative actions
//!
//! An administrator instruction is turned into exactly one proposed action by the oracle,
//! restricted to the administrative provider's catalog. Untrusted requests are recorded as a
//! pending approval on the plan and announced in the room; nothing is executed.

use crate::config::EngineConfig;
use crate::conversation::{format_conversation, format_room_users, to_conversation};
use crate::error::{RelayError, RelayResult};
use crate::llm::tool_calling::{resolve_source_name, tool_definitions};
use crate::llm::{ModelOracle, OracleMessage, OracleRequest, ToolChoice};
use crate::notify::{NotificationChannel, OutboundMessage};
use crate::persistence::{
    PersistenceService, PlanLogPayload, PlanUpdate, RoomUserFilter, RoomUsers, UserRecord,
};
use crate::planning::prompts::{admin_user_prompt, ADMIN_SYSTEM_PROMPT};
use crate::registry::ServerRegistry;
use crate::types::{timestamp, ApprovalRequest, PlanLogEntry, PlanLogKind, ToolCallIntent};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// Tool name the oracle picks when no administrative action is needed
pub const IDLE_ACTION: &str = "idle";

const ADMIN_USERNAME: &str = "admin";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminInstruction {
    pub room_id: String,
    #[serde(alias = "owner_message")]
    pub message: String,
    pub owner_id: String,
    #[serde(default)]
    pub trust: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ApprovalOutcome {
    /// The oracle chose the idle action; nothing was recorded
    Idle,
    /// The actions were recorded on the plan and await confirmation
    PendingApproval { request: ApprovalRequest },
    /// Trusted requests have no execution path yet; nothing was recorded or executed
    TrustedNotExecuted { request: ApprovalRequest },
}

pub struct ApprovalGate {
    oracle: Arc<dyn ModelOracle>,
    registry: Arc<ServerRegistry>,
    persistence: Arc<dyn PersistenceService>,
    notifier: Arc<dyn NotificationChannel>,
    engine: EngineConfig,
    message_limit: usize,
}

impl ApprovalGate {
    pub fn new(
        oracle: Arc<dyn ModelOracle>,
        registry: Arc<ServerRegistry>,
        persistence: Arc<dyn PersistenceService>,
        notifier: Arc<dyn NotificationChannel>,
        engine: EngineConfig,
        message_limit: usize,
    ) -> Self {
        Self {
            oracle,
            registry,
            persistence,
            notifier,
            engine,
            message_limit,
        }
    }

    pub async fn process(&self, instruction: &AdminInstruction) -> RelayResult<ApprovalOutcome> {
        let room_id = instruction.room_id.as_str();
        let admin = self
            .registry
            .descriptor(&self.engine.admin_provider)
            .await
            .ok_or_else(|| RelayError::UnknownProvider(self.engine.admin_provider.clone()))?;

        let messages = self
            .persistence
            .fetch_recent_messages(room_id, self.message_limit)
            .await
            .unwrap_or_else(|e| {
                warn!(room_id, "could not fetch messages: {}", e);
                Vec::new()
            });
        let room_users = self
            .persistence
            .get_room_users(room_id, &RoomUserFilter::default())
            .await
            .unwrap_or_else(|e| {
                warn!(room_id, "could not fetch room users: {}", e);
                RoomUsers::default()
            });

        let conversation = to_conversation(&messages, &self.engine.agent_sender);
        let definitions = tool_definitions(&admin.catalog);
        let request = OracleRequest {
            system: ADMIN_SYSTEM_PROMPT.to_string(),
            messages: vec![OracleMessage::user(admin_user_prompt(
                &format_conversation(&conversation, true),
                room_id,
                &format_room_users(&room_users),
                &instruction.message,
            ))],
            tools: definitions.clone(),
            tool_choice: ToolChoice::Required,
            temperature: None,
        };

        let response = self.oracle.complete(request).await?;
        let actions: Vec<ToolCallIntent> = response
            .tool_calls
            .into_iter()
            .filter_map(|call| {
                resolve_source_name(&call.tool_name, &definitions).map(|source| ToolCallIntent {
                    tool_name: source.to_string(),
                    target_provider: admin.name.clone(),
                    arguments: call.arguments,
                })
            })
            .collect();

        let action = actions.first().ok_or_else(|| {
            RelayError::MalformedModelOutput("no administrative action selected".to_string())
        })?;
        if action.tool_name == IDLE_ACTION {
            info!(room_id, "administrator instruction needs no action");
            return Ok(ApprovalOutcome::Idle);
        }

        let plan_id = action
            .argument("plan_id")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                RelayError::MalformedModelOutput(format!(
                    "action '{}' carries no plan_id",
                    action.tool_name
                ))
            })?
            .to_string();

        let request = ApprovalRequest {
            plan_id,
            actions,
            requester_id: instruction.owner_id.clone(),
            trust: instruction.trust,
        };

        if instruction.trust {
            // trusted requests have no execution path
            warn!(plan_id = %request.plan_id, "trusted administrative actions are not executed");
            return Ok(ApprovalOutcome::TrustedNotExecuted { request });
        }

        self.record_pending(&request).await?;
        self.announce(room_id, &request).await;
        Ok(ApprovalOutcome::PendingApproval { request })
    }

    async fn record_pending(&self, request: &ApprovalRequest) -> RelayResult<()> {
        let mut entry = PlanLogEntry::new(
            PlanLogKind::AskForPlanApproval,
            serde_json::to_string(&request.actions)?,
            None,
            timestamp(self.engine.utc_offset_hours),
        );
        entry.skills = request.actions.clone();
        self.persistence
            .update_plan(
                &request.plan_id,
                PlanUpdate {
                    logs: Some(PlanLogPayload::Entry(entry)),
                    ..PlanUpdate::default()
                },
            )
            .await?;
        info!(plan_id = %request.plan_id, actions = request.actions.len(), "approval requested");
        Ok(())
    }

    async fn announce(&self, room_id: &str, request: &ApprovalRequest) {
        let owner = match self.persistence.get_user(&request.requester_id).await {
            Ok(user) => user,
            Err(e) => {
                warn!(user_id = %request.requester_id, "could not fetch owner: {}", e);
                UserRecord {
                    user_id: request.requester_id.clone(),
                    ..UserRecord::default()
                }
            }
        };
        let sender = UserRecord {
            username: ADMIN_USERNAME.to_string(),
            avatar: None,
            ..owner
        };
        let content = format!(
            "Plan {} has {} proposed action(s) awaiting approval",
            request.plan_id,
            request.actions.len()
        );
        let message = OutboundMessage::new(
            room_id,
            sender,
            content,
            timestamp(self.engine.utc_offset_hours),
        );
        if let Err(e) = self.notifier.send_message(message).await {
            warn!(room_id, "approval message not delivered: {}", e);
        }
    }
}
