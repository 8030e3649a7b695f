//! Task to tool-call intents
//!
//! The oracle sees only the assigned provider's catalog and must select at least one tool.
//! Selections naming a tool outside that catalog are dropped; selections whose arguments did
//! not parse are kept as unresolved and skipped at execution time.

use super::prompts::{tool_call_system_prompt, tool_call_user_prompt};
use crate::error::RelayResult;
use crate::llm::tool_calling::{resolve_source_name, tool_definitions};
use crate::llm::{ModelOracle, OracleMessage, OracleRequest, ToolChoice};
use crate::registry::ServerDescriptor;
use crate::types::{Plan, Task, ToolCallIntent};
use std::fmt::Write;
use std::sync::Arc;
use tracing::{info, warn};

/// Transcript newest-first, then the recorded results of every earlier step in order
pub fn background_summary(plan: &Plan, step_number: u32) -> String {
    let mut background = String::from("Conversations:\n");
    for message in plan.context.conversations.iter().rev() {
        match message.created_at.as_deref().filter(|ts| !ts.is_empty()) {
            Some(ts) => {
                let _ = writeln!(background, "[{}] {}: {}", ts, message.role.as_str(), message.content);
            }
            None => {
                let _ = writeln!(background, "{}: {}", message.role.as_str(), message.content);
            }
        }
    }

    for step in 1..step_number {
        let mut step_log = String::new();
        if let Some(results) = plan.step_results.get(&step) {
            for (call_key, result) in results {
                let _ = writeln!(step_log, "Skill: {}\nResult: {}", call_key, result);
            }
        }
        let _ = writeln!(background, "Step {}: {}", step, step_log);
    }
    background
}

pub struct ToolCallPlanner {
    oracle: Arc<dyn ModelOracle>,
}

impl ToolCallPlanner {
    pub fn new(oracle: Arc<dyn ModelOracle>) -> Self {
        Self { oracle }
    }

    pub async fn plan(
        &self,
        plan: &Plan,
        task: &Task,
        provider: &ServerDescriptor,
    ) -> RelayResult<Vec<ToolCallIntent>> {
        if provider.catalog.is_empty() {
            warn!(task_id = %task.id, provider = %provider.name, "provider has no tools");
            return Ok(Vec::new());
        }

        let definitions = tool_definitions(&provider.catalog);
        let request = OracleRequest {
            system: tool_call_system_prompt(&provider.description),
            messages: vec![OracleMessage::user(tool_call_user_prompt(
                &plan.name,
                &plan.overview,
                &background_summary(plan, task.step_number),
                &task.name,
                &task.explanation,
                &task.expected_result,
            ))],
            tools: definitions.clone(),
            tool_choice: ToolChoice::Required,
            temperature: None,
        };

        let response = self.oracle.complete(request).await?;
        if !response.has_tool_calls() {
            warn!(task_id = %task.id, provider = %provider.name, "oracle selected no tool");
        }

        let intents: Vec<ToolCallIntent> = response
            .tool_calls
            .into_iter()
            .filter_map(|call| match resolve_source_name(&call.tool_name, &definitions) {
                Some(source) => Some(ToolCallIntent {
                    tool_name: source.to_string(),
                    target_provider: provider.name.clone(),
                    arguments: call.arguments,
                }),
                None => {
                    warn!(
                        task_id = %task.id,
                        provider = %provider.name,
                        tool = %call.tool_name,
                        "dropping call to a tool outside the catalog"
                    );
                    None
                }
            })
            .collect();

        info!(task_id = %task.id, provider = %provider.name, intents = intents.len(), "tool calls planned");
        Ok(intents)
    }
}
