use crate::error::{RelayError, RelayResult};
use crate::registry::ServerRegistry;
use crate::types::{IntentArguments, ResultLog, Task, TaskStatus, ToolCallIntent};
use crate::utils::{bounded, truncate_for_log};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// A planned call that produced no result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedCall {
    pub tool_name: String,
    pub target_provider: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub task_id: String,
    pub results: ResultLog,
    pub skipped: Vec<SkippedCall>,
    /// Always `Success` once every intent has been attempted
    pub status: TaskStatus,
}

impl ExecutionReport {
    /// True when at least one planned call was skipped; the task status does not reflect it
    pub fn had_failures(&self) -> bool {
        !self.skipped.is_empty()
    }

    pub fn apply_to(&self, task: &mut Task) {
        task.results = self.results.clone();
        task.status = self.status;
    }
}

pub struct ToolExecutor {
    registry: Arc<ServerRegistry>,
    call_timeout: Option<Duration>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ServerRegistry>) -> Self {
        Self {
            registry,
            call_timeout: None,
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    /// Run every intent in order. A failing call is logged and skipped; later calls still
    /// run. Results are keyed `{tool}_{n}` where n counts earlier successes of that tool.
    pub async fn execute(&self, task: &Task) -> ExecutionReport {
        let mut results = ResultLog::new();
        let mut skipped = Vec::new();
        let mut successes: HashMap<&str, usize> = HashMap::new();

        for intent in &task.tool_calls {
            match self.call(intent).await {
                Ok(text) => {
                    let n = successes.entry(intent.tool_name.as_str()).or_insert(0);
                    let key = format!("{}_{}", intent.tool_name, n);
                    *n += 1;
                    debug!(
                        task_id = %task.id,
                        call_key = %key,
                        result = %truncate_for_log(&text, 200),
                        "tool call succeeded"
                    );
                    results.insert(key, text);
                }
                Err(e) => {
                    error!(
                        task_id = %task.id,
                        provider = %intent.target_provider,
                        tool = %intent.tool_name,
                        skippable = e.is_skippable(),
                        "skipping tool call: {}",
                        e
                    );
                    skipped.push(SkippedCall {
                        tool_name: intent.tool_name.clone(),
                        target_provider: intent.target_provider.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            task_id = %task.id,
            succeeded = results.len(),
            skipped = skipped.len(),
            "task executed"
        );
        ExecutionReport {
            task_id: task.id.clone(),
            results,
            skipped,
            status: TaskStatus::Success,
        }
    }

    async fn call(&self, intent: &ToolCallIntent) -> RelayResult<String> {
        let arguments = match &intent.arguments {
            IntentArguments::Resolved { values } => values.clone(),
            IntentArguments::Unresolved { reason, .. } => {
                return Err(RelayError::MalformedModelOutput(format!(
                    "unresolved arguments for '{}': {}",
                    intent.tool_name, reason
                )));
            }
        };
        if !self.registry.contains(&intent.target_provider).await {
            return Err(RelayError::UnknownProvider(intent.target_provider.clone()));
        }
        if !self
            .registry
            .has_tool(&intent.target_provider, &intent.tool_name)
            .await
        {
            return Err(RelayError::UnknownTool {
                provider: intent.target_provider.clone(),
                tool: intent.tool_name.clone(),
            });
        }
        bounded(
            &format!("{}.{}", intent.target_provider, intent.tool_name),
            self.call_timeout,
            self.registry
                .invoke(&intent.target_provider, &intent.tool_name, arguments),
        )
        .await
    }
}
