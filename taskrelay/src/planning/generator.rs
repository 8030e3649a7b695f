//! Plan generation
//!
//! One oracle request turns the conversation and the provider descriptions into a plan
//! draft. The draft keeps the raw JSON so it can be stored with the plan record.

use super::json_extract::extract_json;
use super::prompts::{plan_user_prompt, PLAN_SYSTEM_PROMPT};
use crate::conversation::format_conversation;
use crate::error::{RelayError, RelayResult};
use crate::llm::{ModelOracle, OracleMessage, OracleRequest};
use crate::types::ConversationMessage;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Name the model uses for a plan that needs no provider
pub const NULL_PLAN: &str = "null_plan";

/// One step of a drafted plan, as the model wrote it
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlanStep {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub expected_result: String,
    #[serde(default)]
    pub assignee: Option<String>,
}

/// Parsed model output, before any task is created
#[derive(Debug, Clone, PartialEq)]
pub struct PlanDraft {
    pub plan_name: Option<String>,
    pub plan_overview: Option<String>,
    /// Step key to step, in the order the model wrote them
    pub steps: IndexMap<String, PlanStep>,
    pub no_skills_needed: bool,
    pub raw: Value,
}

impl PlanDraft {
    /// Read a draft out of the extracted JSON. Individual fields are read leniently; only a
    /// non-object top level is rejected.
    pub fn from_value(raw: Value) -> RelayResult<Self> {
        let object = raw
            .as_object()
            .ok_or_else(|| RelayError::MalformedPlan("plan JSON is not an object".to_string()))?;

        let text = |key: &str| object.get(key).and_then(Value::as_str).map(str::to_string);

        let mut steps = IndexMap::new();
        if let Some(plan) = object.get("plan").and_then(Value::as_object) {
            for (key, value) in plan {
                let step = match serde_json::from_value::<PlanStep>(value.clone()) {
                    Ok(step) => step,
                    Err(e) => {
                        warn!(step = %key, "unreadable plan step: {}", e);
                        PlanStep::default()
                    }
                };
                steps.insert(key.clone(), step);
            }
        }

        Ok(Self {
            plan_name: text("plan_name"),
            plan_overview: text("plan_overview"),
            steps,
            no_skills_needed: object
                .get("no_skills_needed")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            raw,
        })
    }

    pub fn name(&self) -> &str {
        self.plan_name.as_deref().unwrap_or("No plan name provided")
    }

    pub fn overview(&self) -> &str {
        self.plan_overview
            .as_deref()
            .unwrap_or("No plan overview provided")
    }

    /// A plan with an empty step map, the `no_skills_needed` flag, or the `null_plan` name
    /// never yields tasks.
    pub fn is_zero_task(&self) -> bool {
        self.steps.is_empty()
            || self.no_skills_needed
            || self
                .plan_name
                .as_deref()
                .is_some_and(|n| n.eq_ignore_ascii_case(NULL_PLAN))
    }
}

/// What the generator needs to know about the room and the providers
#[derive(Debug, Clone)]
pub struct PlanningInput<'a> {
    /// Stored conversation followed by the live query as the last user turn
    pub conversation: &'a [ConversationMessage],
    pub provider_names: &'a [String],
    pub provider_descriptions: &'a str,
    pub additional_context: &'a str,
}

pub struct PlanGenerator {
    oracle: Arc<dyn ModelOracle>,
    temperature: Option<f32>,
}

impl PlanGenerator {
    pub fn new(oracle: Arc<dyn ModelOracle>) -> Self {
        Self {
            oracle,
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn build_request(&self, input: &PlanningInput<'_>) -> OracleRequest {
        OracleRequest {
            system: PLAN_SYSTEM_PROMPT.to_string(),
            messages: vec![OracleMessage::user(plan_user_prompt(
                &format_conversation(input.conversation, false),
                input.additional_context,
                input.provider_names,
                input.provider_descriptions,
            ))],
            temperature: self.temperature,
            ..OracleRequest::default()
        }
    }

    pub async fn generate(&self, input: &PlanningInput<'_>) -> RelayResult<PlanDraft> {
        let response = self.oracle.complete(self.build_request(input)).await?;
        let extracted = extract_json(&response.content)?;
        debug!(source = ?extracted.source, "extracted plan JSON");
        let draft = PlanDraft::from_value(extracted.value)?;
        info!(
            plan_name = %draft.name(),
            steps = draft.steps.len(),
            zero_task = draft.is_zero_task(),
            "plan drafted"
        );
        Ok(draft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::OracleResponse;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct ScriptedOracle {
        reply: String,
        seen: Mutex<Vec<OracleRequest>>,
    }

    #[async_trait]
    impl ModelOracle for ScriptedOracle {
        async fn complete(&self, request: OracleRequest) -> RelayResult<OracleResponse> {
            self.seen.lock().unwrap().push(request);
            Ok(OracleResponse::text(self.reply.clone()))
        }
    }

    fn draft(value: Value) -> PlanDraft {
        PlanDraft::from_value(value).unwrap()
    }

    #[test]
    fn zero_task_detection() {
        assert!(draft(json!({"plan_name": "x", "plan": {}})).is_zero_task());
        assert!(draft(json!({"plan_name": "x"})).is_zero_task());
        assert!(draft(json!({
            "plan_name": "x",
            "plan": {"step_1": {"name": "a", "assignee": "web"}},
            "no_skills_needed": true
        }))
        .is_zero_task());
        assert!(draft(json!({
            "plan_name": "NULL_PLAN",
            "plan": {"step_1": {"name": "a", "assignee": "web"}}
        }))
        .is_zero_task());
        assert!(!draft(json!({
            "plan_name": "Trip",
            "plan": {"step_1": {"name": "a", "assignee": "web"}}
        }))
        .is_zero_task());
    }

    #[test]
    fn unreadable_steps_are_kept_without_assignee() {
        let d = draft(json!({"plan": {"step_1": "do it", "step_2": {"assignee": "web"}}}));
        assert_eq!(d.steps["step_1"].assignee, None);
        assert_eq!(d.steps["step_2"].assignee.as_deref(), Some("web"));
        assert_eq!(d.name(), "No plan name provided");
    }

    #[test]
    fn non_object_plan_is_malformed() {
        assert!(matches!(
            PlanDraft::from_value(json!([1, 2])),
            Err(RelayError::MalformedPlan(_))
        ));
    }

    #[tokio::test]
    async fn generate_parses_fenced_plan() {
        let oracle = Arc::new(ScriptedOracle {
            reply: "Sure!\n```json\n{\"plan_name\": \"Weather\", \"plan_overview\": \"Check it\", \
                    \"plan\": {\"step_1\": {\"name\": \"Forecast\", \"assignee\": \"weather\"}}}\n```"
                .to_string(),
            seen: Mutex::new(Vec::new()),
        });
        let generator = PlanGenerator::new(oracle.clone()).with_temperature(0.7);
        let conversation = vec![ConversationMessage::user("what is the weather?")];
        let names = vec!["weather".to_string()];
        let input = PlanningInput {
            conversation: &conversation,
            provider_names: &names,
            provider_descriptions: "assistant name: weather",
            additional_context: "Current datetime: now",
        };

        let d = generator.generate(&input).await.unwrap();
        assert_eq!(d.name(), "Weather");
        assert_eq!(d.steps.len(), 1);

        let seen = oracle.seen.lock().unwrap();
        assert_eq!(seen[0].system, PLAN_SYSTEM_PROMPT);
        assert!(seen[0].tools.is_empty());
        assert!(seen[0].messages[0].content.contains("User: what is the weather?"));
    }

    #[tokio::test]
    async fn prose_only_reply_is_malformed_plan() {
        let oracle = Arc::new(ScriptedOracle {
            reply: "I am not sure what you mean.".to_string(),
            seen: Mutex::new(Vec::new()),
        });
        let conversation = vec![ConversationMessage::user("hm")];
        let input = PlanningInput {
            conversation: &conversation,
            provider_names: &[],
            provider_descriptions: "",
            additional_context: "",
        };
        let err = PlanGenerator::new(oracle).generate(&input).await.unwrap_err();
        assert!(matches!(err, RelayError::MalformedPlan(_)));
    }
}
