use crate::mcp::Tool;
use crate::types::IntentArguments;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

/// Oracle-facing function spec for one provider tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Name as seen by the model (restricted charset, at most 64 chars)
    pub tool_name: String,
    /// Name in the provider's catalog
    pub source_name: String,
    pub description: String,
    pub input_schema: Value,
}

impl ToolDefinition {
    pub fn to_openai_tool_json(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.tool_name,
                "description": self.description,
                "parameters": self.input_schema,
            }
        })
    }
}

impl From<&Tool> for ToolDefinition {
    fn from(tool: &Tool) -> Self {
        tool_definition(tool)
    }
}

/// Map a provider tool to its oracle-facing function spec
pub fn tool_definition(tool: &Tool) -> ToolDefinition {
    let input_schema = if tool.input_schema.is_object() {
        tool.input_schema.clone()
    } else {
        default_tool_input_schema()
    };
    ToolDefinition {
        tool_name: oracle_tool_name(&tool.name),
        source_name: tool.name.clone(),
        description: tool.description.clone(),
        input_schema,
    }
}

pub fn tool_definitions(catalog: &[Tool]) -> Vec<ToolDefinition> {
    catalog.iter().map(tool_definition).collect()
}

/// Translate an oracle-facing name back to the provider's tool name
pub fn resolve_source_name<'a>(tool_name: &str, defs: &'a [ToolDefinition]) -> Option<&'a str> {
    defs.iter()
        .find(|d| d.tool_name == tool_name)
        .map(|d| d.source_name.as_str())
}

/// A tool selection returned by the oracle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub tool_name: String,
    pub arguments: IntentArguments,
}

pub fn extract_openai_assistant_content(response_json: &Value) -> String {
    response_json["choices"][0]["message"]["content"]
        .as_str()
        .unwrap_or_default()
        .to_string()
}

pub fn extract_openai_tool_calls(response_json: &Value) -> Vec<ToolCall> {
    let Some(tool_calls) = response_json["choices"][0]["message"]["tool_calls"].as_array() else {
        return Vec::new();
    };

    tool_calls
        .iter()
        .enumerate()
        .filter_map(|(idx, item)| {
            let tool_name = item["function"]["name"].as_str()?.to_string();
            let id = item["id"]
                .as_str()
                .map(|s| s.to_string())
                .unwrap_or_else(|| format!("tool_call_{}", idx + 1));

            let arguments = match &item["function"]["arguments"] {
                Value::String(raw) => parse_arguments(raw),
                Value::Object(map) => IntentArguments::Resolved {
                    values: map.clone(),
                },
                Value::Null => IntentArguments::default(),
                other => IntentArguments::Unresolved {
                    raw: other.to_string(),
                    reason: "arguments are not an object".to_string(),
                },
            };

            Some(ToolCall {
                id,
                tool_name,
                arguments,
            })
        })
        .collect()
}

fn parse_arguments(raw: &str) -> IntentArguments {
    if raw.trim().is_empty() {
        return IntentArguments::default();
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(values)) => IntentArguments::Resolved { values },
        Ok(_) => IntentArguments::Unresolved {
            raw: raw.to_string(),
            reason: "arguments are not an object".to_string(),
        },
        Err(e) => IntentArguments::Unresolved {
            raw: raw.to_string(),
            reason: e.to_string(),
        },
    }
}

fn default_tool_input_schema() -> Value {
    json!({
        "type": "object",
        "additionalProperties": true,
    })
}

pub fn oracle_tool_name(source_name: &str) -> String {
    let mut base = source_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect::<String>();

    if base.is_empty() || base.starts_with(|c: char| c.is_ascii_digit()) {
        base = format!("tool_{}", base);
    }

    if base.len() <= 64 {
        return base;
    }

    let mut hasher = Sha256::new();
    hasher.update(source_name.as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    let short_hash = &hash[..8];

    let keep = 64usize.saturating_sub(1 + short_hash.len());
    format!("{}_{}", &base[..keep], short_hash)
}
