//! Tool catalog entries and protocol result decoding

use crate::error::{RelayError, RelayResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// One callable tool exposed by a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "empty_object_schema", alias = "inputSchema")]
    pub input_schema: Value,
}

impl Tool {
    /// First line of the description, trimmed
    pub fn short_description(&self) -> &str {
        self.description.lines().next().unwrap_or_default().trim()
    }
}

fn empty_object_schema() -> Value {
    json!({ "type": "object", "properties": {} })
}

/// Decode a `tools/list` result into tools plus the pagination cursor, if any.
/// Entries that do not describe a tool are skipped.
pub fn parse_tool_list(result: &Value) -> (Vec<Tool>, Option<String>) {
    let tools = result
        .get("tools")
        .and_then(|t| t.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value::<Tool>(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default();
    let cursor = result
        .get("nextCursor")
        .and_then(|c| c.as_str())
        .filter(|c| !c.is_empty())
        .map(|c| c.to_string());
    (tools, cursor)
}

/// Decode a `tools/call` result into its text output.
///
/// Text content items are joined with newlines. A result flagged `isError` is a tool
/// invocation failure carrying that text.
pub fn call_result_text(provider: &str, tool: &str, result: &Value) -> RelayResult<String> {
    let text = result
        .get("content")
        .and_then(|c| c.as_array())
        .map(|items| {
            items
                .iter()
                .filter(|item| item.get("type").and_then(|t| t.as_str()).unwrap_or("text") == "text")
                .filter_map(|item| item.get("text").and_then(|t| t.as_str()))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default();

    if result.get("isError").and_then(|e| e.as_bool()).unwrap_or(false) {
        return Err(RelayError::tool_invocation(provider, tool, text));
    }
    Ok(text)
}
