//! Model oracle boundary
//!
//! The engine treats the language model as an opaque capability: a request carries a system
//! prompt, ordered messages and optionally a tool catalog with forced selection; a response
//! is free text and/or tool selections.

pub mod openai;
pub mod tool_calling;

use crate::error::RelayResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use openai::OpenAiCompatibleOracle;
pub use tool_calling::{ToolCall, ToolDefinition};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleMessage {
    pub role: String,
    pub content: String,
}

impl OracleMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Whether the model may answer in text or must select at least one tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    #[default]
    Auto,
    Required,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OracleRequest {
    pub system: String,
    pub messages: Vec<OracleMessage>,
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: ToolChoice,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OracleResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

impl OracleResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

#[async_trait]
pub trait ModelOracle: Send + Sync {
    async fn complete(&self, request: OracleRequest) -> RelayResult<OracleResponse>;
}

#[async_trait]
impl ModelOracle for Arc<dyn ModelOracle> {
    async fn complete(&self, request: OracleRequest) -> RelayResult<OracleResponse> {
        (**self).complete(request).await
    }
}
