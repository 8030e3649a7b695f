//! Chat-completions oracle
//!
//! Talks to any OpenAI-compatible endpoint (OpenAI, DeepSeek, OpenRouter, Ollama's /v1).

use super::tool_calling::{extract_openai_assistant_content, extract_openai_tool_calls};
use super::{ModelOracle, OracleRequest, OracleResponse, ToolChoice};
use crate::config::LlmConfig;
use crate::error::{RelayError, RelayResult};
use crate::utils::truncate_for_log;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

pub struct OpenAiCompatibleOracle {
    config: LlmConfig,
    client: Client,
}

impl OpenAiCompatibleOracle {
    pub fn new(config: LlmConfig) -> RelayResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { config, client })
    }

    fn base_url(&self) -> String {
        self.config
            .base_url
            .as_ref()
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| match self.config.provider.as_str() {
                "deepseek" => "https://api.deepseek.com/v1".to_string(),
                "openrouter" => "https://openrouter.ai/api/v1".to_string(),
                "ollama" => "http://localhost:11434/v1".to_string(),
                _ => "https://api.openai.com/v1".to_string(),
            })
    }

    fn request_body(&self, request: &OracleRequest) -> Value {
        let mut messages = vec![json!({ "role": "system", "content": request.system })];
        messages.extend(
            request
                .messages
                .iter()
                .map(|m| json!({ "role": m.role, "content": m.content })),
        );

        let mut body = json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": request.temperature.unwrap_or(self.config.temperature),
        });
        if let Some(max_tokens) = self.config.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if !request.tools.is_empty() {
            body["tools"] = Value::Array(
                request
                    .tools
                    .iter()
                    .map(|t| t.to_openai_tool_json())
                    .collect(),
            );
            body["tool_choice"] = json!(match request.tool_choice {
                ToolChoice::Auto => "auto",
                ToolChoice::Required => "required",
            });
        }
        body
    }
}

#[async_trait]
impl ModelOracle for OpenAiCompatibleOracle {
    async fn complete(&self, request: OracleRequest) -> RelayResult<OracleResponse> {
        let url = format!("{}/chat/completions", self.base_url());
        let body = self.request_body(&request);

        info!(
            model = %self.config.model,
            tools = request.tools.len(),
            system_chars = request.system.len(),
            "sending oracle request"
        );

        let mut http = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(key) = &self.config.api_key {
            http = http.header("Authorization", format!("Bearer {}", key));
        }

        let response = http.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(RelayError::connectivity(
                url,
                format!("oracle returned {}: {}", status, error_text),
            ));
        }

        let response_json: Value = response.json().await?;
        if response_json["choices"][0]["message"].is_null() {
            return Err(RelayError::MalformedModelOutput(
                "oracle response has no message".to_string(),
            ));
        }
        let content = extract_openai_assistant_content(&response_json);
        let tool_calls = extract_openai_tool_calls(&response_json);
        debug!(
            tool_calls = tool_calls.len(),
            content = %truncate_for_log(&content, 2_000),
            "oracle response"
        );

        Ok(OracleResponse {
            content,
            tool_calls,
        })
    }
}
