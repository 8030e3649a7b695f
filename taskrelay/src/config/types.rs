//! Relay configuration types
//!
//! Maps to the TOML configuration file read by the agent binary.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level relay configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RelayConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    /// Capability providers keyed by name, in declaration order
    #[serde(default)]
    pub providers: IndexMap<String, ProviderConfig>,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Model oracle configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmConfig {
    /// Provider family (openai, deepseek, openrouter, ollama...). All speak the
    /// chat-completions shape.
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Literal API key. Prefer `api_key_env`.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Name of the environment variable holding the API key
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default = "default_llm_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            base_url: None,
            api_key: None,
            api_key_env: None,
            temperature: default_temperature(),
            max_tokens: None,
            request_timeout_secs: default_llm_timeout(),
        }
    }
}

/// Persistence service (REST) configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistenceConfig {
    #[serde(default)]
    pub base_url: String,
    /// How many recent chat messages to fetch as conversation history
    #[serde(default = "default_message_limit")]
    pub message_limit: usize,
    #[serde(default = "default_persistence_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            message_limit: default_message_limit(),
            request_timeout_secs: default_persistence_timeout(),
        }
    }
}

/// Notification channel configuration. Without a URL an in-process broadcast channel is used.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct NotificationConfig {
    #[serde(default)]
    pub url: Option<String>,
}

/// Engine tuning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Upper bound for plan generation (oracle call). Expiry fails plan creation.
    #[serde(default = "default_plan_timeout")]
    pub plan_timeout_secs: u64,
    /// Upper bound for a single tool call. Expiry skips the call.
    #[serde(default = "default_tool_call_timeout")]
    pub tool_call_timeout_secs: u64,
    /// Upper bound for a provider handshake at registration.
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_secs: u64,
    /// Provider whose catalog backs the administrative approval path
    #[serde(default = "default_admin_provider")]
    pub admin_provider: String,
    /// Offset used when rendering timestamps for prompts and records
    #[serde(default = "default_utc_offset")]
    pub utc_offset_hours: i32,
    /// Sender id the persistence service uses for messages written by the agent
    #[serde(default = "default_agent_sender")]
    pub agent_sender: String,
}

impl EngineConfig {
    pub fn plan_timeout(&self) -> Duration {
        Duration::from_secs(self.plan_timeout_secs)
    }

    pub fn tool_call_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_call_timeout_secs)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            plan_timeout_secs: default_plan_timeout(),
            tool_call_timeout_secs: default_tool_call_timeout(),
            handshake_timeout_secs: default_handshake_timeout(),
            admin_provider: default_admin_provider(),
            utc_offset_hours: default_utc_offset(),
            agent_sender: default_agent_sender(),
        }
    }
}

/// One capability provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    /// Launch target; must be a `.py` or `.js` script
    pub path: PathBuf,
    /// Inline capability description
    #[serde(default)]
    pub description: Option<String>,
    /// File holding the capability description
    #[serde(default)]
    pub description_file: Option<PathBuf>,
    /// Interpreter override (defaults to `python` / `node` by extension)
    #[serde(default)]
    pub interpreter: Option<String>,
    /// Extra arguments appended after the script path
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: IndexMap<String, String>,
}

/// HTTP surface of the agent binary
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_llm_provider() -> String {
    "openai".to_string()
}

fn default_llm_model() -> String {
    "deepseek-chat".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_llm_timeout() -> u64 {
    120
}

fn default_message_limit() -> usize {
    100
}

fn default_persistence_timeout() -> u64 {
    30
}

fn default_plan_timeout() -> u64 {
    180
}

fn default_tool_call_timeout() -> u64 {
    60
}

fn default_handshake_timeout() -> u64 {
    30
}

fn default_admin_provider() -> String {
    "onlysaid_admin".to_string()
}

fn default_utc_offset() -> i32 {
    8
}

fn default_agent_sender() -> String {
    "agent".to_string()
}

fn default_bind() -> String {
    "0.0.0.0:34430".to_string()
}
