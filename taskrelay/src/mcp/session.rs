//! Provider sessions
//!
//! A session is the single long-lived connection to one provider process. The handshake
//! (`initialize`, `notifications/initialized`, `tools/list`) happens once at connect time.

use super::stdio_client::StdioClient;
use super::types::{call_result_text, parse_tool_list, Tool};
use crate::config::ProviderConfig;
use crate::error::{RelayError, RelayResult};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use tracing::info;

const PROTOCOL_VERSION: &str = "2024-11-05";

/// A live connection to a capability provider
#[async_trait]
pub trait ProviderSession: Send + Sync {
    /// List the provider's tools
    async fn list_tools(&self) -> RelayResult<Vec<Tool>>;

    /// Invoke one tool and return its raw textual output
    async fn call_tool(&self, tool: &str, arguments: Map<String, Value>) -> RelayResult<String>;

    /// Terminate the provider
    async fn shutdown(&self) -> RelayResult<()> {
        Ok(())
    }
}

/// The two executable kinds a provider can be launched as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchKind {
    Python,
    Node,
}

impl LaunchKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("py") => Some(LaunchKind::Python),
            Some("js") => Some(LaunchKind::Node),
            _ => None,
        }
    }

    pub fn default_interpreter(self) -> &'static str {
        match self {
            LaunchKind::Python => "python",
            LaunchKind::Node => "node",
        }
    }
}

/// How to start a provider process
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LaunchSpec {
    pub path: PathBuf,
    pub interpreter: Option<String>,
    pub args: Vec<String>,
    pub env: IndexMap<String, String>,
}

impl LaunchSpec {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Resolve the command line, rejecting launch targets that are neither `.py` nor `.js`
    pub fn command_line(&self, provider: &str) -> RelayResult<(String, Vec<String>)> {
        let kind = LaunchKind::from_path(&self.path).ok_or_else(|| RelayError::ProviderStartup {
            provider: provider.to_string(),
            message: format!(
                "launch target '{}' must be a .py or .js file",
                self.path.display()
            ),
        })?;
        let command = self
            .interpreter
            .clone()
            .unwrap_or_else(|| kind.default_interpreter().to_string());
        let mut args = vec![self.path.to_string_lossy().to_string()];
        args.extend(self.args.iter().cloned());
        Ok((command, args))
    }
}

impl From<&ProviderConfig> for LaunchSpec {
    fn from(config: &ProviderConfig) -> Self {
        Self {
            path: config.path.clone(),
            interpreter: config.interpreter.clone(),
            args: config.args.clone(),
            env: config.env.clone(),
        }
    }
}

/// Session over a stdio-launched MCP provider
#[derive(Debug)]
pub struct McpStdioSession {
    provider: String,
    client: StdioClient,
}

impl McpStdioSession {
    /// Spawn the provider and perform the protocol handshake
    pub async fn connect(provider: &str, launch: &LaunchSpec) -> RelayResult<Self> {
        let (command, args) = launch.command_line(provider)?;
        info!(provider = %provider, command = %command, "starting provider");
        let client = StdioClient::spawn(provider, &command, &args, &launch.env).await?;

        let init = client
            .request(
                "initialize",
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": "taskrelay",
                        "version": env!("CARGO_PKG_VERSION")
                    }
                }),
            )
            .await
            .map_err(|e| RelayError::ProviderStartup {
                provider: provider.to_string(),
                message: format!("initialize failed: {}", e),
            })?;

        let server_name = init
            .get("serverInfo")
            .and_then(|s| s.get("name"))
            .and_then(|n| n.as_str())
            .unwrap_or("unknown");
        info!(provider = %provider, server = %server_name, "provider session initialized");

        client
            .notify("notifications/initialized", json!({}))
            .await
            .map_err(|e| RelayError::ProviderStartup {
                provider: provider.to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            provider: provider.to_string(),
            client,
        })
    }
}

#[async_trait]
impl ProviderSession for McpStdioSession {
    async fn list_tools(&self) -> RelayResult<Vec<Tool>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = match &cursor {
                Some(c) => json!({ "cursor": c }),
                None => json!({}),
            };
            let result = self.client.request("tools/list", params).await?;
            let (page, next) = parse_tool_list(&result);
            tools.extend(page);
            match next {
                Some(next) if cursor.as_deref() != Some(next.as_str()) => cursor = Some(next),
                _ => break,
            }
        }
        Ok(tools)
    }

    async fn call_tool(&self, tool: &str, arguments: Map<String, Value>) -> RelayResult<String> {
        let result = self
            .client
            .request(
                "tools/call",
                json!({ "name": tool, "arguments": Value::Object(arguments) }),
            )
            .await?;
        call_result_text(&self.provider, tool, &result)
    }

    async fn shutdown(&self) -> RelayResult<()> {
        self.client.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launch_kind_follows_extension() {
        let (cmd, args) = LaunchSpec::new("servers/weather.py").command_line("weather").unwrap();
        assert_eq!(cmd, "python");
        assert_eq!(args, vec!["servers/weather.py".to_string()]);

        let mut spec = LaunchSpec::new("servers/github.js");
        spec.args = vec!["--stdio".to_string()];
        let (cmd, args) = spec.command_line("github").unwrap();
        assert_eq!(cmd, "node");
        assert_eq!(args, vec!["servers/github.js".to_string(), "--stdio".to_string()]);
    }

    #[test]
    fn interpreter_override_wins() {
        let mut spec = LaunchSpec::new("servers/weather.py");
        spec.interpreter = Some("python3".to_string());
        assert_eq!(spec.command_line("weather").unwrap().0, "python3");
    }

    #[test]
    fn unsupported_launch_target_is_a_startup_error() {
        let err = LaunchSpec::new("servers/weather.sh")
            .command_line("weather")
            .unwrap_err();
        assert!(matches!(err, RelayError::ProviderStartup { ref provider, .. } if provider == "weather"));
    }
}
