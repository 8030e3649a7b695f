//! Error taxonomy for the relay engine
//!
//! Every public operation of the engine catches and logs these errors, returning best-effort
//! results. The variants mirror the failure classes the engine distinguishes when deciding
//! whether to skip a single step or abort the surrounding operation.

use std::time::Duration;
use thiserror::Error;

pub type RelayResult<T> = Result<T, RelayError>;

#[derive(Debug, Error)]
pub enum RelayError {
    /// A provider failed to start or to complete its handshake.
    #[error("provider '{provider}' failed to start: {message}")]
    ProviderStartup { provider: String, message: String },

    /// A provider or the persistence service could not be reached mid-operation.
    #[error("connectivity error ({target}): {message}")]
    Connectivity { target: String, message: String },

    /// The model oracle produced output that could not be turned into a structured record.
    #[error("malformed model output: {0}")]
    MalformedModelOutput(String),

    /// No JSON plan could be found in the oracle response.
    #[error("malformed plan: {0}")]
    MalformedPlan(String),

    /// A single tool call failed.
    #[error("tool '{tool}' on provider '{provider}' failed: {message}")]
    ToolInvocation {
        provider: String,
        tool: String,
        message: String,
    },

    /// A persistence call failed or returned an error status.
    #[error("persistence error ({operation}): {message}")]
    Persistence { operation: String, message: String },

    #[error("unknown provider '{0}'")]
    UnknownProvider(String),

    #[error("provider '{provider}' has no tool named '{tool}'")]
    UnknownTool { provider: String, tool: String },

    #[error("{operation} timed out after {elapsed:?}")]
    Timeout { operation: String, elapsed: Duration },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RelayError {
    pub fn connectivity(target: impl Into<String>, message: impl ToString) -> Self {
        RelayError::Connectivity {
            target: target.into(),
            message: message.to_string(),
        }
    }

    pub fn persistence(operation: impl Into<String>, message: impl ToString) -> Self {
        RelayError::Persistence {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    pub fn tool_invocation(
        provider: impl Into<String>,
        tool: impl Into<String>,
        message: impl ToString,
    ) -> Self {
        RelayError::ToolInvocation {
            provider: provider.into(),
            tool: tool.into(),
            message: message.to_string(),
        }
    }

    /// Whether a tool-call level failure of this kind is logged and skipped rather than
    /// aborting the owning task.
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            RelayError::Connectivity { .. }
                | RelayError::ToolInvocation { .. }
                | RelayError::UnknownTool { .. }
                | RelayError::MalformedModelOutput(_)
                | RelayError::Timeout { .. }
                | RelayError::Json(_)
        )
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(e: reqwest::Error) -> Self {
        let target = e
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "http".to_string());
        RelayError::Connectivity {
            target,
            message: e.to_string(),
        }
    }
}
