//! MCP Stdio Client
//!
//! Handles communication with providers running as local processes via stdio.
//! Implements JSON-RPC 2.0 over line-delimited stdio.

use crate::error::{RelayError, RelayResult};
use indexmap::IndexMap;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tracing::{debug, error, info};

type PendingRequests = Arc<RwLock<HashMap<String, oneshot::Sender<Value>>>>;

/// Registration of one in-flight request. Dropping it removes the entry, so a request
/// abandoned by a timeout does not stay in the map.
struct PendingGuard {
    pending: PendingRequests,
    id: String,
}

impl PendingGuard {
    async fn register(pending: &PendingRequests, id: &str) -> (Self, oneshot::Receiver<Value>) {
        let (tx, rx) = oneshot::channel();
        pending.write().await.insert(id.to_string(), tx);
        let guard = Self {
            pending: Arc::clone(pending),
            id: id.to_string(),
        };
        (guard, rx)
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if let Ok(mut pending) = self.pending.try_write() {
            pending.remove(&self.id);
            return;
        }
        let pending = Arc::clone(&self.pending);
        let id = std::mem::take(&mut self.id);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                pending.write().await.remove(&id);
            });
        }
    }
}

/// A client for communicating with a provider process via stdio
pub struct StdioClient {
    provider: String,
    command: String,
    args: Vec<String>,
    pending_requests: PendingRequests,
    tx: mpsc::Sender<String>,
    child: Mutex<Child>,
}

impl std::fmt::Debug for StdioClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdioClient")
            .field("provider", &self.provider)
            .field("command", &self.command)
            .field("args", &self.args)
            .finish()
    }
}

impl StdioClient {
    /// Spawn a provider process and establish stdio communication
    pub async fn spawn(
        provider: &str,
        command: &str,
        args: &[String],
        env: &IndexMap<String, String>,
    ) -> RelayResult<Self> {
        let mut child = Command::new(command)
            .args(args)
            .envs(env.iter())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RelayError::ProviderStartup {
                provider: provider.to_string(),
                message: format!("failed to spawn process {}: {}", command, e),
            })?;

        let startup_error = |what: &str| RelayError::ProviderStartup {
            provider: provider.to_string(),
            message: format!("failed to open {}", what),
        };
        let mut stdin = child.stdin.take().ok_or_else(|| startup_error("stdin"))?;
        let mut stdout = BufReader::new(child.stdout.take().ok_or_else(|| startup_error("stdout"))?);
        let mut stderr = BufReader::new(child.stderr.take().ok_or_else(|| startup_error("stderr"))?);

        let (tx, mut rx) = mpsc::channel::<String>(64);
        let pending_requests: PendingRequests = Arc::new(RwLock::new(HashMap::new()));
        let pending_clone = Arc::clone(&pending_requests);

        // Stdout reader task: parses JSON-RPC responses and matches them to pending requests
        let reader_provider = provider.to_string();
        tokio::spawn(async move {
            let mut line = String::new();
            loop {
                line.clear();
                match stdout.read_line(&mut line).await {
                    Ok(0) => {
                        info!(provider = %reader_provider, "provider stdout EOF reached");
                        break;
                    }
                    Ok(_) => {
                        let Ok(v) = serde_json::from_str::<Value>(&line) else {
                            debug!(provider = %reader_provider, "ignoring non-JSON stdout line");
                            continue;
                        };
                        let id_str = match v.get("id") {
                            Some(Value::String(s)) => s.clone(),
                            Some(Value::Number(n)) => n.to_string(),
                            _ => continue,
                        };
                        let mut pending = pending_clone.write().await;
                        if let Some(sender) = pending.remove(&id_str) {
                            let _ = sender.send(v);
                        }
                    }
                    Err(e) => {
                        error!(provider = %reader_provider, "error reading provider stdout: {}", e);
                        break;
                    }
                }
            }
            // Dropping the senders wakes every waiter with a closed-channel error.
            pending_clone.write().await.clear();
        });

        // Stderr reader task: forwards provider logs
        let stderr_provider = provider.to_string();
        tokio::spawn(async move {
            let mut line = String::new();
            loop {
                line.clear();
                match stderr.read_line(&mut line).await {
                    Ok(0) => break,
                    Ok(_) => debug!(provider = %stderr_provider, "{}", line.trim_end()),
                    Err(_) => break,
                }
            }
        });

        // Stdin writer task: sends serialized messages to the provider
        let writer_provider = provider.to_string();
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Err(e) = stdin.write_all(msg.as_bytes()).await {
                    error!(provider = %writer_provider, "failed to write to provider stdin: {}", e);
                    break;
                }
                if let Err(e) = stdin.write_all(b"\n").await {
                    error!(provider = %writer_provider, "failed to write newline to provider stdin: {}", e);
                    break;
                }
                if let Err(e) = stdin.flush().await {
                    error!(provider = %writer_provider, "failed to flush provider stdin: {}", e);
                    break;
                }
            }
        });

        Ok(Self {
            provider: provider.to_string(),
            command: command.to_string(),
            args: args.to_vec(),
            pending_requests,
            tx,
            child: Mutex::new(child),
        })
    }

    /// Make a JSON-RPC request and return its `result` member.
    ///
    /// No timeout is applied here; callers bound the wait.
    pub async fn request(&self, method: &str, params: Value) -> RelayResult<Value> {
        let id = uuid::Uuid::new_v4().to_string();
        let request = json!({
            "jsonrpc": "2.0",
            "id": id.clone(),
            "method": method,
            "params": params
        });

        // the guard lives until this future completes or is dropped by a caller's timeout
        let (_guard, resp_rx) = PendingGuard::register(&self.pending_requests, &id).await;
        self.send(&request).await?;

        let resp = resp_rx.await.map_err(|_| {
            RelayError::connectivity(
                self.provider.clone(),
                format!("provider closed before answering '{}'", method),
            )
        })?;

        if let Some(error) = resp.get("error") {
            return Err(RelayError::connectivity(
                self.provider.clone(),
                format!(
                    "provider error on '{}': {}",
                    method,
                    error
                        .get("message")
                        .and_then(|m| m.as_str())
                        .unwrap_or("Unknown error")
                ),
            ));
        }
        Ok(resp.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Send a JSON-RPC notification (no response expected)
    pub async fn notify(&self, method: &str, params: Value) -> RelayResult<()> {
        let notification = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params
        });
        self.send(&notification).await
    }

    /// Terminate the provider process
    pub async fn shutdown(&self) -> RelayResult<()> {
        let mut child = self.child.lock().await;
        child.kill().await?;
        Ok(())
    }

    async fn send(&self, message: &Value) -> RelayResult<()> {
        let msg = serde_json::to_string(message)?;
        self.tx.send(msg).await.map_err(|_| {
            RelayError::connectivity(self.provider.clone(), "provider stdin writer has stopped")
        })
    }
}
