#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use taskrelay::llm::{OracleRequest, OracleResponse, ToolCall};
use taskrelay::mcp::{ProviderSession, Tool};
use taskrelay::notify::{OutboundMessage, OutboundNotification, RoomEvent};
use taskrelay::persistence::UserRecord;
use taskrelay::{
    Engine, InMemoryPersistence, IntentArguments, ModelOracle, NotificationChannel, RelayConfig,
    RelayError, RelayResult, ServerRegistry,
};

/// Replies with queued responses in order; records every request
#[derive(Default)]
pub struct ScriptedOracle {
    replies: Mutex<VecDeque<OracleResponse>>,
    pub requests: Mutex<Vec<OracleRequest>>,
}

impl ScriptedOracle {
    pub fn reply_text(&self, text: &str) {
        self.replies.lock().unwrap().push_back(OracleResponse::text(text));
    }

    pub fn reply_tool_calls(&self, calls: Vec<(&str, Value)>) {
        let tool_calls = calls
            .into_iter()
            .enumerate()
            .map(|(i, (name, args))| ToolCall {
                id: format!("call_{}", i),
                tool_name: name.to_string(),
                arguments: match args {
                    Value::Object(values) => IntentArguments::Resolved { values },
                    other => IntentArguments::Unresolved {
                        raw: other.to_string(),
                        reason: "not an object".to_string(),
                    },
                },
            })
            .collect();
        self.replies.lock().unwrap().push_back(OracleResponse {
            content: String::new(),
            tool_calls,
        });
    }

    pub fn request(&self, index: usize) -> OracleRequest {
        self.requests.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl ModelOracle for ScriptedOracle {
    async fn complete(&self, request: OracleRequest) -> RelayResult<OracleResponse> {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| RelayError::connectivity("oracle", "no scripted reply left"))
    }
}

/// Provider whose tools either echo a fixed answer or fail with a connectivity error
pub struct FakeSession {
    tools: Vec<Tool>,
    answers: HashMap<String, Result<String, String>>,
    pub calls: Arc<Mutex<Vec<(String, Map<String, Value>)>>>,
}

impl FakeSession {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            answers: HashMap::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn tool(mut self, name: &str, answer: Result<&str, &str>) -> Self {
        self.tools.push(Tool {
            name: name.to_string(),
            description: format!("{} tool\nsecond line", name),
            input_schema: json!({"type": "object", "properties": {"q": {"type": "string"}}}),
        });
        self.answers.insert(
            name.to_string(),
            answer.map(str::to_string).map_err(str::to_string),
        );
        self
    }
}

#[async_trait]
impl ProviderSession for FakeSession {
    async fn list_tools(&self) -> RelayResult<Vec<Tool>> {
        Ok(self.tools.clone())
    }

    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> RelayResult<String> {
        self.calls.lock().unwrap().push((name.to_string(), arguments));
        match self.answers.get(name) {
            Some(Ok(text)) => Ok(text.clone()),
            Some(Err(message)) => Err(RelayError::connectivity(name, message)),
            None => Err(RelayError::tool_invocation("fake", name, "no such tool")),
        }
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<RoomEvent>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                RoomEvent::Message(m) => Some(m.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn notifications(&self) -> Vec<OutboundNotification> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                RoomEvent::Notification(n) => Some(n.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl NotificationChannel for RecordingNotifier {
    async fn send_message(&self, message: OutboundMessage) -> RelayResult<()> {
        self.events.lock().unwrap().push(RoomEvent::Message(message));
        Ok(())
    }

    async fn send_notification(&self, notification: OutboundNotification) -> RelayResult<()> {
        self.events
            .lock()
            .unwrap()
            .push(RoomEvent::Notification(notification));
        Ok(())
    }
}

pub struct Harness {
    pub engine: Engine,
    pub oracle: Arc<ScriptedOracle>,
    pub persistence: Arc<InMemoryPersistence>,
    pub notifier: Arc<RecordingNotifier>,
    pub registry: Arc<ServerRegistry>,
}

impl Harness {
    /// Engine over in-memory collaborators with the given providers attached
    pub async fn new(providers: Vec<(&str, &str, FakeSession)>) -> Self {
        let mut config = RelayConfig::default();
        config.engine.tool_call_timeout_secs = 2;
        config.engine.plan_timeout_secs = 5;

        let registry = Arc::new(ServerRegistry::new());
        for (name, description, session) in providers {
            registry
                .attach(name, description, Box::new(session))
                .await
                .unwrap();
        }
        let oracle = Arc::new(ScriptedOracle::default());
        let persistence = Arc::new(InMemoryPersistence::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let engine = Engine::new(
            &config,
            registry.clone(),
            oracle.clone(),
            persistence.clone(),
            notifier.clone(),
        );
        Self {
            engine,
            oracle,
            persistence,
            notifier,
            registry,
        }
    }
}

pub fn user(id: &str, name: &str) -> UserRecord {
    UserRecord {
        user_id: id.to_string(),
        username: name.to_string(),
        ..UserRecord::default()
    }
}

pub fn fenced(plan: Value) -> String {
    format!("Here is the plan:\n```json\n{}\n```\nDone.", plan)
}
