//! taskrelay: plan/task orchestration over tool-exposing capability providers
//!
//! A room request is drafted into a plan by the model oracle, split into numbered tasks bound
//! to registered providers, and each task is planned into tool calls and executed against the
//! provider's live session. Progress and results are written to an external plan/task store
//! and announced in the room.

pub mod approval;
pub mod config;
pub mod conversation;
pub mod engine;
pub mod error;
pub mod execution;
pub mod llm;
pub mod mcp;
pub mod notify;
pub mod persistence;
pub mod planning;
pub mod registry;
pub mod types;
pub mod utils;

pub use approval::{AdminInstruction, ApprovalGate, ApprovalOutcome};
pub use config::{load_config, RelayConfig};
pub use engine::Engine;
pub use error::{RelayError, RelayResult};
pub use execution::{ExecutionReport, ProgressUpdate, StatusTracker, ToolExecutor};
pub use llm::{ModelOracle, OpenAiCompatibleOracle};
pub use notify::{BroadcastNotifier, HttpNotifier, NotificationChannel};
pub use persistence::{HttpPersistence, InMemoryPersistence, PersistenceService};
pub use planning::{PlanGenerator, TaskExtractor, ToolCallPlanner};
pub use registry::{ServerDescriptor, ServerRegistry};
pub use types::*;
