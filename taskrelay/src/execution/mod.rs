//! Tool-call execution and plan status tracking

pub mod executor;
pub mod status;

pub use executor::{ExecutionReport, SkippedCall, ToolExecutor};
pub use status::{ProgressUpdate, StatusTracker};
