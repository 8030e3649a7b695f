//! From a room request to planned tool calls
//!
//! `PlanGenerator` drafts a plan with the oracle, `TaskExtractor` turns the draft into
//! numbered tasks and `ToolCallPlanner` asks the oracle which tools each task should call.

pub mod generator;
pub mod json_extract;
pub mod prompts;
pub mod tasks;
pub mod tool_calls;

pub use generator::{PlanDraft, PlanGenerator, PlanStep, PlanningInput, NULL_PLAN};
pub use json_extract::{extract_json, ExtractedJson, JsonSource};
pub use tasks::{TaskExtractor, DEFAULT_TASK_NAME};
pub use tool_calls::{background_summary, ToolCallPlanner};
