//! JSON embedded in free-form model text
//!
//! Two stages: the first fenced block (optionally tagged `json`) is parsed when present,
//! otherwise the whole text is parsed. A fenced block that fails to parse does not fall
//! through to the whole-text stage.

use crate::error::{RelayError, RelayResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:json)?\s*([\s\S]*?)\s*```").unwrap());

/// Where the JSON was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonSource {
    FencedBlock,
    WholeText,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedJson {
    pub value: Value,
    pub source: JsonSource,
}

pub fn extract_json(text: &str) -> RelayResult<ExtractedJson> {
    if let Some(block) = FENCED_BLOCK.captures(text).and_then(|c| c.get(1)) {
        return serde_json::from_str(block.as_str())
            .map(|value| ExtractedJson {
                value,
                source: JsonSource::FencedBlock,
            })
            .map_err(|e| RelayError::MalformedPlan(format!("fenced block is not valid JSON: {}", e)));
    }

    serde_json::from_str(text.trim())
        .map(|value| ExtractedJson {
            value,
            source: JsonSource::WholeText,
        })
        .map_err(|_| RelayError::MalformedPlan("no JSON found in model response".to_string()))
}
