//! Fallback for models that write tool calls into their text instead of
//! using the structured tool-call API.
//!
//! This is a best-effort heuristic, not a grammar: the scan takes everything
//! from the first `{` to the last `}` in the text and tries to parse it as one
//! JSON object. Text containing several objects, or braces in prose around a
//! call, will not be recognized. Callers treat `None` as "no tool call".

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

const NAME_KEYS: [&str; 3] = ["tool", "tool_name", "name"];
const ARGUMENT_KEYS: [&str; 3] = ["arguments", "args", "params"];

/// A tool call recovered from free text.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineToolCall {
    pub name: String,
    pub arguments: Map<String, Value>,
}

impl InlineToolCall {
    /// Arguments re-encoded as the JSON string the registry expects.
    pub fn arguments_json(&self) -> String {
        Value::Object(self.arguments.clone()).to_string()
    }
}

static OBJECT_SPAN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

/// Look for an inline `{"tool": ..., "arguments": {...}}` object in `text`.
pub fn parse_inline_tool_call(text: &str) -> Option<InlineToolCall> {
    let span = OBJECT_SPAN.find(text)?;
    let Ok(Value::Object(object)) = serde_json::from_str::<Value>(span.as_str()) else {
        return None;
    };

    let name = NAME_KEYS
        .iter()
        .filter_map(|key| object.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|name| !name.is_empty())?
        .to_string();

    let raw_args = ARGUMENT_KEYS
        .iter()
        .filter_map(|key| object.get(*key))
        .find(|value| is_truthy(value));

    let arguments = match raw_args {
        Some(Value::Object(map)) => map.clone(),
        Some(Value::String(encoded)) => match serde_json::from_str::<Value>(encoded) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        },
        _ => Map::new(),
    };

    Some(InlineToolCall { name, arguments })
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Object(m) => !m.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Number(_) => true,
    }
}
