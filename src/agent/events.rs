//! Events emitted by a reasoning-loop run.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Sentinel carried by the terminating `done` event.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Payload of the `final` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalPayload {
    pub task_log_id: i64,
    pub agent_id: i64,
    pub final_output: String,
    pub artifact_path: Option<PathBuf>,
}

/// One event of the run's stream. `Done` is always the last event.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    Thought(String),
    Action(String),
    Observation(String),
    Final(FinalPayload),
    Error(String),
    Done,
}

impl AgentEvent {
    /// Event name as sent on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            AgentEvent::Thought(_) => "thought",
            AgentEvent::Action(_) => "action",
            AgentEvent::Observation(_) => "observation",
            AgentEvent::Final(_) => "final",
            AgentEvent::Error(_) => "error",
            AgentEvent::Done => "done",
        }
    }

    /// Raw payload text; `final` is its JSON encoding.
    pub fn payload(&self) -> String {
        match self {
            AgentEvent::Thought(text)
            | AgentEvent::Action(text)
            | AgentEvent::Observation(text)
            | AgentEvent::Error(text) => text.clone(),
            AgentEvent::Final(payload) => serde_json::to_string(payload).unwrap_or_else(|e| {
                tracing::error!("Failed to serialize final payload: {e}");
                String::from("{}")
            }),
            AgentEvent::Done => DONE_SENTINEL.to_string(),
        }
    }

    /// Payload with newlines escaped so it fits on one `data:` line.
    pub fn wire_payload(&self) -> String {
        escape_newlines(&self.payload())
    }

    /// Whether this event's text belongs in the persisted transcript.
    pub fn is_transcript_line(&self) -> bool {
        matches!(
            self,
            AgentEvent::Thought(_) | AgentEvent::Action(_) | AgentEvent::Observation(_)
        )
    }
}

fn escape_newlines(text: &str) -> String {
    text.replace("\r\n", "\\n").replace(['\n', '\r'], "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_payload_is_single_line() {
        let event = AgentEvent::Action("[ACTION] Executing tool: x\nArgs: {}".to_string());
        assert_eq!(event.kind(), "action");
        assert_eq!(event.wire_payload(), "[ACTION] Executing tool: x\\nArgs: {}");
        assert_eq!(AgentEvent::Done.wire_payload(), "[DONE]");
    }

    #[test]
    fn test_final_payload_shape() {
        let event = AgentEvent::Final(FinalPayload {
            task_log_id: 3,
            agent_id: 1,
            final_output: "line one\nline two".to_string(),
            artifact_path: None,
        });
        let value: serde_json::Value = serde_json::from_str(&event.payload()).unwrap();
        assert_eq!(value["task_log_id"], 3);
        assert_eq!(value["final_output"], "line one\nline two");
        assert!(value["artifact_path"].is_null());
        assert!(!event.wire_payload().contains('\n'));
    }

    #[test]
    fn test_transcript_kinds() {
        assert!(AgentEvent::Thought(String::new()).is_transcript_line());
        assert!(!AgentEvent::Error(String::new()).is_transcript_line());
        assert!(!AgentEvent::Done.is_transcript_line());
    }
}
