//! LLM client abstraction for chat completions with tool calling.
//!
//! The agent loop only depends on [`LlmClient`]; the concrete client talks to
//! any server exposing the OpenAI `/chat/completions` shape (Ollama by default).

mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use openai::OpenAiCompatibleClient;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request to model endpoint failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("model endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode model response: {0}")]
    Decode(String),

    #[error("model returned no choices")]
    EmptyResponse,
}

/// Message role in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A single role-tagged message in the conversation context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }

    /// Assistant turn that requested a single tool call.
    pub fn assistant_tool_call(call: ToolCall) -> Self {
        Self {
            role: Role::Assistant,
            content: None,
            tool_calls: Some(vec![call]),
            tool_call_id: None,
            name: None,
        }
    }

    /// Tool result correlated to the call that produced it.
    pub fn tool_result(call_id: &str, tool_name: &str, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(call_id.to_string()),
            name: Some(tool_name.to_string()),
        }
    }

    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }
}

/// A structured tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub call_type: String,
    pub function: FunctionCall,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            call_type: function_type(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

fn function_type() -> String {
    "function".to_string()
}

/// Function name plus its JSON-encoded arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// Raw JSON string as produced by the model; may be malformed.
    #[serde(default, deserialize_with = "arguments_as_string")]
    pub arguments: String,
}

/// Some servers send `arguments` as an object rather than an encoded string.
fn arguments_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(raw) => raw,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Machine-readable description of a callable tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub function: FunctionSchema,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolSchema {
    pub fn function(name: &str, description: &str, parameters: Value) -> Self {
        Self {
            schema_type: function_type(),
            function: FunctionSchema {
                name: name.to_string(),
                description: description.to_string(),
                parameters,
            },
        }
    }
}

/// The single choice returned by a chat completion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatResponse {
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl ChatResponse {
    /// Plain text, or `None` when the model produced nothing but whitespace.
    pub fn text(&self) -> Option<&str> {
        self.content.as_deref().filter(|s| !s.trim().is_empty())
    }

    pub fn calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or(&[])
    }
}

/// Trait for chat-completion model endpoints.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send the conversation. Tools are offered with `tool_choice = "auto"`
    /// when present and never forced.
    async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: Option<&[ToolSchema]>,
    ) -> Result<ChatResponse, LlmError>;

    /// Ask a multimodal model about a single image given as a data URL.
    async fn describe_image(
        &self,
        model: &str,
        prompt: &str,
        image_data_url: &str,
    ) -> Result<String, LlmError>;
}
