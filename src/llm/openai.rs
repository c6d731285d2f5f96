//! OpenAI-compatible chat completion client (Ollama, vLLM, OpenAI, ...).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error};

use super::{ChatMessage, ChatResponse, LlmClient, LlmError, ToolCall, ToolSchema};

/// Client for servers exposing `POST {base_url}/chat/completions`.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleClient {
    base_url: String,
    api_key: String,
    client: Client,
}

impl OpenAiCompatibleClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client: Client::new(),
        }
    }

    async fn post_completion(&self, body: &impl Serialize) -> Result<CompletionResponse, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to send request to model endpoint");
                LlmError::Request(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = %status, error = %body, "Model endpoint returned error status");
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<CompletionResponse>()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolSchema]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: Option<&[ToolSchema]>,
    ) -> Result<ChatResponse, LlmError> {
        let tools = tools.filter(|t| !t.is_empty());
        debug!(
            model = %model,
            message_count = messages.len(),
            tool_count = tools.map_or(0, |t| t.len()),
            "Requesting chat completion"
        );

        let request = CompletionRequest {
            model,
            messages,
            tools,
            tool_choice: tools.map(|_| "auto"),
        };

        let response = self.post_completion(&request).await?;
        let message = response
            .choices
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyResponse)?
            .message;

        Ok(ChatResponse {
            content: message.content,
            tool_calls: message.tool_calls.filter(|calls| !calls.is_empty()),
        })
    }

    async fn describe_image(
        &self,
        model: &str,
        prompt: &str,
        image_data_url: &str,
    ) -> Result<String, LlmError> {
        debug!(model = %model, "Requesting image description");

        let request = json!({
            "model": model,
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "text", "text": prompt},
                    {"type": "image_url", "image_url": {"url": image_data_url}},
                ],
            }],
        });

        let response = self.post_completion(&request).await?;
        let message = response
            .choices
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyResponse)?
            .message;
        Ok(message.content.unwrap_or_default())
    }
}

/// Body sent for a plain completion; exposed for request-shape assertions.
#[cfg(test)]
fn request_body(
    model: &str,
    messages: &[ChatMessage],
    tools: Option<&[ToolSchema]>,
) -> serde_json::Value {
    let tools = tools.filter(|t| !t.is_empty());
    serde_json::to_value(CompletionRequest {
        model,
        messages,
        tools,
        tool_choice: tools.map(|_| "auto"),
    })
    .unwrap_or(serde_json::Value::Null)
}
