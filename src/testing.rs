//! Test doubles shared by the unit tests.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::llm::{ChatMessage, ChatResponse, LlmClient, LlmError, ToolCall, ToolSchema};
use crate::store::{AgentConfig, InMemoryTaskStore};
use crate::tools::{Capabilities, DocumentRenderer, ImageAnalyzer, Mailer, WebExtractor};

/// A model reply with plain text.
pub fn reply(text: &str) -> ChatResponse {
    ChatResponse {
        content: Some(text.to_string()),
        tool_calls: None,
    }
}

/// A model reply requesting one structured tool call.
pub fn tool_call_reply(id: &str, name: &str, arguments: &str) -> ChatResponse {
    ChatResponse {
        content: None,
        tool_calls: Some(vec![ToolCall::new(id, name, arguments)]),
    }
}

/// One recorded `chat_completion` request.
#[derive(Debug, Clone)]
pub struct RecordedChat {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub tool_names: Vec<String>,
}

/// An LLM that replays a fixed script of responses.
#[derive(Default)]
pub struct ScriptedLlm {
    script: Mutex<VecDeque<Result<ChatResponse, String>>>,
    chats: Mutex<Vec<RecordedChat>>,
    image_description: Mutex<String>,
    images: Mutex<Vec<(String, String, String)>>,
}

impl ScriptedLlm {
    pub fn new(responses: Vec<ChatResponse>) -> Self {
        Self {
            script: Mutex::new(responses.into_iter().map(Ok).collect()),
            ..Self::default()
        }
    }

    /// Queue a failing step after the responses already scripted.
    pub fn then_fail(self, message: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
        self
    }

    pub fn set_image_description(&self, text: &str) {
        *self.image_description.lock().unwrap() = text.to_string();
    }

    pub fn chats(&self) -> Vec<RecordedChat> {
        self.chats.lock().unwrap().clone()
    }

    /// `(model, prompt, data_url)` for every `describe_image` call.
    pub fn image_requests(&self) -> Vec<(String, String, String)> {
        self.images.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: Option<&[ToolSchema]>,
    ) -> Result<ChatResponse, LlmError> {
        self.chats.lock().unwrap().push(RecordedChat {
            model: model.to_string(),
            messages: messages.to_vec(),
            tool_names: tools
                .unwrap_or_default()
                .iter()
                .map(|t| t.function.name.clone())
                .collect(),
        });

        match self.script.lock().unwrap().pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(LlmError::Decode(message)),
            None => Err(LlmError::Decode("script exhausted".to_string())),
        }
    }

    async fn describe_image(
        &self,
        model: &str,
        prompt: &str,
        image_data_url: &str,
    ) -> Result<String, LlmError> {
        self.images.lock().unwrap().push((
            model.to_string(),
            prompt.to_string(),
            image_data_url.to_string(),
        ));
        Ok(self.image_description.lock().unwrap().clone())
    }
}

#[derive(Default)]
struct StubState {
    rendered: Vec<(String, PathBuf)>,
    analyzed: Vec<(PathBuf, Option<String>, Option<String>)>,
    fetched: Vec<String>,
    sent: Vec<(Vec<String>, String, String)>,
    page_text: Option<String>,
    web_failure: Option<String>,
}

/// Recording stand-ins for every capability.
#[derive(Clone, Default)]
pub struct StubCapabilities {
    state: Arc<Mutex<StubState>>,
}

impl StubCapabilities {
    pub fn capabilities(&self) -> Capabilities {
        let shared = Arc::new(self.clone());
        Capabilities {
            documents: shared.clone(),
            vision: shared.clone(),
            web: shared.clone(),
            mail: shared,
        }
    }

    pub fn set_page_text(&self, text: &str) {
        self.state.lock().unwrap().page_text = Some(text.to_string());
    }

    pub fn fail_web(&self, message: &str) {
        self.state.lock().unwrap().web_failure = Some(message.to_string());
    }

    pub fn rendered(&self) -> Vec<(String, PathBuf)> {
        self.state.lock().unwrap().rendered.clone()
    }

    pub fn analyzed(&self) -> Vec<(PathBuf, Option<String>, Option<String>)> {
        self.state.lock().unwrap().analyzed.clone()
    }

    pub fn fetched_urls(&self) -> Vec<String> {
        self.state.lock().unwrap().fetched.clone()
    }

    pub fn sent_mail(&self) -> Vec<(Vec<String>, String, String)> {
        self.state.lock().unwrap().sent.clone()
    }
}

#[async_trait]
impl DocumentRenderer for StubCapabilities {
    async fn render(&self, title: &str, _content: &str, path: &Path) -> anyhow::Result<PathBuf> {
        self.state
            .lock()
            .unwrap()
            .rendered
            .push((title.to_string(), path.to_path_buf()));
        Ok(path.to_path_buf())
    }
}

#[async_trait]
impl ImageAnalyzer for StubCapabilities {
    async fn analyze(
        &self,
        image_path: &Path,
        prompt: Option<&str>,
        model_hint: Option<&str>,
    ) -> anyhow::Result<String> {
        self.state.lock().unwrap().analyzed.push((
            image_path.to_path_buf(),
            prompt.map(str::to_string),
            model_hint.map(str::to_string),
        ));
        Ok("stub description".to_string())
    }
}

#[async_trait]
impl WebExtractor for StubCapabilities {
    async fn extract(&self, url: &str) -> anyhow::Result<String> {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = &state.web_failure {
            anyhow::bail!("{}", message);
        }
        state.fetched.push(url.to_string());
        Ok(state
            .page_text
            .clone()
            .unwrap_or_else(|| "stub page text".to_string()))
    }
}

#[async_trait]
impl Mailer for StubCapabilities {
    async fn send(&self, to: &[String], subject: &str, body: &str) -> anyhow::Result<()> {
        self.state
            .lock()
            .unwrap()
            .sent
            .push((to.to_vec(), subject.to_string(), body.to_string()));
        Ok(())
    }
}

/// An in-memory store holding a single agent with id 1.
pub fn store_with_agent(tools: &[&str], model_name: Option<&str>) -> InMemoryTaskStore {
    let store = InMemoryTaskStore::new();
    store
        .upsert_agent(AgentConfig {
            id: 1,
            name: "Scout".to_string(),
            role: "Researcher".to_string(),
            backstory: Some("Finds things.".to_string()),
            model_name: model_name.map(str::to_string),
            tools: serde_json::to_string(tools).ok(),
        })
        .unwrap();
    store
}
