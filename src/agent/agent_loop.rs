//! Core reasoning loop: query the model, run the tools it asks for, feed the
//! observations back, stop on a final answer or when the step budget runs out.

use std::path::PathBuf;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::llm::{ChatMessage, LlmClient, LlmError, ToolCall};
use crate::store::{AgentConfig, NewTaskRecord, StoreError, StoreSession, TaskStore};
use crate::tools::{Observation, ToolRegistry};

use super::events::{AgentEvent, FinalPayload};
use super::inline::parse_inline_tool_call;
use super::prompt::{build_system_prompt, build_user_message, parse_tool_names};

/// Final answer used when the model never produced text.
pub const NO_RESPONSE_PLACEHOLDER: &str =
    "The agent completed its reasoning but produced no final text response.";

/// A prompt addressed to one agent.
#[derive(Debug, Clone)]
pub struct TaskRequest {
    pub agent_id: i64,
    pub prompt: String,
    pub image_path: Option<String>,
}

/// Result of a run collected without streaming.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskOutcome {
    pub task_log_id: Option<i64>,
    pub agent_id: i64,
    pub final_output: String,
    pub artifact_path: Option<PathBuf>,
    pub thought_process: String,
    pub error: Option<String>,
}

/// Failures that end a run early.
#[derive(Debug, Error)]
enum RunError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Model(#[from] LlmError),

    #[error("store task failed: {0}")]
    StoreTask(#[from] tokio::task::JoinError),
}

struct Conclusion {
    final_output: String,
    artifact: Option<PathBuf>,
}

/// Shared handles needed to run agents. Cheap to clone.
#[derive(Clone)]
pub struct AgentRuntime {
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    store: Arc<dyn TaskStore>,
    default_model: String,
    max_steps: usize,
}

impl AgentRuntime {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        tools: Arc<ToolRegistry>,
        store: Arc<dyn TaskStore>,
        default_model: impl Into<String>,
        max_steps: usize,
    ) -> Self {
        Self {
            llm,
            tools,
            store,
            default_model: default_model.into(),
            max_steps: max_steps.max(1),
        }
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    /// Run a task and stream its events. The stream always ends with
    /// [`AgentEvent::Done`]. Dropping the stream cancels the run and
    /// releases its store session.
    pub fn stream_task(&self, request: TaskRequest) -> impl Stream<Item = AgentEvent> + Send + 'static {
        let runtime = self.clone();
        let run_id = Uuid::new_v4();

        struct StreamDropGuard {
            run_id: Uuid,
            agent_id: i64,
        }

        impl Drop for StreamDropGuard {
            fn drop(&mut self) {
                tracing::info!(
                    run_id = %self.run_id,
                    agent_id = self.agent_id,
                    "Agent event stream closed"
                );
            }
        }

        let drop_guard = StreamDropGuard {
            run_id,
            agent_id: request.agent_id,
        };

        async_stream::stream! {
            let _guard = drop_guard;
            let (tx, mut rx) = mpsc::unbounded_channel();
            let run = runtime.execute(run_id, request, tx);
            tokio::pin!(run);
            let mut running = true;

            loop {
                tokio::select! {
                    Some(event) = rx.recv() => yield event,
                    _ = &mut run, if running => running = false,
                    else => break,
                }
            }
        }
    }

    /// Run a task to completion and collect its outcome.
    pub async fn run_task(&self, request: TaskRequest) -> TaskOutcome {
        let mut outcome = TaskOutcome {
            agent_id: request.agent_id,
            ..TaskOutcome::default()
        };
        let mut transcript = Vec::new();

        let events = self.stream_task(request).collect::<Vec<_>>().await;
        for event in events {
            if event.is_transcript_line() {
                transcript.push(event.payload());
            }
            match event {
                AgentEvent::Final(payload) => {
                    outcome.task_log_id = Some(payload.task_log_id);
                    outcome.final_output = payload.final_output;
                    outcome.artifact_path = payload.artifact_path;
                }
                AgentEvent::Error(message) => outcome.error = Some(message),
                _ => {}
            }
        }

        outcome.thought_process = transcript.join("\n");
        outcome
    }

    async fn execute(&self, run_id: Uuid, request: TaskRequest, tx: mpsc::UnboundedSender<AgentEvent>) {
        tracing::info!(run_id = %run_id, agent_id = request.agent_id, "Agent run started");
        let mut emitter = Emitter::new(tx, &request);

        if let Err(e) = self.run(run_id, &request, &mut emitter).await {
            tracing::error!(run_id = %run_id, agent_id = request.agent_id, "Agent run failed: {}", e);
            emitter.emit(AgentEvent::Error(format!("Fatal error: {}", e)));
        }

        emitter.emit(AgentEvent::Done);
        tracing::info!(run_id = %run_id, agent_id = request.agent_id, "Agent run finished");
    }

    async fn run(
        &self,
        run_id: Uuid,
        request: &TaskRequest,
        emitter: &mut Emitter,
    ) -> Result<(), RunError> {
        let store = self.store.clone();
        let session = tokio::task::spawn_blocking(move || store.session()).await??;

        let agent_id = request.agent_id;
        let (session, agent) = with_session(session, move |s| s.agent(agent_id)).await?;
        let Some(agent) = agent else {
            tracing::warn!(run_id = %run_id, agent_id = request.agent_id, "Agent not found");
            emitter.emit(AgentEvent::Error(format!(
                "Agent #{} not found.",
                request.agent_id
            )));
            return Ok(());
        };

        match self.reason(run_id, &agent, request, emitter).await {
            Ok(conclusion) => {
                let record = task_record(request, emitter, conclusion.final_output.clone());
                let task_log_id = persist(session, record).await?;
                emitter.emit(AgentEvent::Final(FinalPayload {
                    task_log_id,
                    agent_id: agent.id,
                    final_output: conclusion.final_output,
                    artifact_path: conclusion.artifact,
                }));
                Ok(())
            }
            Err(e) => {
                // Keep the partial transcript of a failed run.
                let record = task_record(request, emitter, format!("Fatal error: {}", e));
                if let Err(persist_err) = persist(session, record).await {
                    tracing::error!(
                        run_id = %run_id,
                        agent_id = request.agent_id,
                        "Failed to persist failed run: {}",
                        persist_err
                    );
                }
                Err(e)
            }
        }
    }

    async fn reason(
        &self,
        run_id: Uuid,
        agent: &AgentConfig,
        request: &TaskRequest,
        emitter: &mut Emitter,
    ) -> Result<Conclusion, RunError> {
        let configured_model = agent
            .model_name
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty());
        let model = configured_model.unwrap_or(&self.default_model);

        let tool_names = parse_tool_names(agent.tools.as_deref());
        let schemas = self.tools.schemas_for(&tool_names);
        let offered = (!schemas.is_empty()).then_some(schemas.as_slice());

        let mut messages = vec![
            ChatMessage::system(build_system_prompt(agent, &tool_names)),
            ChatMessage::user(build_user_message(
                &request.prompt,
                request.image_path.as_deref(),
            )),
        ];
        let mut artifact = None;

        for step in 1..=self.max_steps {
            tracing::debug!(run_id = %run_id, step, model = %model, "Querying model");
            emitter.emit(AgentEvent::Thought(format!(
                "[Step {}] Querying model {}…",
                step, model
            )));

            let response = self.llm.chat_completion(model, &messages, offered).await?;
            let text = response.text();
            if let Some(text) = text {
                emitter.emit(AgentEvent::Thought(text.to_string()));
            }

            let calls = response.calls();
            if !calls.is_empty() {
                for (index, call) in calls.iter().enumerate() {
                    let call = with_call_id(call, step, index);
                    emitter.emit(AgentEvent::Action(format!(
                        "[ACTION] Executing tool: {}\nArgs: {}",
                        call.function.name, call.function.arguments
                    )));

                    let observation = self
                        .tools
                        .invoke(&call.function.name, &call.function.arguments, configured_model)
                        .await;
                    record_observation(emitter, &observation, &mut artifact);

                    let call_id = call.id.clone();
                    let tool_name = call.function.name.clone();
                    messages.push(ChatMessage::assistant_tool_call(call));
                    messages.push(ChatMessage::tool_result(&call_id, &tool_name, observation.text));
                }
                continue;
            }

            let Some(text) = text else {
                tracing::debug!(run_id = %run_id, step, "Model returned an empty response");
                break;
            };

            if let Some(inline) = parse_inline_tool_call(text) {
                let arguments = inline.arguments_json();
                emitter.emit(AgentEvent::Action(format!(
                    "[ACTION] Intercepted inline tool call: {}\nArgs: {}",
                    inline.name, arguments
                )));

                let observation = self
                    .tools
                    .invoke(&inline.name, &arguments, configured_model)
                    .await;
                record_observation(emitter, &observation, &mut artifact);

                messages.push(ChatMessage::assistant(format!(
                    "[Tool '{}' executed.]\n{}",
                    inline.name, observation.text
                )));
                continue;
            }

            return Ok(Conclusion {
                final_output: text.to_string(),
                artifact,
            });
        }

        Ok(Conclusion {
            final_output: NO_RESPONSE_PLACEHOLDER.to_string(),
            artifact,
        })
    }
}

/// Collects the transcript while forwarding events to the stream.
struct Emitter {
    tx: mpsc::UnboundedSender<AgentEvent>,
    transcript: Vec<String>,
}

impl Emitter {
    fn new(tx: mpsc::UnboundedSender<AgentEvent>, request: &TaskRequest) -> Self {
        let mut transcript = vec![format!("USER: {}", request.prompt)];
        if let Some(image) = &request.image_path {
            transcript.push(format!("USER IMAGE: {}", image));
        }
        Self { tx, transcript }
    }

    fn emit(&mut self, event: AgentEvent) {
        if event.is_transcript_line() {
            self.transcript.push(event.payload());
        }
        // The receiver only goes away together with the run itself.
        let _ = self.tx.send(event);
    }

    fn transcript(&self) -> String {
        self.transcript.join("\n")
    }
}

/// Run a store call on the blocking pool; the session travels with it.
async fn with_session<T, F>(
    mut session: Box<dyn StoreSession>,
    call: F,
) -> Result<(Box<dyn StoreSession>, T), RunError>
where
    T: Send + 'static,
    F: FnOnce(&mut dyn StoreSession) -> Result<T, StoreError> + Send + 'static,
{
    let (session, result) = tokio::task::spawn_blocking(move || {
        let result = call(session.as_mut());
        (session, result)
    })
    .await?;
    Ok((session, result?))
}

async fn persist(session: Box<dyn StoreSession>, record: NewTaskRecord) -> Result<i64, RunError> {
    let (_, task_log_id) = with_session(session, move |s| s.create_task_record(record)).await?;
    Ok(task_log_id)
}

fn task_record(request: &TaskRequest, emitter: &Emitter, final_output: String) -> NewTaskRecord {
    NewTaskRecord {
        agent_id: request.agent_id,
        input_query: request.prompt.clone(),
        thought_process: emitter.transcript(),
        final_output,
    }
}

fn record_observation(emitter: &mut Emitter, observation: &Observation, artifact: &mut Option<PathBuf>) {
    emitter.emit(AgentEvent::Observation(format!(
        "[OBSERVATION] {}",
        observation.text
    )));
    if let Some(path) = &observation.artifact {
        *artifact = Some(path.clone());
    }
}

/// Tool results must reference the call; some servers omit the id.
fn with_call_id(call: &ToolCall, step: usize, index: usize) -> ToolCall {
    let mut call = call.clone();
    if call.id.trim().is_empty() {
        call.id = format!("call_{}_{}", step, index);
    }
    call
}
