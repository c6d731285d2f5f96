//! HTTP route handlers.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::{Stream, StreamExt};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::agent::{AgentRuntime, TaskOutcome, TaskRequest};
use crate::store::TaskRecord;
use crate::workflow::{WorkflowExecutor, WorkflowGraph};

use super::types::{HealthResponse, RunAgentRequest, WorkflowResponse};

/// Shared application state.
pub struct AppState {
    pub agents: AgentRuntime,
    pub workflows: WorkflowExecutor,
}

/// Build the router with all endpoints.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/agents/:agent_id/stream", post(stream_agent))
        .route("/api/agents/:agent_id/tasks", post(run_agent))
        .route("/api/tasks/:task_log_id", get(get_task))
        .route("/api/workflows/execute", post(execute_workflow))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

fn task_request(agent_id: i64, body: RunAgentRequest) -> Result<TaskRequest, (StatusCode, String)> {
    let prompt = body.prompt.trim();
    if prompt.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Prompt cannot be empty.".to_string()));
    }
    Ok(TaskRequest {
        agent_id,
        prompt: prompt.to_string(),
        image_path: body.image_path.filter(|p| !p.trim().is_empty()),
    })
}

/// Stream a reasoning-loop run as server-sent events.
async fn stream_agent(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<i64>,
    Json(body): Json<RunAgentRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, String)> {
    let request = task_request(agent_id, body)?;
    let events = state
        .agents
        .stream_task(request)
        .map(|event| Ok(Event::default().event(event.kind()).data(event.wire_payload())));

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// Run a task to completion and return its outcome.
async fn run_agent(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<i64>,
    Json(body): Json<RunAgentRequest>,
) -> Result<Json<TaskOutcome>, (StatusCode, String)> {
    let request = task_request(agent_id, body)?;
    Ok(Json(state.agents.run_task(request).await))
}

async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(task_log_id): Path<i64>,
) -> Result<Json<TaskRecord>, (StatusCode, String)> {
    let store = state.agents.store().clone();
    let record = tokio::task::spawn_blocking(move || {
        store.session().and_then(|session| session.task_record(task_log_id))
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    record
        .map(Json)
        .ok_or_else(|| (StatusCode::NOT_FOUND, "Task not found.".to_string()))
}

async fn execute_workflow(
    State(state): State<Arc<AppState>>,
    Json(graph): Json<WorkflowGraph>,
) -> Result<Json<WorkflowResponse>, (StatusCode, String)> {
    match state.workflows.run(&graph).await {
        Ok(result) => Ok(Json(WorkflowResponse {
            results: result.results,
        })),
        Err(e) if e.is_validation() => Err((StatusCode::BAD_REQUEST, e.to_string())),
        Err(e) => {
            tracing::error!("Workflow execution failed: {}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::store::InMemoryTaskStore;
    use crate::testing::{reply, store_with_agent, ScriptedLlm, StubCapabilities};
    use crate::tools::{ToolPaths, ToolRegistry};

    async fn spawn_app(llm: ScriptedLlm, store: InMemoryTaskStore) -> (String, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::new(dir.path().to_path_buf());
        let capabilities = StubCapabilities::default().capabilities();
        let tools = ToolRegistry::new(
            &capabilities,
            &ToolPaths {
                reports_dir: config.reports_dir.clone(),
                uploads_dir: config.uploads_dir.clone(),
            },
        );
        let agents = AgentRuntime::new(
            Arc::new(llm),
            Arc::new(tools),
            Arc::new(store),
            config.default_model.clone(),
            config.max_steps,
        );
        let workflows =
            WorkflowExecutor::new(capabilities, agents.clone(), config.reports_dir.clone());
        let app = router(Arc::new(AppState {
            agents,
            workflows,
        }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), dir)
    }

    #[tokio::test]
    async fn test_health() {
        let (base, _dir) = spawn_app(ScriptedLlm::new(vec![]), InMemoryTaskStore::new()).await;
        let health: HealthResponse = reqwest::get(format!("{base}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health.status, "ok");
    }

    #[tokio::test]
    async fn test_empty_prompt_rejected() {
        let (base, _dir) = spawn_app(ScriptedLlm::new(vec![]), store_with_agent(&[], None)).await;
        let response = reqwest::Client::new()
            .post(format!("{base}/api/agents/1/tasks"))
            .json(&serde_json::json!({"prompt": "   "}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        assert_eq!(response.text().await.unwrap(), "Prompt cannot be empty.");
    }

    #[tokio::test]
    async fn test_sync_task_then_lookup() {
        let (base, _dir) = spawn_app(
            ScriptedLlm::new(vec![reply("hello back")]),
            store_with_agent(&[], None),
        )
        .await;
        let client = reqwest::Client::new();

        let outcome: serde_json::Value = client
            .post(format!("{base}/api/agents/1/tasks"))
            .json(&serde_json::json!({"prompt": "hello"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(outcome["final_output"], "hello back");
        let id = outcome["task_log_id"].as_i64().unwrap();

        let record: serde_json::Value = client
            .get(format!("{base}/api/tasks/{id}"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(record["input_query"], "hello");

        let missing = client
            .get(format!("{base}/api/tasks/999"))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_stream_frames() {
        let (base, _dir) = spawn_app(
            ScriptedLlm::new(vec![reply("line one\nline two")]),
            store_with_agent(&[], None),
        )
        .await;

        let body = reqwest::Client::new()
            .post(format!("{base}/api/agents/1/stream"))
            .json(&serde_json::json!({"prompt": "go"}))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();

        assert!(body.contains("event: thought\ndata: line one\\nline two\n\n"));
        assert!(body.contains("event: final\n"));
        assert!(body.ends_with("event: done\ndata: [DONE]\n\n"));
    }

    #[tokio::test]
    async fn test_workflow_status_codes() {
        let (base, _dir) = spawn_app(ScriptedLlm::new(vec![]), InMemoryTaskStore::new()).await;
        let client = reqwest::Client::new();

        let ok: WorkflowResponse = client
            .post(format!("{base}/api/workflows/execute"))
            .json(&serde_json::json!({
                "nodes": [{"id": "a", "type": "source", "key": "url_input", "config": {"url": "u"}}],
                "edges": []
            }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(ok.results["a"], "u");

        let invalid = client
            .post(format!("{base}/api/workflows/execute"))
            .json(&serde_json::json!({
                "nodes": [{"id": "a", "type": "output"}],
                "edges": [{"source": "a", "target": "b"}]
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(invalid.status(), reqwest::StatusCode::BAD_REQUEST);

        let failed = client
            .post(format!("{base}/api/workflows/execute"))
            .json(&serde_json::json!({
                "nodes": [{"id": "ag", "type": "agent"}],
                "edges": []
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(failed.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    }
}
