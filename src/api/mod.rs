//! HTTP API exposing agent runs and workflow execution.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `POST /api/agents/:agent_id/stream` - Run an agent, streaming events (SSE)
//! - `POST /api/agents/:agent_id/tasks` - Run an agent and wait for the outcome
//! - `GET /api/tasks/:task_log_id` - Fetch a persisted task record
//! - `POST /api/workflows/execute` - Run a workflow graph

mod routes;
pub mod types;

use std::sync::Arc;

use anyhow::Context;

use crate::agent::AgentRuntime;
use crate::config::Config;
use crate::llm::{LlmClient, OpenAiCompatibleClient};
use crate::store::SqliteTaskStore;
use crate::tools::{Capabilities, ToolPaths, ToolRegistry};
use crate::workflow::WorkflowExecutor;

pub use routes::{router, AppState};

/// Wire up the runtime from configuration.
pub fn build_state(config: Config) -> anyhow::Result<AppState> {
    for dir in [&config.reports_dir, &config.uploads_dir] {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("cannot create directory {}", dir.display()))?;
    }

    let store = SqliteTaskStore::open(&config.database_path).with_context(|| {
        format!("cannot open database {}", config.database_path.display())
    })?;
    store.seed_default_agents()?;

    let llm: Arc<dyn LlmClient> = Arc::new(OpenAiCompatibleClient::new(
        &config.base_url,
        &config.api_key,
    ));
    let capabilities = Capabilities::from_config(&config, llm.clone())?;
    let tools = ToolRegistry::new(
        &capabilities,
        &ToolPaths {
            reports_dir: config.reports_dir.clone(),
            uploads_dir: config.uploads_dir.clone(),
        },
    );

    let agents = AgentRuntime::new(
        llm,
        Arc::new(tools),
        Arc::new(store),
        config.default_model.clone(),
        config.max_steps,
    );
    let workflows = WorkflowExecutor::new(capabilities, agents.clone(), config.reports_dir.clone());

    Ok(AppState {
        agents,
        workflows,
    })
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(build_state(config)?);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("cannot bind {}", addr))?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::TaskStore;

    #[test]
    fn test_build_state_prepares_directories_and_agents() {
        let dir = tempfile::tempdir().unwrap();
        let state = build_state(Config::new(dir.path().to_path_buf())).unwrap();

        assert!(dir.path().join("reports").is_dir());
        assert!(dir.path().join("uploads").is_dir());
        let session = state.agents.store().session().unwrap();
        assert_eq!(session.agent(1).unwrap().unwrap().name, "Researcher");
    }
}
