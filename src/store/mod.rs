//! Persistence of agent configurations and task records.
//!
//! The reasoning loop opens one [`StoreSession`] per run and drops it on every
//! exit path; task records are append-only.

mod memory;
mod sqlite;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::InMemoryTaskStore;
pub use sqlite::SqliteTaskStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("store lock poisoned")]
    Poisoned,
}

/// Configuration of one agent, read-only for the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: i64,
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub backstory: Option<String>,
    #[serde(default)]
    pub model_name: Option<String>,
    /// Stored tool selection: a JSON list of names, or a single bare name.
    #[serde(default)]
    pub tools: Option<String>,
}

/// A finished run, as persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskRecord {
    pub id: i64,
    pub agent_id: i64,
    pub input_query: String,
    pub thought_process: String,
    pub final_output: String,
    pub created_at: String,
}

/// Fields supplied when a run completes.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTaskRecord {
    pub agent_id: i64,
    pub input_query: String,
    pub thought_process: String,
    pub final_output: String,
}

/// A transient handle; dropping it releases whatever it holds.
pub trait StoreSession: Send {
    fn agent(&self, agent_id: i64) -> Result<Option<AgentConfig>, StoreError>;

    /// Persist a record atomically and return its id.
    fn create_task_record(&mut self, record: NewTaskRecord) -> Result<i64, StoreError>;

    fn task_record(&self, task_id: i64) -> Result<Option<TaskRecord>, StoreError>;
}

/// Source of sessions.
pub trait TaskStore: Send + Sync {
    fn session(&self) -> Result<Box<dyn StoreSession>, StoreError>;
}

pub(crate) fn now_string() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Agents created on first start when none exist.
pub fn default_agents() -> Vec<AgentConfig> {
    let agent = |name: &str, role: &str, model: &str, backstory: &str, tools: &[&str]| AgentConfig {
        id: 0,
        name: name.to_string(),
        role: role.to_string(),
        backstory: Some(backstory.to_string()),
        model_name: Some(model.to_string()),
        tools: serde_json::to_string(tools).ok(),
    };

    vec![
        agent(
            "Researcher",
            "Researcher",
            "mistral:7b",
            "A methodical analyst focused on gathering and synthesizing information from diverse sources.",
            &["web_scraper_tool", "pdf_report_tool"],
        ),
        agent(
            "Writer",
            "Writer",
            "mistral:7b",
            "A clear and diplomatic communicator skilled at structuring ideas into polished prose.",
            &["pdf_report_tool", "send_email"],
        ),
        agent(
            "Vision Analyst",
            "Visual Interpreter",
            "llama3.2-vision:11b",
            "A multimodal analyst that produces commentary and insight from charts, tables and images.",
            &["vision_analysis_tool"],
        ),
    ]
}
