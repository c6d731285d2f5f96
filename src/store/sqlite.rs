//! SQLite-backed task store. Each session is its own connection.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};

use super::{
    default_agents, now_string, AgentConfig, NewTaskRecord, StoreError, StoreSession, TaskRecord,
    TaskStore,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS agents (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    role        TEXT NOT NULL,
    model_name  TEXT,
    backstory   TEXT,
    tools       TEXT
);
CREATE INDEX IF NOT EXISTS idx_agents_name ON agents(name);

CREATE TABLE IF NOT EXISTS task_logs (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    agent_id         INTEGER NOT NULL REFERENCES agents(id) ON DELETE CASCADE,
    input_query      TEXT NOT NULL,
    thought_process  TEXT,
    final_output     TEXT,
    timestamp        TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_task_logs_agent ON task_logs(agent_id);
"#;

#[derive(Debug, Clone)]
pub struct SqliteTaskStore {
    path: PathBuf,
}

impl SqliteTaskStore {
    /// Open (creating if needed) the database at `path` and apply the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
        };
        let conn = store.connect()?;
        conn.execute_batch(SCHEMA)?;
        Ok(store)
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }

    /// Insert an agent (id 0) or replace an existing one.
    pub fn upsert_agent(&self, agent: &AgentConfig) -> Result<i64, StoreError> {
        let conn = self.connect()?;
        if agent.id == 0 {
            conn.execute(
                "INSERT INTO agents (name, role, model_name, backstory, tools) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![agent.name, agent.role, agent.model_name, agent.backstory, agent.tools],
            )?;
            Ok(conn.last_insert_rowid())
        } else {
            conn.execute(
                "INSERT OR REPLACE INTO agents (id, name, role, model_name, backstory, tools) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![agent.id, agent.name, agent.role, agent.model_name, agent.backstory, agent.tools],
            )?;
            Ok(agent.id)
        }
    }

    /// Create the default agents when the table is empty. Returns how many were added.
    pub fn seed_default_agents(&self) -> Result<usize, StoreError> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM agents", [], |row| row.get(0))?;
        if count > 0 {
            return Ok(0);
        }

        let agents = default_agents();
        for agent in &agents {
            self.upsert_agent(agent)?;
        }
        tracing::info!("Seeded {} default agents", agents.len());
        Ok(agents.len())
    }
}

impl TaskStore for SqliteTaskStore {
    fn session(&self) -> Result<Box<dyn StoreSession>, StoreError> {
        Ok(Box::new(SqliteSession {
            conn: self.connect()?,
        }))
    }
}

struct SqliteSession {
    conn: Connection,
}

impl StoreSession for SqliteSession {
    fn agent(&self, agent_id: i64) -> Result<Option<AgentConfig>, StoreError> {
        let agent = self
            .conn
            .query_row(
                "SELECT id, name, role, model_name, backstory, tools FROM agents WHERE id = ?1",
                params![agent_id],
                |row| {
                    Ok(AgentConfig {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        role: row.get(2)?,
                        model_name: row.get(3)?,
                        backstory: row.get(4)?,
                        tools: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(agent)
    }

    fn create_task_record(&mut self, record: NewTaskRecord) -> Result<i64, StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO task_logs (agent_id, input_query, thought_process, final_output, timestamp) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.agent_id,
                record.input_query,
                record.thought_process,
                record.final_output,
                now_string()
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(id)
    }

    fn task_record(&self, task_id: i64) -> Result<Option<TaskRecord>, StoreError> {
        let record = self
            .conn
            .query_row(
                "SELECT id, agent_id, input_query, thought_process, final_output, timestamp FROM task_logs WHERE id = ?1",
                params![task_id],
                |row| {
                    Ok(TaskRecord {
                        id: row.get(0)?,
                        agent_id: row.get(1)?,
                        input_query: row.get(2)?,
                        thought_process: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                        final_output: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                        created_at: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }
}
