//! In-memory task store (non-persistent).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::{now_string, AgentConfig, NewTaskRecord, StoreError, StoreSession, TaskRecord, TaskStore};

#[derive(Default)]
struct State {
    agents: HashMap<i64, AgentConfig>,
    tasks: Vec<TaskRecord>,
}

#[derive(Clone, Default)]
pub struct InMemoryTaskStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an agent. An id of 0 assigns the next free id.
    pub fn upsert_agent(&self, mut agent: AgentConfig) -> Result<i64, StoreError> {
        let mut state = self.state.lock().map_err(|_| StoreError::Poisoned)?;
        if agent.id == 0 {
            agent.id = state.agents.keys().max().copied().unwrap_or(0) + 1;
        }
        let id = agent.id;
        state.agents.insert(id, agent);
        Ok(id)
    }

    /// Every record created so far, oldest first.
    pub fn task_records(&self) -> Vec<TaskRecord> {
        self.state
            .lock()
            .map(|state| state.tasks.clone())
            .unwrap_or_default()
    }
}

impl TaskStore for InMemoryTaskStore {
    fn session(&self) -> Result<Box<dyn StoreSession>, StoreError> {
        Ok(Box::new(MemorySession {
            state: self.state.clone(),
        }))
    }
}

struct MemorySession {
    state: Arc<Mutex<State>>,
}

impl StoreSession for MemorySession {
    fn agent(&self, agent_id: i64) -> Result<Option<AgentConfig>, StoreError> {
        let state = self.state.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(state.agents.get(&agent_id).cloned())
    }

    fn create_task_record(&mut self, record: NewTaskRecord) -> Result<i64, StoreError> {
        let mut state = self.state.lock().map_err(|_| StoreError::Poisoned)?;
        let id = state.tasks.len() as i64 + 1;
        state.tasks.push(TaskRecord {
            id,
            agent_id: record.agent_id,
            input_query: record.input_query,
            thought_process: record.thought_process,
            final_output: record.final_output,
            created_at: now_string(),
        });
        Ok(id)
    }

    fn task_record(&self, task_id: i64) -> Result<Option<TaskRecord>, StoreError> {
        let state = self.state.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(state.tasks.iter().find(|t| t.id == task_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::default_agents;

    #[test]
    fn test_upsert_assigns_sequential_ids() {
        let store = InMemoryTaskStore::new();
        let ids: Vec<i64> = default_agents()
            .into_iter()
            .map(|a| store.upsert_agent(a).unwrap())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);

        let session = store.session().unwrap();
        assert_eq!(session.agent(2).unwrap().unwrap().name, "Writer");
        assert!(session.agent(9).unwrap().is_none());
    }

    #[test]
    fn test_records_are_shared_across_sessions() {
        let store = InMemoryTaskStore::new();
        let id = store
            .session()
            .unwrap()
            .create_task_record(NewTaskRecord {
                agent_id: 1,
                input_query: "q".to_string(),
                thought_process: "t".to_string(),
                final_output: "f".to_string(),
            })
            .unwrap();

        let record = store.session().unwrap().task_record(id).unwrap().unwrap();
        assert_eq!(record.final_output, "f");
        assert_eq!(store.task_records().len(), 1);
    }
}
