//! Workflow graph executor.
//!
//! A workflow is a DAG of nodes (sources, tools, agents, outputs). Nodes run
//! one at a time in FIFO readiness order; each node receives the merged
//! outputs of its parents as input.

mod executor;
mod graph;
mod merge;
mod nodes;

use thiserror::Error;

pub use executor::{ExecutionResult, WorkflowExecutor};
pub use graph::{Edge, Node, WorkflowGraph};
pub use merge::merge_inputs;
pub use nodes::NodeKind;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("duplicate node id '{0}'")]
    DuplicateNode(String),

    #[error("edge {from} -> {to} references unknown node '{missing}'")]
    UnknownEdgeEndpoint {
        from: String,
        to: String,
        missing: String,
    },

    #[error("node '{node}': {message}")]
    InvalidInput { node: String, message: String },

    #[error("agent node '{0}' requires an 'agent_id' in config")]
    MissingAgentId(String),

    #[error("agent node '{node}' failed: {message}")]
    AgentFailed { node: String, message: String },

    #[error("node '{node}' failed: {source:#}")]
    Capability {
        node: String,
        #[source]
        source: anyhow::Error,
    },
}

impl WorkflowError {
    /// Whether the graph itself was rejected before any node ran.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            WorkflowError::DuplicateNode(_) | WorkflowError::UnknownEdgeEndpoint { .. }
        )
    }
}
