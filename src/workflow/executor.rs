//! FIFO readiness scheduling over the workflow graph.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;

use crate::agent::AgentRuntime;
use crate::tools::Capabilities;

use super::graph::WorkflowGraph;
use super::merge::merge_inputs;
use super::nodes::{NodeContext, NodeKind};
use super::WorkflowError;

/// Output of every node that ran, keyed by node id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub results: BTreeMap<String, Value>,
}

/// Runs workflow graphs one node at a time.
#[derive(Clone)]
pub struct WorkflowExecutor {
    capabilities: Capabilities,
    agents: AgentRuntime,
    reports_dir: PathBuf,
}

impl WorkflowExecutor {
    pub fn new(capabilities: Capabilities, agents: AgentRuntime, reports_dir: PathBuf) -> Self {
        Self {
            capabilities,
            agents,
            reports_dir,
        }
    }

    /// Execute `graph`. A failing node aborts the whole run.
    ///
    /// Nodes that never become ready (members of a cycle and everything
    /// downstream of one) are left out of the result.
    pub async fn run(&self, graph: &WorkflowGraph) -> Result<ExecutionResult, WorkflowError> {
        graph.validate()?;

        let mut parents: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
        for node in &graph.nodes {
            parents.entry(node.id.as_str()).or_default();
            children.entry(node.id.as_str()).or_default();
        }
        for edge in &graph.edges {
            // Parent sets, in first-seen edge order.
            let node_parents = parents.entry(edge.target.as_str()).or_default();
            if node_parents.contains(&edge.source.as_str()) {
                continue;
            }
            node_parents.push(edge.source.as_str());
            children
                .entry(edge.source.as_str())
                .or_default()
                .push(edge.target.as_str());
        }

        let nodes: HashMap<&str, _> = graph.nodes.iter().map(|n| (n.id.as_str(), n)).collect();
        let ctx = NodeContext {
            capabilities: &self.capabilities,
            agents: &self.agents,
            reports_dir: &self.reports_dir,
        };

        let mut ready: VecDeque<&str> = graph
            .nodes
            .iter()
            .map(|n| n.id.as_str())
            .filter(|id| parents.get(id).map_or(true, Vec::is_empty))
            .collect();
        let mut scheduled: HashSet<&str> = ready.iter().copied().collect();
        let mut results: BTreeMap<String, Value> = BTreeMap::new();

        tracing::info!(
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "Workflow run started"
        );

        while let Some(id) = ready.pop_front() {
            let Some(node) = nodes.get(id) else { continue };
            let kind = NodeKind::classify(&node.node_type, node.key.as_deref());

            let inputs: Vec<Value> = parents
                .get(id)
                .into_iter()
                .flatten()
                .filter_map(|parent| results.get(*parent).cloned())
                .collect();
            let input = merge_inputs(inputs);

            tracing::debug!(node = %id, kind = ?kind, "Executing workflow node");
            let output = kind.execute(id, &ctx, &node.config_map(), input).await?;
            results.insert(id.to_string(), output);

            for &child in children.get(id).into_iter().flatten() {
                let all_done = parents
                    .get(child)
                    .into_iter()
                    .flatten()
                    .all(|parent| results.contains_key(*parent));
                if all_done && scheduled.insert(child) {
                    ready.push_back(child);
                }
            }
        }

        let skipped: Vec<&str> = graph
            .nodes
            .iter()
            .map(|n| n.id.as_str())
            .filter(|id| !results.contains_key(*id))
            .collect();
        if !skipped.is_empty() {
            tracing::warn!(nodes = ?skipped, "Workflow nodes never became ready (cycle?); skipped");
        }

        tracing::info!(completed = results.len(), "Workflow run finished");
        Ok(ExecutionResult { results })
    }
}
