//! Workflow graph as submitted by callers.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::WorkflowError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowGraph {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    /// An object, or a JSON-encoded object as a string.
    #[serde(default)]
    pub config: Option<Value>,
    /// Editor position; carried through, never read.
    #[serde(default)]
    pub position: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    #[serde(default, alias = "sourceHandle")]
    pub source_handle: Option<String>,
    #[serde(default, alias = "targetHandle")]
    pub target_handle: Option<String>,
}

impl Node {
    /// The node's configuration as an object. Invalid JSON strings and
    /// non-object values become an empty configuration.
    pub fn config_map(&self) -> Map<String, Value> {
        match &self.config {
            Some(Value::Object(map)) => map.clone(),
            Some(Value::String(encoded)) => match serde_json::from_str::<Value>(encoded) {
                Ok(Value::Object(map)) => map,
                _ => {
                    tracing::debug!(node = %self.id, "Ignoring unparsable node config");
                    Map::new()
                }
            },
            _ => Map::new(),
        }
    }
}

impl WorkflowGraph {
    /// Reject duplicate node ids and edges that name unknown nodes.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        let mut ids = HashSet::new();
        for node in &self.nodes {
            if !ids.insert(node.id.as_str()) {
                return Err(WorkflowError::DuplicateNode(node.id.clone()));
            }
        }

        for edge in &self.edges {
            for endpoint in [&edge.source, &edge.target] {
                if !ids.contains(endpoint.as_str()) {
                    return Err(WorkflowError::UnknownEdgeEndpoint {
                        from: edge.source.clone(),
                        to: edge.target.clone(),
                        missing: endpoint.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_editor_graph() {
        let graph: WorkflowGraph = serde_json::from_value(json!({
            "nodes": [
                {"id": "n1", "type": "source", "key": "url_input", "config": "{\"url\": \"https://x.io\"}",
                 "position": {"x": 1, "y": 2}},
                {"id": "n2", "type": "output", "label": "Result"}
            ],
            "edges": [{"source": "n1", "target": "n2", "sourceHandle": "out"}]
        }))
        .unwrap();

        assert_eq!(graph.nodes[0].config_map().get("url"), Some(&json!("https://x.io")));
        assert!(graph.nodes[1].config_map().is_empty());
        assert_eq!(graph.edges[0].source_handle.as_deref(), Some("out"));
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn test_bad_config_string_is_empty() {
        let node: Node = serde_json::from_value(json!({
            "id": "n", "type": "tool", "config": "{oops"
        }))
        .unwrap();
        assert!(node.config_map().is_empty());

        let node: Node = serde_json::from_value(json!({
            "id": "n", "type": "tool", "config": "[1, 2]"
        }))
        .unwrap();
        assert!(node.config_map().is_empty());
    }

    #[test]
    fn test_validation_errors() {
        let graph: WorkflowGraph = serde_json::from_value(json!({
            "nodes": [{"id": "a", "type": "output"}, {"id": "a", "type": "output"}]
        }))
        .unwrap();
        assert!(matches!(graph.validate(), Err(WorkflowError::DuplicateNode(id)) if id == "a"));

        let graph: WorkflowGraph = serde_json::from_value(json!({
            "nodes": [{"id": "a", "type": "output"}],
            "edges": [{"source": "a", "target": "ghost"}]
        }))
        .unwrap();
        let err = graph.validate().unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("ghost"));
    }
}
