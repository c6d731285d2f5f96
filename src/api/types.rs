//! API request and response types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of the agent run endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct RunAgentRequest {
    /// The user prompt
    pub prompt: String,

    /// Optional server-side path of an uploaded image
    #[serde(default)]
    pub image_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Outputs of a workflow run, keyed by node id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowResponse {
    pub results: BTreeMap<String, Value>,
}
