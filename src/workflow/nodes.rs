//! Node behaviors, dispatched on an explicit kind.

use std::path::Path;

use serde_json::{json, Map, Value};

use crate::agent::{AgentRuntime, TaskRequest};
use crate::tools::{
    recipients_from_value, sanitize_filename, validate_url, Capabilities, DEFAULT_REPORT_TITLE,
    DEFAULT_SUBJECT,
};

use super::WorkflowError;

const DEFAULT_WORKFLOW_REPORT: &str = "workflow_report.pdf";

/// What a node does, derived from its `(type, key)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    UrlInput,
    Schedule,
    WebScraper,
    EmailSender,
    PdfReport,
    Agent,
    Output,
    /// Anything unrecognized passes its input through.
    Passthrough,
}

impl NodeKind {
    pub fn classify(node_type: &str, key: Option<&str>) -> Self {
        match (node_type, key) {
            ("source", Some("url_input")) => NodeKind::UrlInput,
            ("source", Some("schedule")) => NodeKind::Schedule,
            ("tool", Some("web_scraper")) => NodeKind::WebScraper,
            ("tool", Some("email_sender")) => NodeKind::EmailSender,
            ("tool", Some("pdf_report")) => NodeKind::PdfReport,
            ("agent", _) => NodeKind::Agent,
            ("output", _) => NodeKind::Output,
            _ => NodeKind::Passthrough,
        }
    }
}

/// Collaborators a node may call.
pub(crate) struct NodeContext<'a> {
    pub capabilities: &'a Capabilities,
    pub agents: &'a AgentRuntime,
    pub reports_dir: &'a Path,
}

impl NodeKind {
    pub(crate) async fn execute(
        self,
        node_id: &str,
        ctx: &NodeContext<'_>,
        config: &Map<String, Value>,
        input: Value,
    ) -> Result<Value, WorkflowError> {
        match self {
            NodeKind::UrlInput => Ok(match config_str(config, "url") {
                Some(url) => Value::String(url.to_string()),
                None => input,
            }),
            NodeKind::Schedule => Ok(Value::Object(config.clone())),
            NodeKind::WebScraper => web_scraper(node_id, ctx, config, &input).await,
            NodeKind::EmailSender => email_sender(node_id, ctx, config, &input).await,
            NodeKind::PdfReport => pdf_report(node_id, ctx, config, &input).await,
            NodeKind::Agent => agent(node_id, ctx, config, &input).await,
            NodeKind::Output | NodeKind::Passthrough => Ok(input),
        }
    }
}

async fn web_scraper(
    node_id: &str,
    ctx: &NodeContext<'_>,
    config: &Map<String, Value>,
    input: &Value,
) -> Result<Value, WorkflowError> {
    let url = config_str(config, "url")
        .or_else(|| input.as_str().map(str::trim).filter(|s| !s.is_empty()))
        .ok_or_else(|| WorkflowError::InvalidInput {
            node: node_id.to_string(),
            message: "web scraper node requires a URL string input".to_string(),
        })?;
    validate_url(url).map_err(|e| WorkflowError::InvalidInput {
        node: node_id.to_string(),
        message: e.to_string(),
    })?;

    let text = ctx
        .capabilities
        .web
        .extract(url)
        .await
        .map_err(|source| capability_error(node_id, source))?;
    Ok(Value::String(text))
}

async fn email_sender(
    node_id: &str,
    ctx: &NodeContext<'_>,
    config: &Map<String, Value>,
    input: &Value,
) -> Result<Value, WorkflowError> {
    let to = config.get("to").map(recipients_from_value).unwrap_or_default();
    if to.is_empty() {
        tracing::warn!(node = %node_id, "Email node has no recipients; skipping");
        return Ok(json!({"status": "skipped", "to": []}));
    }

    let subject = config_str(config, "subject").unwrap_or(DEFAULT_SUBJECT);
    ctx.capabilities
        .mail
        .send(&to, subject, &render_text(input))
        .await
        .map_err(|source| capability_error(node_id, source))?;

    Ok(json!({"status": "sent", "to": to}))
}

async fn pdf_report(
    node_id: &str,
    ctx: &NodeContext<'_>,
    config: &Map<String, Value>,
    input: &Value,
) -> Result<Value, WorkflowError> {
    let title = config_str(config, "title").unwrap_or(DEFAULT_REPORT_TITLE);
    let filename = sanitize_filename(
        config_str(config, "filename").unwrap_or(DEFAULT_WORKFLOW_REPORT),
        DEFAULT_WORKFLOW_REPORT,
    );
    let path = ctx.reports_dir.join(filename);

    let written = ctx
        .capabilities
        .documents
        .render(title, &render_text(input), &path)
        .await
        .map_err(|source| capability_error(node_id, source))?;

    Ok(json!({"pdf_path": written.display().to_string()}))
}

async fn agent(
    node_id: &str,
    ctx: &NodeContext<'_>,
    config: &Map<String, Value>,
    input: &Value,
) -> Result<Value, WorkflowError> {
    let agent_id = match config.get("agent_id") {
        None | Some(Value::Null) => return Err(WorkflowError::MissingAgentId(node_id.to_string())),
        Some(raw) => parse_agent_id(raw).ok_or_else(|| WorkflowError::InvalidInput {
            node: node_id.to_string(),
            message: format!("'agent_id' must be an integer, got {}", raw),
        })?,
    };

    let base = render_text(input);
    let prompt = match config_str(config, "prompt_prefix") {
        Some(prefix) => format!("{}\n\n{}", prefix, base),
        None => base,
    };

    tracing::debug!(node = %node_id, agent_id, "Running agent node");
    let outcome = ctx
        .agents
        .run_task(TaskRequest {
            agent_id,
            prompt,
            image_path: None,
        })
        .await;

    if let Some(message) = outcome.error {
        return Err(WorkflowError::AgentFailed {
            node: node_id.to_string(),
            message,
        });
    }
    Ok(Value::String(outcome.final_output))
}

fn parse_agent_id(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn config_str<'a>(config: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    config
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Text form of a node input: strings as-is, `null` as empty, anything
/// else as compact JSON.
pub(crate) fn render_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn capability_error(node_id: &str, source: anyhow::Error) -> WorkflowError {
    WorkflowError::Capability {
        node: node_id.to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_covers_table() {
        assert_eq!(NodeKind::classify("source", Some("url_input")), NodeKind::UrlInput);
        assert_eq!(NodeKind::classify("source", Some("schedule")), NodeKind::Schedule);
        assert_eq!(NodeKind::classify("tool", Some("web_scraper")), NodeKind::WebScraper);
        assert_eq!(NodeKind::classify("tool", Some("email_sender")), NodeKind::EmailSender);
        assert_eq!(NodeKind::classify("tool", Some("pdf_report")), NodeKind::PdfReport);
        assert_eq!(NodeKind::classify("agent", None), NodeKind::Agent);
        assert_eq!(NodeKind::classify("output", Some("anything")), NodeKind::Output);
        assert_eq!(NodeKind::classify("tool", Some("fax")), NodeKind::Passthrough);
        assert_eq!(NodeKind::classify("source", None), NodeKind::Passthrough);
    }

    #[test]
    fn test_render_text() {
        assert_eq!(render_text(&Value::Null), "");
        assert_eq!(render_text(&json!("plain")), "plain");
        assert_eq!(render_text(&json!({"a": [1, 2]})), r#"{"a":[1,2]}"#);
    }

    #[test]
    fn test_agent_id_forms() {
        assert_eq!(parse_agent_id(&json!(4)), Some(4));
        assert_eq!(parse_agent_id(&json!(" 12 ")), Some(12));
        assert_eq!(parse_agent_id(&json!("twelve")), None);
        assert_eq!(parse_agent_id(&json!(1.5)), None);
    }
}
