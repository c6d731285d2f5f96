//! Tool registry and invoker.
//!
//! Every tool call coming out of the model goes through [`ToolRegistry::invoke`],
//! which never fails: argument problems, unknown names and capability errors all
//! come back as an `ERROR...` observation the model can react to.

mod capabilities;
mod document;
mod mail;
mod vision;
mod web;

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::llm::ToolSchema;

pub use capabilities::{Capabilities, DocumentRenderer, ImageAnalyzer, Mailer, WebExtractor};
pub use document::{sanitize_filename, PdfRenderer, PdfReportTool, DEFAULT_REPORT_TITLE};
pub use mail::{recipients_from_value, SendEmail, SmtpMailer, DEFAULT_SUBJECT};
pub use vision::{resolve_upload_path, AnalyzeImage, LlmVisionAnalyzer};
pub use web::{extract_text_from_html, validate_url, HttpWebExtractor, WebScraperTool, PREVIEW_CHARS};

/// Alternate names models (and stored agent configs) use for the built-in tools.
const TOOL_ALIASES: &[(&str, &str)] = &[
    ("pdf_report_tool", "generate_pdf_report"),
    ("pdf_tool", "generate_pdf_report"),
    ("scraper_tool", "web_scraper_tool"),
    ("web_scraper", "web_scraper_tool"),
    ("vision_analysis_tool", "analyze_image"),
    ("vision_tool", "analyze_image"),
    ("mail_tool", "send_email"),
    ("email_sender", "send_email"),
];

/// Map an alias to its canonical tool name; unknown names pass through.
pub fn resolve_tool_name(name: &str) -> &str {
    TOOL_ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(name)
}

/// Failure raised inside a single tool.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Missing or unusable argument; rendered as `ERROR: <message>`.
    #[error("{0}")]
    InvalidArguments(String),

    /// The capability itself failed (network, file system, SMTP...).
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl ToolError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArguments(message.into())
    }
}

/// Successful result of a tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub observation: String,
    /// Side artifact such as a generated document.
    pub artifact: Option<PathBuf>,
}

impl ToolOutput {
    pub fn text(observation: impl Into<String>) -> Self {
        Self {
            observation: observation.into(),
            artifact: None,
        }
    }

    pub fn with_artifact(observation: impl Into<String>, artifact: PathBuf) -> Self {
        Self {
            observation: observation.into(),
            artifact: Some(artifact),
        }
    }
}

/// Why an invocation produced no output. `Display` is the observation text.
#[derive(Debug)]
pub enum InvokeError {
    UnparsableArguments,
    UnknownTool(String),
    InvalidArguments(String),
    Failed { tool: String, source: anyhow::Error },
}

impl fmt::Display for InvokeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnparsableArguments => {
                write!(f, "ERROR: tool arguments could not be parsed as JSON.")
            }
            Self::UnknownTool(name) => write!(f, "ERROR: unknown tool '{}'.", name),
            Self::InvalidArguments(message) => write!(f, "ERROR: {}", message),
            Self::Failed { tool, source } => {
                write!(f, "ERROR while executing '{}': {:#}", tool, source)
            }
        }
    }
}

impl std::error::Error for InvokeError {}

/// What the reasoning loop feeds back to the model after a tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub text: String,
    pub artifact: Option<PathBuf>,
}

impl From<Result<ToolOutput, InvokeError>> for Observation {
    fn from(result: Result<ToolOutput, InvokeError>) -> Self {
        match result {
            Ok(output) => Self {
                text: output.observation,
                artifact: output.artifact,
            },
            Err(e) => Self {
                text: e.to_string(),
                artifact: None,
            },
        }
    }
}

/// A callable capability exposed to the model.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Canonical name, as advertised in the schema.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema of the arguments object.
    fn parameters_schema(&self) -> Value;

    /// Execute with already-parsed arguments. `model_hint` is the agent's
    /// configured model, if any.
    async fn execute(
        &self,
        args: &Map<String, Value>,
        model_hint: Option<&str>,
    ) -> Result<ToolOutput, ToolError>;

    fn schema(&self) -> ToolSchema {
        ToolSchema::function(self.name(), self.description(), self.parameters_schema())
    }
}

/// Where tools may read and write on disk.
#[derive(Debug, Clone)]
pub struct ToolPaths {
    pub reports_dir: PathBuf,
    pub uploads_dir: PathBuf,
}

/// Registry of available tools.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create the registry with the four built-in tools.
    pub fn new(capabilities: &Capabilities, paths: &ToolPaths) -> Self {
        let mut registry = Self {
            tools: HashMap::new(),
        };

        registry.register(Arc::new(PdfReportTool::new(
            capabilities.documents.clone(),
            paths.reports_dir.clone(),
        )));
        registry.register(Arc::new(AnalyzeImage::new(
            capabilities.vision.clone(),
            paths.uploads_dir.clone(),
        )));
        registry.register(Arc::new(WebScraperTool::new(capabilities.web.clone())));
        registry.register(Arc::new(SendEmail::new(capabilities.mail.clone())));

        registry
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Look up a tool by name or alias.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(resolve_tool_name(name))
    }

    /// Schemas for the given tool names, in the given order, deduplicated.
    /// Names that resolve to no tool are skipped.
    pub fn schemas_for(&self, names: &[String]) -> Vec<ToolSchema> {
        let mut seen = Vec::new();
        let mut schemas = Vec::new();
        for name in names {
            if let Some(tool) = self.get(name) {
                if !seen.contains(&tool.name()) {
                    seen.push(tool.name());
                    schemas.push(tool.schema());
                }
            }
        }
        schemas
    }

    /// Run a tool call, keeping the success/failure distinction.
    pub async fn execute(
        &self,
        tool_name: &str,
        arguments_json: &str,
        model_hint: Option<&str>,
    ) -> Result<ToolOutput, InvokeError> {
        let args = parse_arguments(arguments_json)?;

        let Some(tool) = self.get(tool_name) else {
            return Err(InvokeError::UnknownTool(tool_name.to_string()));
        };

        tool.execute(&args, model_hint).await.map_err(|e| match e {
            ToolError::InvalidArguments(message) => InvokeError::InvalidArguments(message),
            ToolError::Failed(source) => InvokeError::Failed {
                tool: tool.name().to_string(),
                source,
            },
        })
    }

    /// Run a tool call and always produce an observation.
    pub async fn invoke(
        &self,
        tool_name: &str,
        arguments_json: &str,
        model_hint: Option<&str>,
    ) -> Observation {
        let result = self.execute(tool_name, arguments_json, model_hint).await;
        if let Err(e) = &result {
            tracing::warn!(tool = %tool_name, "Tool call failed: {}", e);
        }
        Observation::from(result)
    }
}

fn parse_arguments(arguments_json: &str) -> Result<Map<String, Value>, InvokeError> {
    if arguments_json.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(arguments_json) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Map::new()),
        Ok(_) => Err(InvokeError::InvalidArguments(
            "tool arguments must be a JSON object.".to_string(),
        )),
        Err(_) => Err(InvokeError::UnparsableArguments),
    }
}

/// First non-empty string among `keys`.
pub(crate) fn string_arg<'a>(args: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| args.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubCapabilities;

    fn registry(stubs: &StubCapabilities, dir: &std::path::Path) -> ToolRegistry {
        ToolRegistry::new(
            &stubs.capabilities(),
            &ToolPaths {
                reports_dir: dir.join("reports"),
                uploads_dir: dir.join("uploads"),
            },
        )
    }

    #[test]
    fn test_aliases_resolve_to_canonical_names() {
        assert_eq!(resolve_tool_name("pdf_tool"), "generate_pdf_report");
        assert_eq!(resolve_tool_name("pdf_report_tool"), "generate_pdf_report");
        assert_eq!(resolve_tool_name("web_scraper"), "web_scraper_tool");
        assert_eq!(resolve_tool_name("vision_analysis_tool"), "analyze_image");
        assert_eq!(resolve_tool_name("send_email"), "send_email");
        assert_eq!(resolve_tool_name("something_else"), "something_else");
    }

    #[tokio::test]
    async fn test_unknown_tool_observation() {
        let dir = tempfile::tempdir().unwrap();
        let stubs = StubCapabilities::default();
        let obs = registry(&stubs, dir.path())
            .invoke("bash_tool", "{}", None)
            .await;
        assert_eq!(obs.text, "ERROR: unknown tool 'bash_tool'.");
        assert!(obs.artifact.is_none());
    }

    #[tokio::test]
    async fn test_malformed_arguments_never_raise() {
        let dir = tempfile::tempdir().unwrap();
        let stubs = StubCapabilities::default();
        let tools = registry(&stubs, dir.path());

        let cases = [
            ("web_scraper_tool", "{not json"),
            ("web_scraper_tool", "[1, 2]"),
            ("web_scraper_tool", "{}"),
            ("send_email", r#"{"to": []}"#),
            ("send_email", r#"{"to": 7, "subject": "s"}"#),
            ("analyze_image", r#"{"prompt": "what is it"}"#),
            ("generate_pdf_report", r#"{"title": "t"}"#),
            ("pdf_tool", "\"just a string\""),
        ];
        for (name, args) in cases {
            let obs = tools.invoke(name, args, None).await;
            assert!(obs.text.starts_with("ERROR:"), "{name} {args} -> {}", obs.text);
            assert!(obs.artifact.is_none());
        }
        assert!(stubs.sent_mail().is_empty());
        assert!(stubs.fetched_urls().is_empty());
    }

    #[tokio::test]
    async fn test_capability_failure_is_prefixed_with_tool_name() {
        let dir = tempfile::tempdir().unwrap();
        let stubs = StubCapabilities::default();
        stubs.fail_web("connection refused");
        let obs = registry(&stubs, dir.path())
            .invoke("scraper_tool", r#"{"url": "https://example.com"}"#, None)
            .await;
        assert!(obs.text.starts_with("ERROR while executing 'web_scraper_tool':"));
        assert!(obs.text.contains("connection refused"));
    }

    #[tokio::test]
    async fn test_empty_arguments_are_an_empty_object() {
        let dir = tempfile::tempdir().unwrap();
        let stubs = StubCapabilities::default();
        let err = registry(&stubs, dir.path())
            .execute("send_email", "", None)
            .await
            .unwrap_err();
        assert!(matches!(err, InvokeError::InvalidArguments(_)));
    }

    #[test]
    fn test_schemas_follow_declared_order_and_dedupe() {
        let dir = tempfile::tempdir().unwrap();
        let stubs = StubCapabilities::default();
        let tools = registry(&stubs, dir.path());
        let names = vec![
            "send_email".to_string(),
            "pdf_tool".to_string(),
            "pdf_report_tool".to_string(),
            "nonexistent".to_string(),
        ];
        let schemas = tools.schemas_for(&names);
        let names: Vec<_> = schemas.iter().map(|s| s.function.name.as_str()).collect();
        assert_eq!(names, vec!["send_email", "generate_pdf_report"]);
    }

    #[test]
    fn test_string_arg_skips_blank_values() {
        let args: Map<String, Value> =
            serde_json::from_str(r#"{"url": "  ", "target_url": "https://x.y"}"#).unwrap();
        assert_eq!(string_arg(&args, &["url", "target_url"]), Some("https://x.y"));
        assert_eq!(string_arg(&args, &["source"]), None);
    }
}
