//! Image analysis through a multimodal model.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use base64::Engine;
use serde_json::{json, Map, Value};

use crate::llm::LlmClient;

use super::{string_arg, ImageAnalyzer, Tool, ToolError, ToolOutput};

const DEFAULT_PROMPT: &str =
    "Describe this image in detail, focusing on any data, patterns, or key elements.";

/// Resolve `raw` to a file that lives inside `uploads_dir`.
///
/// Relative paths are tried against `uploads_dir` first and then against the
/// working directory. Symlinks are resolved before the containment check.
pub fn resolve_upload_path(uploads_dir: &Path, raw: &str) -> Result<PathBuf, ToolError> {
    let root = uploads_dir.canonicalize().map_err(|_| {
        ToolError::invalid(format!(
            "uploads directory '{}' does not exist.",
            uploads_dir.display()
        ))
    })?;

    let requested = Path::new(raw);
    let resolved = if requested.is_relative() {
        uploads_dir
            .join(requested)
            .canonicalize()
            .or_else(|_| requested.canonicalize())
    } else {
        requested.canonicalize()
    }
    .map_err(|_| ToolError::invalid(format!("image not found at '{}'.", raw)))?;

    if !resolved.starts_with(&root) {
        return Err(ToolError::invalid(
            "image path is not within the allowed uploads directory.",
        ));
    }
    if !resolved.is_file() {
        return Err(ToolError::invalid(format!("'{}' is not a file.", raw)));
    }

    Ok(resolved)
}

/// Describe an uploaded image.
pub struct AnalyzeImage {
    vision: Arc<dyn ImageAnalyzer>,
    uploads_dir: PathBuf,
}

impl AnalyzeImage {
    pub fn new(vision: Arc<dyn ImageAnalyzer>, uploads_dir: PathBuf) -> Self {
        Self {
            vision,
            uploads_dir,
        }
    }
}

#[async_trait]
impl Tool for AnalyzeImage {
    fn name(&self) -> &str {
        "analyze_image"
    }

    fn description(&self) -> &str {
        "Analyze an uploaded image and return a detailed natural language description of its contents, including any data, charts, or notable visual patterns."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "image_path": {
                    "type": "string",
                    "description": "Server-side path of the uploaded image file."
                },
                "prompt": {
                    "type": "string",
                    "description": "Optional instruction for how to analyze the image (e.g. 'Summarize the chart trends')."
                }
            },
            "required": ["image_path"]
        })
    }

    async fn execute(
        &self,
        args: &Map<String, Value>,
        model_hint: Option<&str>,
    ) -> Result<ToolOutput, ToolError> {
        let raw = string_arg(args, &["image_path"])
            .ok_or_else(|| ToolError::invalid("image_path is required."))?;
        let image = resolve_upload_path(&self.uploads_dir, raw)?;
        let prompt = string_arg(args, &["prompt"]);

        let description = self.vision.analyze(&image, prompt, model_hint).await?;
        Ok(ToolOutput::text(format!(
            "Image analysis result:\n{}",
            description
        )))
    }
}

/// Sends the image inline as a base64 data URL.
pub struct LlmVisionAnalyzer {
    llm: Arc<dyn LlmClient>,
    default_model: String,
}

impl LlmVisionAnalyzer {
    pub fn new(llm: Arc<dyn LlmClient>, default_model: String) -> Self {
        Self { llm, default_model }
    }
}

#[async_trait]
impl ImageAnalyzer for LlmVisionAnalyzer {
    async fn analyze(
        &self,
        image_path: &Path,
        prompt: Option<&str>,
        model_hint: Option<&str>,
    ) -> anyhow::Result<String> {
        let bytes = tokio::fs::read(image_path)
            .await
            .with_context(|| format!("cannot read {}", image_path.display()))?;
        let data_url = image_data_url(image_path, &bytes);
        let model = model_hint.unwrap_or(&self.default_model);

        tracing::debug!(model = %model, image = %image_path.display(), "Analyzing image");

        let description = self
            .llm
            .describe_image(model, prompt.unwrap_or(DEFAULT_PROMPT), &data_url)
            .await?;
        Ok(description)
    }
}

fn image_data_url(path: &Path, bytes: &[u8]) -> String {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| "png".to_string());
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:image/{};base64,{}", ext, encoded)
}
