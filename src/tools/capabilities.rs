//! Capability seams behind the built-in tools.
//!
//! Tools normalize arguments and format observations; the actual work (PDF
//! rendering, vision inference, page fetching, SMTP) lives behind these traits
//! so the workflow executor can share it and tests can stub it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Config;
use crate::llm::LlmClient;

use super::{HttpWebExtractor, LlmVisionAnalyzer, PdfRenderer, SmtpMailer};

#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    /// Write a report to `path` and return where it ended up.
    async fn render(&self, title: &str, content: &str, path: &Path) -> anyhow::Result<PathBuf>;
}

#[async_trait]
pub trait ImageAnalyzer: Send + Sync {
    async fn analyze(
        &self,
        image_path: &Path,
        prompt: Option<&str>,
        model_hint: Option<&str>,
    ) -> anyhow::Result<String>;
}

#[async_trait]
pub trait WebExtractor: Send + Sync {
    /// Fetch `url` and return its readable text.
    async fn extract(&self, url: &str) -> anyhow::Result<String>;
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &[String], subject: &str, body: &str) -> anyhow::Result<()>;
}

/// The concrete capabilities shared by tools and workflow nodes.
#[derive(Clone)]
pub struct Capabilities {
    pub documents: Arc<dyn DocumentRenderer>,
    pub vision: Arc<dyn ImageAnalyzer>,
    pub web: Arc<dyn WebExtractor>,
    pub mail: Arc<dyn Mailer>,
}

impl Capabilities {
    /// Build the default implementations from configuration.
    pub fn from_config(config: &Config, llm: Arc<dyn LlmClient>) -> anyhow::Result<Self> {
        Ok(Self {
            documents: Arc::new(PdfRenderer::new(config.pdf_font_path.clone())),
            vision: Arc::new(LlmVisionAnalyzer::new(llm, config.vision_model.clone())),
            web: Arc::new(HttpWebExtractor::new(config.scraper_timeout)?),
            mail: Arc::new(SmtpMailer::new(config.smtp.clone())),
        })
    }
}
