//! Web content extraction: fetch a page and reduce it to readable text.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::{string_arg, Tool, ToolError, ToolOutput, WebExtractor};

/// Observations carry at most this many characters of page text.
pub const PREVIEW_CHARS: usize = 3000;

const USER_AGENT: &str = "AgentFlowLocalScraper/1.0";

/// Fetch a web page for the model.
pub struct WebScraperTool {
    web: Arc<dyn WebExtractor>,
}

impl WebScraperTool {
    pub fn new(web: Arc<dyn WebExtractor>) -> Self {
        Self { web }
    }
}

#[async_trait]
impl Tool for WebScraperTool {
    fn name(&self) -> &str {
        "web_scraper_tool"
    }

    fn description(&self) -> &str {
        "Fetch a web page and return the main textual content for further analysis."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The HTTP/HTTPS URL to scrape."
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(
        &self,
        args: &Map<String, Value>,
        _model_hint: Option<&str>,
    ) -> Result<ToolOutput, ToolError> {
        let url = string_arg(args, &["url", "target_url", "source"])
            .ok_or_else(|| ToolError::invalid("'url' is required for web scraping."))?;
        validate_url(url)?;

        let text = self.web.extract(url).await?;
        let preview: String = text.chars().take(PREVIEW_CHARS).collect();

        Ok(ToolOutput::text(format!(
            "Scraped content from {}:\n{}",
            url, preview
        )))
    }
}

/// Only absolute http(s) URLs may be fetched.
pub fn validate_url(raw: &str) -> Result<(), ToolError> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| ToolError::invalid(format!("'{}' is not a valid URL: {}", raw, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ToolError::invalid(format!(
            "unsupported URL scheme '{}'; only http and https can be scraped.",
            other
        ))),
    }
}

/// Default extractor backed by `reqwest`.
pub struct HttpWebExtractor {
    client: reqwest::Client,
}

impl HttpWebExtractor {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebExtractor for HttpWebExtractor {
    async fn extract(&self, url: &str) -> anyhow::Result<String> {
        tracing::debug!("Fetching {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(anyhow::anyhow!("HTTP error: {}", status));
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .unwrap_or_default();

        let body = response.text().await?;

        if content_type.is_empty() || content_type.contains("html") {
            Ok(extract_text_from_html(&body))
        } else {
            Ok(collapse_lines(&body))
        }
    }
}

/// Extract readable text from HTML.
///
/// Prefers the `<main>` element, then `<article>`, then `<body>`. Script,
/// style and noscript blocks are dropped, every tag boundary becomes a line
/// break, and blank lines are removed.
pub fn extract_text_from_html(html: &str) -> String {
    let region = ["main", "article", "body"]
        .iter()
        .find_map(|tag| element_inner(html, tag))
        .unwrap_or(html);

    let mut text = region.to_string();
    for tag in ["script", "style", "noscript"] {
        text = strip_blocks(&text, tag);
    }

    let mut result = String::new();
    let mut in_tag = false;

    for c in text.chars() {
        if c == '<' {
            in_tag = true;
        } else if c == '>' {
            in_tag = false;
            result.push('\n');
        } else if !in_tag {
            result.push(c);
        }
    }

    collapse_lines(&html_decode(&result))
}

/// Trim every line, squeeze inner whitespace, drop empty lines.
fn collapse_lines(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Inner HTML of the first `<tag ...>` element, if present.
fn element_inner<'a>(html: &'a str, tag: &str) -> Option<&'a str> {
    let lower = html.to_ascii_lowercase();
    let start = find_open_tag(&lower, tag, 0)?;
    let open_end = start + lower[start..].find('>')? + 1;
    let close = lower[open_end..]
        .find(&format!("</{}", tag))
        .map(|i| open_end + i)
        .unwrap_or(html.len());
    Some(&html[open_end..close])
}

/// Byte offset of `<tag` followed by `>`, `/` or whitespace.
fn find_open_tag(lower: &str, tag: &str, from: usize) -> Option<usize> {
    let needle = format!("<{}", tag);
    let mut offset = from;
    while let Some(i) = lower[offset..].find(&needle) {
        let at = offset + i;
        let next = lower[at + needle.len()..].chars().next();
        if matches!(next, Some(c) if c == '>' || c == '/' || c.is_whitespace()) {
            return Some(at);
        }
        offset = at + needle.len();
    }
    None
}

/// Remove every `<tag ...>...</tag>` block.
fn strip_blocks(html: &str, tag: &str) -> String {
    let mut text = html.to_string();
    let close = format!("</{}>", tag);

    loop {
        let lower = text.to_ascii_lowercase();
        let Some(start) = find_open_tag(&lower, tag, 0) else {
            break;
        };
        match lower[start..].find(&close) {
            Some(end) => {
                text = format!("{}{}", &text[..start], &text[start + end + close.len()..]);
            }
            None => {
                text.truncate(start);
                break;
            }
        }
    }

    text
}

/// Basic HTML entity decoding.
fn html_decode(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
