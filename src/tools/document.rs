//! Report generation: render text into a PDF under the reports directory.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};
use serde_json::{json, Map, Value};

use super::{string_arg, DocumentRenderer, Tool, ToolError, ToolOutput};

pub const DEFAULT_REPORT_TITLE: &str = "AI Research Report";
const DEFAULT_FILENAME: &str = "report.pdf";

// A4 portrait, millimetres.
const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 15.0;
const LINE_HEIGHT: f32 = 6.0;
const CHARS_PER_LINE: usize = 90;

/// Reduce a caller-supplied filename to its final path component.
///
/// Separators of either style are honored so `..\\..\\x.pdf` and
/// `/etc/x.pdf` both become `x.pdf`. Empty or dot-only names fall back to
/// `default`.
pub fn sanitize_filename(raw: &str, default: &str) -> String {
    let normalized = raw.trim().replace('\\', "/");
    Path::new(&normalized)
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .unwrap_or(default)
        .to_string()
}

/// Create a PDF report from text the model has gathered.
pub struct PdfReportTool {
    documents: Arc<dyn DocumentRenderer>,
    reports_dir: PathBuf,
}

impl PdfReportTool {
    pub fn new(documents: Arc<dyn DocumentRenderer>, reports_dir: PathBuf) -> Self {
        Self {
            documents,
            reports_dir,
        }
    }
}

#[async_trait]
impl Tool for PdfReportTool {
    fn name(&self) -> &str {
        "generate_pdf_report"
    }

    fn description(&self) -> &str {
        "Generate a professional AI research PDF report with a header, body text, and footer containing a timestamp. Use this to create human-readable summaries of your analysis or research."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "title": {
                    "type": "string",
                    "description": "Title of the report content section (shown inside the PDF)."
                },
                "content": {
                    "type": "string",
                    "description": "Main body of the report. Plain text, may contain multiple paragraphs."
                },
                "filename": {
                    "type": "string",
                    "description": "Output PDF file name (e.g. 'analysis.pdf'). Directories are ignored."
                }
            },
            "required": ["title", "content", "filename"]
        })
    }

    async fn execute(
        &self,
        args: &Map<String, Value>,
        _model_hint: Option<&str>,
    ) -> Result<ToolOutput, ToolError> {
        let content = string_arg(args, &["content"])
            .ok_or_else(|| ToolError::invalid("'content' is required to generate a report."))?;
        let title = string_arg(args, &["title"]).unwrap_or(DEFAULT_REPORT_TITLE);
        let filename = sanitize_filename(
            string_arg(args, &["filename"]).unwrap_or(DEFAULT_FILENAME),
            DEFAULT_FILENAME,
        );

        let path = self
            .documents
            .render(title, content, &self.reports_dir.join(filename))
            .await?;

        Ok(ToolOutput::with_artifact(
            format!("SUCCESS: PDF saved to '{}'.", path.display()),
            path,
        ))
    }
}

/// Renders A4 reports with `printpdf`.
pub struct PdfRenderer {
    font_path: Option<PathBuf>,
}

impl PdfRenderer {
    /// `font_path` is an optional TTF file; without it the builtin Helvetica
    /// faces are used, which only cover Latin-1.
    pub fn new(font_path: Option<PathBuf>) -> Self {
        Self { font_path }
    }
}

#[async_trait]
impl DocumentRenderer for PdfRenderer {
    async fn render(&self, title: &str, content: &str, path: &Path) -> anyhow::Result<PathBuf> {
        let title = title.to_string();
        let content = content.to_string();
        let path = path.to_path_buf();
        let font_path = self.font_path.clone().filter(|p| p.exists());

        tokio::task::spawn_blocking(move || write_report(&title, &content, &path, font_path.as_deref()))
            .await
            .context("report rendering task panicked")?
    }
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

fn load_fonts(doc: &PdfDocumentReference, font_path: Option<&Path>) -> anyhow::Result<Fonts> {
    if let Some(path) = font_path {
        let file = File::open(path)
            .with_context(|| format!("cannot open font {}", path.display()))?;
        let font = doc.add_external_font(file)?;
        return Ok(Fonts {
            regular: font.clone(),
            bold: font,
        });
    }
    Ok(Fonts {
        regular: doc.add_builtin_font(BuiltinFont::Helvetica)?,
        bold: doc.add_builtin_font(BuiltinFont::HelveticaBold)?,
    })
}

fn write_report(
    title: &str,
    content: &str,
    path: &Path,
    font_path: Option<&Path>,
) -> anyhow::Result<PathBuf> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }

    let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
    let fonts = load_fonts(&doc, font_path)?;
    let generated = format!(
        "Generated: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );

    let mut layer_ref = doc.get_page(page).get_layer(layer);
    let mut y = decorate_page(&layer_ref, &fonts, DEFAULT_REPORT_TITLE, &generated);

    layer_ref.use_text(title, 16.0, Mm(MARGIN), Mm(y), &fonts.bold);
    y -= LINE_HEIGHT * 2.0;

    for line in wrap_text(content, CHARS_PER_LINE) {
        if y < MARGIN + LINE_HEIGHT * 2.0 {
            let (page, layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
            layer_ref = doc.get_page(page).get_layer(layer);
            y = decorate_page(&layer_ref, &fonts, DEFAULT_REPORT_TITLE, &generated);
        }
        layer_ref.use_text(line, 12.0, Mm(MARGIN), Mm(y), &fonts.regular);
        y -= LINE_HEIGHT;
    }

    let file = File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
    doc.save(&mut BufWriter::new(file))?;

    Ok(path.canonicalize().unwrap_or_else(|_| path.to_path_buf()))
}

/// Header and footer; returns the first usable baseline.
fn decorate_page(layer: &PdfLayerReference, fonts: &Fonts, header: &str, footer: &str) -> f32 {
    layer.use_text(header, 14.0, Mm(MARGIN), Mm(PAGE_HEIGHT - MARGIN), &fonts.bold);
    layer.use_text(footer, 8.0, Mm(MARGIN), Mm(MARGIN / 2.0), &fonts.regular);
    PAGE_HEIGHT - MARGIN - LINE_HEIGHT * 2.5
}

/// Greedy word wrap; words longer than `width` are split.
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > width {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                lines.push(word.drain(..width).collect());
            }
            let word: String = word.into_iter().collect();
            if word.is_empty() {
                continue;
            }
            if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > width {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&word);
        }
        lines.push(current);
    }

    lines
}
