//! Markdown to document rendering.
//!
//! Rendering never calls the model. Its failures are reported as
//! [`SummaryError::Rendering`] so callers can fall back to sending raw
//! markdown.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use pulldown_cmark::{html, Options, Parser};
use tracing::debug;

use crate::error::{Result, SummaryError};

/// Environment variable with the path of the `wkhtmltopdf` binary.
pub const WKHTMLTOPDF_ENV: &str = "LECTUREMATE_WKHTMLTOPDF";

/// Default `wkhtmltopdf` location in the deployment image.
pub const DEFAULT_WKHTMLTOPDF: &str = "/opt/bin/wkhtmltopdf";

const HTML_HEAD: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Lecture summary</title>
<style>
body { font-family: sans-serif; line-height: 1.5; max-width: 46em; margin: 2em auto; padding: 0 1em; }
h1, h2, h3 { line-height: 1.2; }
code { background: #f4f4f4; padding: 0 0.2em; }
</style>
</head>
<body>
"#;

const HTML_TAIL: &str = "</body>\n</html>\n";

/// A rendered document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    /// Document bytes.
    pub bytes: Vec<u8>,
    /// MIME type of `bytes`.
    pub media_type: &'static str,
    /// File extension without the dot.
    pub extension: &'static str,
}

/// Converts markdown into a deliverable document.
pub trait DocumentRenderer: Send + Sync {
    fn render(&self, markdown: &str) -> Result<RenderedDocument>;
}

/// Self-contained HTML page.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlRenderer;

impl HtmlRenderer {
    /// Render `markdown` to an HTML string.
    pub fn to_html(&self, markdown: &str) -> String {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);

        let mut page = String::from(HTML_HEAD);
        html::push_html(&mut page, Parser::new_ext(markdown, options));
        page.push_str(HTML_TAIL);
        page
    }
}

impl DocumentRenderer for HtmlRenderer {
    fn render(&self, markdown: &str) -> Result<RenderedDocument> {
        Ok(RenderedDocument {
            bytes: self.to_html(markdown).into_bytes(),
            media_type: "text/html",
            extension: "html",
        })
    }
}

/// PDF through an external `wkhtmltopdf` process.
#[derive(Debug, Clone)]
pub struct PdfRenderer {
    binary: PathBuf,
    html: HtmlRenderer,
}

impl Default for PdfRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_WKHTMLTOPDF)
    }
}

impl PdfRenderer {
    /// Use the given `wkhtmltopdf` binary.
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            html: HtmlRenderer,
        }
    }

    /// Binary from `LECTUREMATE_WKHTMLTOPDF`, else the default path.
    pub fn from_env() -> Self {
        std::env::var(WKHTMLTOPDF_ENV)
            .map(Self::new)
            .unwrap_or_default()
    }
}

impl DocumentRenderer for PdfRenderer {
    fn render(&self, markdown: &str) -> Result<RenderedDocument> {
        let page = self.html.to_html(markdown);

        let mut child = Command::new(&self.binary)
            .args(["--quiet", "--encoding", "utf-8", "-", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                SummaryError::Rendering(format!("failed to start {}: {}", self.binary.display(), e))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(page.as_bytes()) {
                drop(stdin);
                let _ = child.kill();
                let _ = child.wait();
                return Err(SummaryError::Rendering(format!("failed to write HTML: {}", e)));
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|e| SummaryError::Rendering(format!("wkhtmltopdf failed: {}", e)))?;

        if !output.status.success() {
            return Err(SummaryError::Rendering(format!(
                "wkhtmltopdf exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        if output.stdout.is_empty() {
            return Err(SummaryError::Rendering("wkhtmltopdf produced no output".into()));
        }

        debug!(bytes = output.stdout.len(), "PDF rendered");
        Ok(RenderedDocument {
            bytes: output.stdout,
            media_type: "application/pdf",
            extension: "pdf",
        })
    }
}
