//! Command handlers for CLI subcommands.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use lecturemate_core::{config, parse_video_id, CoreError, MetadataClient, Transcript};
use lecturemate_summary::{
    max_chunk_size, plan_chunks, ChunkedSummarizer, CompletionBackend, CompletionClient,
    DocumentRenderer, HtmlRenderer, ModelConfig, OpenAiClient, PdfRenderer, QuestionAnswerer,
    RateLimitConfig, RateLimiter, RecursiveSummarizer, RenderedDocument, SummaryConfig,
    SummaryError, TiktokenTokenizer, Tokenizer, TranscriptIndex,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::cli::{Commands, OutputFormat, Strategy};
use crate::offline::EchoBackend;

/// Errors surfaced by command handlers.
#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Summary(#[from] SummaryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for command operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// Execute a CLI command.
pub async fn execute(command: Commands, model: Option<String>) -> Result<()> {
    match command {
        Commands::Summarize {
            input,
            strategy,
            target_tokens,
            format,
            output,
            offline,
        } => {
            let client = completion_client(model, offline)?;
            let pdf = PdfRenderer::from_env();
            let doc = cmd_summarize(client, &input, strategy, target_tokens, format, &pdf).await?;
            let written = write_document(&doc, output.as_deref(), &input, format)?;
            if let Some(path) = written {
                println!("Summary written to {}", path.display());
            }
            Ok(())
        }
        Commands::Tokens { input, budget } => cmd_tokens(&input, budget),
        Commands::VideoId { url, metadata } => cmd_video_id(&url, metadata).await,
        Commands::Ask {
            input,
            question,
            top_k,
            passage_tokens,
            offline,
        } => {
            let client = completion_client(model, offline)?;
            let answer = cmd_ask(client, &input, &question, top_k, passage_tokens).await?;
            println!("{}", answer);
            Ok(())
        }
    }
}

/// Build the completion client for the API or the offline echo backend.
pub fn completion_client(model: Option<String>, offline: bool) -> Result<CompletionClient> {
    let mut model_config = ModelConfig::from_env();
    if let Some(model) = model {
        model_config.model = model;
    }

    let tokenizer: Arc<dyn Tokenizer> = Arc::new(TiktokenTokenizer::cl100k()?);

    let (backend, rate): (Arc<dyn CompletionBackend>, RateLimitConfig) = if offline {
        info!("Using offline echo backend");
        (
            Arc::new(EchoBackend),
            RateLimitConfig::new(usize::MAX, Duration::from_secs(1)),
        )
    } else {
        (
            Arc::new(OpenAiClient::from_config(&model_config)?),
            RateLimitConfig::from_env(),
        )
    };

    Ok(CompletionClient::new(
        backend,
        tokenizer,
        Arc::new(RateLimiter::with_tokio_clock(rate)),
        model_config,
    ))
}

/// Summarize a transcript file and render it.
pub async fn cmd_summarize(
    client: CompletionClient,
    input: &Path,
    strategy: Strategy,
    target_tokens: usize,
    format: OutputFormat,
    pdf: &dyn DocumentRenderer,
) -> Result<RenderedDocument> {
    let transcript = Transcript::load(input)?;
    info!(
        path = %input.display(),
        words = transcript.word_count(),
        ?strategy,
        "Summarizing transcript"
    );

    let config = SummaryConfig::from_env();
    let markdown = match strategy {
        Strategy::Chunked => {
            let summarizer = ChunkedSummarizer::new(client, config)?;
            summarizer.summarize(transcript.text()).await?.to_markdown()
        }
        Strategy::Recursive => {
            let summarizer = RecursiveSummarizer::new(client, config)?;
            let reduced = summarizer.summarize(transcript.text(), target_tokens).await?;
            info!(passes = reduced.passes, tokens = reduced.tokens, "Recursive summary ready");
            reduced.text
        }
    };

    Ok(render(&markdown, format, pdf))
}

/// Render markdown with `pdf` handling PDF output, falling back to the
/// markdown itself if rendering fails.
pub fn render(markdown: &str, format: OutputFormat, pdf: &dyn DocumentRenderer) -> RenderedDocument {
    let rendered = match format {
        OutputFormat::Markdown => return markdown_document(markdown),
        OutputFormat::Html => HtmlRenderer.render(markdown),
        OutputFormat::Pdf => pdf.render(markdown),
    };
    rendered.unwrap_or_else(|e| {
        warn!(error = %e, "Rendering failed, falling back to markdown");
        markdown_document(markdown)
    })
}

fn markdown_document(markdown: &str) -> RenderedDocument {
    RenderedDocument {
        bytes: markdown.as_bytes().to_vec(),
        media_type: "text/markdown",
        extension: "md",
    }
}

/// Write the document and return its path; text formats without an
/// explicit output go to stdout.
pub fn write_document(
    doc: &RenderedDocument,
    output: Option<&Path>,
    input: &Path,
    format: OutputFormat,
) -> Result<Option<PathBuf>> {
    let path = match output {
        Some(path) => path.to_path_buf(),
        None if doc.media_type.starts_with("text/") => {
            println!("{}", String::from_utf8_lossy(&doc.bytes));
            return Ok(None);
        }
        None => default_output_path(input, doc.extension),
    };

    if doc.extension != format.extension() {
        warn!(requested = format.extension(), written = doc.extension, "Output format changed");
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, &doc.bytes)?;
    Ok(Some(path))
}

/// `<output dir>/<input stem>_summary.<ext>`.
pub fn default_output_path(input: &Path, extension: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("transcript");
    config::output_dir().join(format!("{}_summary.{}", stem, extension))
}

/// Print token count and chunk plan.
pub fn cmd_tokens(input: &Path, budget: Option<usize>) -> Result<()> {
    let transcript = Transcript::load(input)?;
    let tokenizer = TiktokenTokenizer::cl100k()?;
    let config = SummaryConfig::from_env();
    let budget = budget.unwrap_or(config.token_budget);

    let tokens = tokenizer.count_tokens(transcript.text());
    let max = max_chunk_size(budget, config.compression_ratio)?;
    let chunks = plan_chunks(tokens, max, config.compression_ratio)?;

    println!("Words:          {}", transcript.word_count());
    println!("Tokens:         {} ({})", tokens, tokenizer.name());
    println!("Budget:         {} (ratio {})", budget, config.compression_ratio);
    println!("Max chunk size: {}", max);
    println!("Chunks:         {}", chunks.len());
    for chunk in &chunks {
        println!(
            "  {:>3}. tokens {:>6}..{:<6} target {} words",
            chunk.index + 1,
            chunk.start,
            chunk.end,
            chunk.target_words
        );
    }
    Ok(())
}

async fn cmd_video_id(url: &str, metadata: bool) -> Result<()> {
    let video_id = parse_video_id(url)?;
    println!("{}", video_id);

    if metadata {
        let meta = MetadataClient::default().fetch(&video_id).await?;
        println!("Title:  {}", meta.title);
        println!("Author: {}", meta.author);
    }
    Ok(())
}

/// Answer a question from passages of a transcript file.
pub async fn cmd_ask(
    client: CompletionClient,
    input: &Path,
    question: &str,
    top_k: usize,
    passage_tokens: usize,
) -> Result<String> {
    let transcript = Transcript::load(input)?;
    let index = TranscriptIndex::build(client.tokenizer().as_ref(), transcript.text(), passage_tokens)?;
    info!(passages = index.len(), "Transcript indexed");

    let answerer = QuestionAnswerer::new(client, Arc::new(index)).with_top_k(top_k);
    Ok(answerer.answer(question).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const LECTURE: &str = "Welcome back. Today we cover ownership in Rust. \
        Every value has a single owner, and when the owner goes out of scope the value is dropped. \
        Borrowing lets code use a value without taking ownership. \
        Mutable borrows are exclusive, shared borrows can be many.";

    fn missing_pdf() -> PdfRenderer {
        PdfRenderer::new("/nonexistent/wkhtmltopdf")
    }

    fn lecture_file(dir: &Path) -> PathBuf {
        let path = dir.join("ownership.txt");
        std::fs::write(&path, LECTURE.repeat(20)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_summarize_offline_chunked_markdown() {
        let dir = tempdir().unwrap();
        let input = lecture_file(dir.path());
        let client = completion_client(Some("offline".into()), true).unwrap();

        let doc = cmd_summarize(client, &input, Strategy::Chunked, 1000, OutputFormat::Markdown, &missing_pdf())
            .await
            .unwrap();

        assert_eq!(doc.extension, "md");
        let text = String::from_utf8(doc.bytes).unwrap();
        assert!(text.contains("ownership"));
    }

    #[tokio::test]
    async fn test_summarize_offline_recursive_html() {
        let dir = tempdir().unwrap();
        let input = lecture_file(dir.path());
        let client = completion_client(Some("offline".into()), true).unwrap();

        let doc = cmd_summarize(client, &input, Strategy::Recursive, 200, OutputFormat::Html, &missing_pdf())
            .await
            .unwrap();

        assert_eq!(doc.media_type, "text/html");
        assert!(String::from_utf8(doc.bytes).unwrap().contains("<body>"));
    }

    #[tokio::test]
    async fn test_summarize_missing_file() {
        let client = completion_client(None, true).unwrap();
        let err = cmd_summarize(
            client,
            Path::new("/nonexistent/lecture.txt"),
            Strategy::Chunked,
            1000,
            OutputFormat::Markdown,
            &missing_pdf(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CliError::Core(CoreError::Io(_))));
    }

    #[tokio::test]
    async fn test_ask_offline() {
        let dir = tempdir().unwrap();
        let input = lecture_file(dir.path());
        let client = completion_client(None, true).unwrap();

        let answer = cmd_ask(client, &input, "What does borrowing do?", 2, 100)
            .await
            .unwrap();
        assert!(answer.contains("answer the question"));
    }

    #[test]
    fn test_render_pdf_falls_back_to_markdown() {
        let doc = render("# Title", OutputFormat::Pdf, &missing_pdf());
        assert_eq!(doc.extension, "md");
        assert_eq!(doc.bytes, b"# Title");
    }

    struct FixedPdf;

    impl DocumentRenderer for FixedPdf {
        fn render(&self, _markdown: &str) -> lecturemate_summary::Result<RenderedDocument> {
            Ok(RenderedDocument {
                bytes: b"%PDF-1.4".to_vec(),
                media_type: "application/pdf",
                extension: "pdf",
            })
        }
    }

    #[test]
    fn test_render_pdf_uses_given_renderer() {
        let doc = render("# Title", OutputFormat::Pdf, &FixedPdf);
        assert_eq!(doc.extension, "pdf");
        assert_eq!(doc.bytes, b"%PDF-1.4");
    }

    #[test]
    fn test_write_document_to_file() {
        let dir = tempdir().unwrap();
        let doc = render("# Title\n\nBody", OutputFormat::Html, &missing_pdf());
        let out = dir.path().join("nested").join("summary.html");

        let written = write_document(&doc, Some(&out), Path::new("in.txt"), OutputFormat::Html)
            .unwrap();

        assert_eq!(written, Some(out.clone()));
        assert!(std::fs::read_to_string(out).unwrap().contains("<h1>Title</h1>"));
    }

    #[test]
    fn test_write_text_without_output_goes_to_stdout() {
        let doc = render("plain", OutputFormat::Markdown, &missing_pdf());
        let written =
            write_document(&doc, None, Path::new("in.txt"), OutputFormat::Markdown).unwrap();
        assert!(written.is_none());
    }

    #[test]
    fn test_default_output_path() {
        let path = default_output_path(Path::new("/tmp/lectures/week1.json"), "pdf");
        assert!(path.ends_with("week1_summary.pdf"));
    }

    #[test]
    fn test_cmd_tokens() {
        let dir = tempdir().unwrap();
        let input = lecture_file(dir.path());
        cmd_tokens(&input, Some(200)).unwrap();
    }
}
