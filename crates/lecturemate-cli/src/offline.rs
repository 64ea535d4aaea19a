//! Local echo backend for dry runs.
//!
//! Answers every request from the material embedded in the prompt, so chunk
//! planning, rate limiting and rendering can be exercised without an API key.

use async_trait::async_trait;
use lecturemate_summary::{CompletionBackend, CompletionRequest, Result};
use tracing::trace;

/// Backend that echoes prompt material back.
///
/// Summary and extend prompts get the first half of their material, so
/// recursive reduction converges. Formatting and cleanup prompts get their
/// material unchanged, once per requested candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoBackend;

/// The material a prompt wraps, and whether the prompt asks to shorten it.
fn material(prompt: &str) -> (&str, bool) {
    if let Some(content) = between(prompt, "<transcript>\n", "\n</transcript>") {
        return (content, true);
    }
    if let Some(content) = between(prompt, "<summary>\n", "\n</summary>") {
        return (content, false);
    }
    if let Some(content) = between(prompt, "\n[", "]\n") {
        return (content, !prompt.contains("markdown"));
    }
    (prompt, false)
}

fn between<'a>(text: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let (_, rest) = text.split_once(open)?;
    let (content, _) = rest.rsplit_once(close)?;
    Some(content)
}

fn first_words(text: &str, n: usize) -> String {
    text.split_whitespace().take(n).collect::<Vec<_>>().join(" ")
}

#[async_trait]
impl CompletionBackend for EchoBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<Vec<String>> {
        let prompt = request
            .messages
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        let (content, shorten) = material(prompt);

        let words = content.split_whitespace().count();
        let keep = if shorten { (words / 2).max(1) } else { words };
        let reply = first_words(content, keep.min(request.max_tokens.max(1)));
        trace!(words, keep, "Echoing prompt material");

        Ok(vec![reply; request.params.n.max(1) as usize])
    }
}
