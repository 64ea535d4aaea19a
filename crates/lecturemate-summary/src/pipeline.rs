//! Chunked map-then-format summarization.
//!
//! The transcript is tokenized and cut into chunks that leave room for their
//! own summary inside the token budget. Each chunk then goes through two
//! sequential, rate-limited completions:
//!
//! 1. condense the chunk to `round(chunk_tokens * ratio)` words,
//! 2. format the condensed text as markdown.
//!
//! Only the first segment may carry a level 1 heading, so the concatenated
//! document has a single title.

use std::sync::Arc;

use tracing::{debug, info};

use crate::chunker::{max_chunk_size, plan_chunks, Chunk};
use crate::completion::CompletionClient;
use crate::config::{DecodingParams, SummaryConfig};
use crate::error::{Result, Step, SummaryError};
use crate::prompts::{markdown_prompt, summary_prompt};
use crate::tokenizer::Tokenizer;

/// Markdown produced for one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummarySegment {
    /// 0-based chunk position.
    pub index: usize,
    /// Whether the segment was allowed a document title.
    pub is_first: bool,
    /// Formatted markdown.
    pub markdown: String,
}

/// Ordered segments of a chunked summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkedSummary {
    pub segments: Vec<SummarySegment>,
}

impl ChunkedSummary {
    /// Full document: segments in chunk order, separated by blank lines.
    pub fn to_markdown(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.markdown.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether no segment was produced.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Chunk plan for a transcript, computed without calling the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    /// Tokens in the transcript.
    pub total_tokens: usize,
    /// Largest allowed chunk.
    pub max_chunk_size: usize,
    /// Planned chunks.
    pub chunks: Vec<Chunk>,
}

/// Map-then-format summarizer.
pub struct ChunkedSummarizer {
    client: CompletionClient,
    config: SummaryConfig,
    params: DecodingParams,
}

impl ChunkedSummarizer {
    /// Create a summarizer; rejects invalid sizing parameters.
    pub fn new(client: CompletionClient, config: SummaryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client,
            config,
            params: DecodingParams::deterministic(),
        })
    }

    /// Override the sampling parameters used for both calls.
    pub fn with_params(mut self, params: DecodingParams) -> Self {
        self.params = params;
        self
    }

    fn tokenizer(&self) -> &Arc<dyn Tokenizer> {
        self.client.tokenizer()
    }

    /// Plan the chunks of `transcript`.
    pub fn plan(&self, transcript: &str) -> Result<ChunkPlan> {
        let total_tokens = self.tokenizer().count_tokens(transcript);
        let max = max_chunk_size(self.config.token_budget, self.config.compression_ratio)?;
        let chunks = plan_chunks(total_tokens, max, self.config.compression_ratio)?;
        Ok(ChunkPlan {
            total_tokens,
            max_chunk_size: max,
            chunks,
        })
    }

    /// Summarize `transcript` into one markdown segment per chunk.
    ///
    /// Any failure aborts the whole run; partial output is never returned.
    pub async fn summarize(&self, transcript: &str) -> Result<ChunkedSummary> {
        let tokens = self.tokenizer().encode(transcript);
        if tokens.is_empty() {
            return Err(SummaryError::EmptyTranscript);
        }

        let max = max_chunk_size(self.config.token_budget, self.config.compression_ratio)?;
        let chunks = plan_chunks(tokens.len(), max, self.config.compression_ratio)?;
        let total = chunks.len();
        info!(
            tokens = tokens.len(),
            max_chunk_size = max,
            chunks = total,
            "Starting chunked summary"
        );

        let mut segments = Vec::with_capacity(total);
        for chunk in &chunks {
            let number = chunk.index + 1;
            let text = self.tokenizer().decode(&tokens[chunk.range()])?;

            let condensed = self
                .client
                .complete(&summary_prompt(chunk.target_words, &text), &self.params)
                .await
                .map_err(|e| e.at(Step::Summarize { chunk: number, total }))?;

            let markdown = self
                .client
                .complete(&markdown_prompt(&condensed, chunk.is_first()), &self.params)
                .await
                .map_err(|e| e.at(Step::Format { chunk: number, total }))?;

            debug!(
                chunk = number,
                total,
                chunk_tokens = chunk.len(),
                target_words = chunk.target_words,
                markdown_len = markdown.len(),
                "Chunk summarized"
            );

            segments.push(SummarySegment {
                index: chunk.index,
                is_first: chunk.is_first(),
                markdown,
            });
        }

        Ok(ChunkedSummary { segments })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{CompletionBackend, CompletionRequest};
    use crate::config::{ModelConfig, RateLimitConfig};
    use crate::rate_limit::{ManualClock, RateLimiter};
    use crate::tokenizer::CharTokenizer;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Labels each reply with the call number.
    struct CountingBackend {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl CompletionBackend for CountingBackend {
        async fn complete(&self, _request: &CompletionRequest) -> Result<Vec<String>> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            Ok(vec![format!("reply {}", calls)])
        }
    }

    fn summarizer(backend: Arc<CountingBackend>, budget: usize) -> ChunkedSummarizer {
        let limiter = Arc::new(RateLimiter::new(
            RateLimitConfig::new(100, Duration::from_secs(60)),
            Arc::new(ManualClock::new()),
        ));
        let client = CompletionClient::new(
            backend,
            Arc::new(CharTokenizer),
            limiter,
            ModelConfig::new("test").with_context_window(budget),
        );
        ChunkedSummarizer::new(client, SummaryConfig::default().with_token_budget(budget)).unwrap()
    }

    #[test]
    fn test_plan() {
        let backend = Arc::new(CountingBackend { calls: Mutex::new(0) });
        let summarizer = summarizer(backend, 1000);

        let plan = summarizer.plan(&"a".repeat(1500)).unwrap();
        assert_eq!(plan.total_tokens, 1500);
        assert_eq!(plan.max_chunk_size, 714);
        assert_eq!(plan.chunks.len(), 3);
    }

    #[tokio::test]
    async fn test_segments_follow_chunk_order() {
        let backend = Arc::new(CountingBackend { calls: Mutex::new(0) });
        let summarizer = summarizer(backend.clone(), 1000);

        let summary = summarizer.summarize(&"a".repeat(1500)).await.unwrap();

        assert_eq!(*backend.calls.lock().unwrap(), 6);
        assert_eq!(summary.len(), 3);
        let texts: Vec<_> = summary.segments.iter().map(|s| s.markdown.as_str()).collect();
        assert_eq!(texts, vec!["reply 2", "reply 4", "reply 6"]);
        assert_eq!(summary.to_markdown(), "reply 2\n\nreply 4\n\nreply 6");
        assert!(summary.segments[0].is_first);
        assert!(!summary.segments[1].is_first);
    }

    #[tokio::test]
    async fn test_empty_transcript_is_rejected() {
        let backend = Arc::new(CountingBackend { calls: Mutex::new(0) });
        let summarizer = summarizer(backend.clone(), 1000);

        assert!(matches!(
            summarizer.summarize("").await,
            Err(SummaryError::EmptyTranscript)
        ));
        assert_eq!(*backend.calls.lock().unwrap(), 0);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let limiter = Arc::new(RateLimiter::with_tokio_clock(RateLimitConfig::default()));
        let client = CompletionClient::new(
            Arc::new(CountingBackend { calls: Mutex::new(0) }),
            Arc::new(CharTokenizer),
            limiter,
            ModelConfig::default(),
        );
        let config = SummaryConfig::default().with_compression_ratio(2.0);
        assert!(ChunkedSummarizer::new(client, config).is_err());
    }
}
