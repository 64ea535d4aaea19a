//! Follow-up questions about a video.
//!
//! Context comes from a [`Retriever`]; the production retriever is a vector
//! store owned by the surrounding service. [`TranscriptIndex`] is a small
//! lexical retriever over a single transcript for offline use.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::chunker::plan_chunks;
use crate::client::ChatMessage;
use crate::completion::CompletionClient;
use crate::config::DecodingParams;
use crate::error::{Result, Step, SummaryError};
use crate::prompts::question_prompt;
use crate::tokenizer::Tokenizer;

/// Default number of context chunks per question.
pub const DEFAULT_TOP_K: usize = 1;

/// Default cap on answer length.
pub const DEFAULT_ANSWER_TOKENS: usize = 200;

/// Source of context passages for a question.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Up to `top_k` passages relevant to `query`, best first.
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<String>>;
}

/// Answers questions from retrieved transcript passages.
pub struct QuestionAnswerer {
    client: CompletionClient,
    retriever: Arc<dyn Retriever>,
    top_k: usize,
    params: DecodingParams,
}

impl QuestionAnswerer {
    /// Create an answerer with default retrieval depth and sampling.
    pub fn new(client: CompletionClient, retriever: Arc<dyn Retriever>) -> Self {
        Self {
            client,
            retriever,
            top_k: DEFAULT_TOP_K,
            params: DecodingParams::deterministic()
                .with_temperature(0.7)
                .with_max_output_tokens(DEFAULT_ANSWER_TOKENS),
        }
    }

    /// Set the number of passages retrieved per question.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    /// Answer `question`.
    ///
    /// Each passage is sent as its own user message, followed by the
    /// question.
    pub async fn answer(&self, question: &str) -> Result<String> {
        let passages = self.retriever.retrieve(question, self.top_k).await?;
        info!(passages = passages.len(), "Answering question");
        debug!(question, "Retrieved passages: {:?}", passages);

        let mut messages: Vec<ChatMessage> = passages.into_iter().map(ChatMessage::user).collect();
        messages.push(ChatMessage::user(question_prompt(question)));

        self.client
            .complete_messages(messages, &self.params)
            .await
            .map_err(|e| e.at(Step::Answer))
    }
}

/// In-memory lexical index over one transcript.
///
/// Passages are token-aligned chunks; scoring counts distinct query terms
/// present in a passage.
pub struct TranscriptIndex {
    passages: Vec<(String, HashSet<String>)>,
}

impl TranscriptIndex {
    /// Index `transcript` in passages of at most `passage_tokens` tokens.
    pub fn build(tokenizer: &dyn Tokenizer, transcript: &str, passage_tokens: usize) -> Result<Self> {
        let tokens = tokenizer.encode(transcript);
        let chunks = plan_chunks(tokens.len(), passage_tokens, 1.0)?;
        let passages = chunks
            .iter()
            .map(|chunk| {
                let text = tokenizer.decode(&tokens[chunk.range()])?;
                let terms = terms(&text);
                Ok((text, terms))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { passages })
    }

    /// Number of passages.
    pub fn len(&self) -> usize {
        self.passages.len()
    }

    /// Whether the index holds no passages.
    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 2)
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl Retriever for TranscriptIndex {
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<String>> {
        if self.passages.is_empty() {
            return Err(SummaryError::Retrieval("index is empty".into()));
        }

        let query_terms = terms(query);
        let mut scored: Vec<(usize, usize)> = self
            .passages
            .iter()
            .enumerate()
            .map(|(i, (_, passage_terms))| (i, query_terms.intersection(passage_terms).count()))
            .collect();

        // Highest score first; earlier passages win ties.
        scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(i, _)| self.passages[i].0.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{CompletionBackend, CompletionRequest};
    use crate::config::{ModelConfig, RateLimitConfig};
    use crate::rate_limit::{ManualClock, RateLimiter};
    use crate::tokenizer::CharTokenizer;
    use std::sync::Mutex;
    use std::time::Duration;

    struct FixedRetriever(Vec<&'static str>);

    #[async_trait]
    impl Retriever for FixedRetriever {
        async fn retrieve(&self, _query: &str, top_k: usize) -> Result<Vec<String>> {
            Ok(self.0.iter().take(top_k).map(|s| s.to_string()).collect())
        }
    }

    struct RecordingBackend {
        requests: Mutex<Vec<CompletionRequest>>,
        reply: &'static str,
    }

    #[async_trait]
    impl CompletionBackend for RecordingBackend {
        async fn complete(&self, request: &CompletionRequest) -> Result<Vec<String>> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(vec![self.reply.to_string()])
        }
    }

    fn client(backend: Arc<RecordingBackend>) -> CompletionClient {
        let limiter = Arc::new(RateLimiter::new(
            RateLimitConfig::new(10, Duration::from_secs(60)),
            Arc::new(ManualClock::new()),
        ));
        CompletionClient::new(
            backend,
            Arc::new(CharTokenizer),
            limiter,
            ModelConfig::new("test").with_context_window(4000),
        )
    }

    #[tokio::test]
    async fn test_answer_sends_passages_then_question() {
        let backend = Arc::new(RecordingBackend {
            requests: Mutex::new(Vec::new()),
            reply: "Borrowing lends access without moving.",
        });
        let retriever = Arc::new(FixedRetriever(vec!["passage one", "passage two"]));
        let answerer = QuestionAnswerer::new(client(backend.clone()), retriever).with_top_k(2);

        let answer = answerer.answer("What is borrowing?").await.unwrap();
        assert_eq!(answer, "Borrowing lends access without moving.");

        let requests = backend.requests.lock().unwrap();
        let messages = &requests[0].messages;
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].content, "passage one");
        assert_eq!(messages[1].content, "passage two");
        assert!(messages[2].content.ends_with("answer the question: What is borrowing?"));
        assert_eq!(requests[0].max_tokens, DEFAULT_ANSWER_TOKENS);
        assert_eq!(requests[0].params.temperature, 0.7);
    }

    #[tokio::test]
    async fn test_empty_answer_is_tagged() {
        let backend = Arc::new(RecordingBackend {
            requests: Mutex::new(Vec::new()),
            reply: "",
        });
        let answerer = QuestionAnswerer::new(client(backend), Arc::new(FixedRetriever(vec!["p"])));

        let err = answerer.answer("Why?").await.unwrap_err();
        assert_eq!(err.step(), Some(Step::Answer));
        assert!(matches!(err.root(), SummaryError::EmptyCompletion));
    }

    #[tokio::test]
    async fn test_transcript_index_ranks_by_overlap() {
        let transcript = "Lifetimes describe how long references live. \
                          Traits describe shared behaviour across types. \
                          Closures capture their environment by reference.";
        let index = TranscriptIndex::build(&CharTokenizer, transcript, 48).unwrap();
        assert!(index.len() >= 3);

        let hits = index.retrieve("what do traits describe about types?", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].contains("shared behaviour across types"));
    }

    #[tokio::test]
    async fn test_empty_index_fails_retrieval() {
        let index = TranscriptIndex::build(&CharTokenizer, "", 10).unwrap();
        assert!(index.is_empty());
        let err = index.retrieve("anything", 1).await.unwrap_err();
        assert!(matches!(err, SummaryError::Retrieval(_)));
    }
}
