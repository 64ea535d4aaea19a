//! Budget-checked, rate-limited completion calls.
//!
//! [`CompletionClient`] is the only way the pipeline talks to a model. For
//! every request it:
//! 1. counts the prompt's tokens,
//! 2. sets `max_tokens` to the headroom left under the model ceiling (or a
//!    smaller cap), refusing prompts that leave none,
//! 3. waits for a rate limiter slot,
//! 4. calls the backend and rejects empty output.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::client::ChatMessage;
use crate::config::{DecodingParams, ModelConfig};
use crate::error::{Result, SummaryError};
use crate::rate_limit::RateLimiter;
use crate::tokenizer::Tokenizer;

/// Framing billed around every chat message (`<|im_start|>{role}\n ... <|im_end|>\n`).
pub const TOKENS_PER_MESSAGE: usize = 4;

/// Tokens billed for priming the reply (`<|im_start|>assistant\n`).
pub const REPLY_PRIMING_TOKENS: usize = 3;

/// Tokens a chat backend bills for `messages`: content, role and framing
/// of each message, plus the reply priming.
pub fn count_prompt_tokens(tokenizer: &dyn Tokenizer, messages: &[ChatMessage]) -> usize {
    let body: usize = messages
        .iter()
        .map(|m| {
            TOKENS_PER_MESSAGE + tokenizer.count_tokens(&m.role) + tokenizer.count_tokens(&m.content)
        })
        .sum();
    body + REPLY_PRIMING_TOKENS
}

/// Fully resolved request handed to a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Model identifier.
    pub model: String,
    /// Conversation messages.
    pub messages: Vec<ChatMessage>,
    /// Sampling parameters.
    pub params: DecodingParams,
    /// Output tokens requested; `prompt_tokens + max_tokens` never exceeds
    /// the model ceiling.
    pub max_tokens: usize,
    /// Tokens billed for `messages`, framing included.
    pub prompt_tokens: usize,
}

/// Text-generation backend.
///
/// Returns one string per sampled candidate, in order. Empty strings are
/// allowed here; [`CompletionClient`] decides what counts as a failure.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<Vec<String>>;
}

/// Wrapper that enforces the token budget and call quota.
#[derive(Clone)]
pub struct CompletionClient {
    backend: Arc<dyn CompletionBackend>,
    tokenizer: Arc<dyn Tokenizer>,
    limiter: Arc<RateLimiter>,
    model: ModelConfig,
}

impl CompletionClient {
    /// Create a client. The limiter should be shared by every client in the
    /// process.
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        tokenizer: Arc<dyn Tokenizer>,
        limiter: Arc<RateLimiter>,
        model: ModelConfig,
    ) -> Self {
        Self {
            backend,
            tokenizer,
            limiter,
            model,
        }
    }

    /// Model configuration in use.
    pub fn model(&self) -> &ModelConfig {
        &self.model
    }

    /// Tokenizer used for budget accounting.
    pub fn tokenizer(&self) -> &Arc<dyn Tokenizer> {
        &self.tokenizer
    }

    /// Build the request for `messages` without sending it.
    pub fn build_request(
        &self,
        messages: Vec<ChatMessage>,
        params: &DecodingParams,
    ) -> Result<CompletionRequest> {
        let prompt_tokens = count_prompt_tokens(self.tokenizer.as_ref(), &messages);
        let ceiling = self.model.context_window;

        if prompt_tokens >= ceiling {
            return Err(SummaryError::PromptTooLarge {
                prompt_tokens,
                ceiling,
            });
        }

        let headroom = ceiling - prompt_tokens;
        let max_tokens = params.max_output_tokens.map_or(headroom, |cap| cap.min(headroom));
        if max_tokens == 0 {
            return Err(SummaryError::InvalidConfig("output cap of zero tokens".into()));
        }

        Ok(CompletionRequest {
            model: self.model.model.clone(),
            messages,
            params: params.clone(),
            max_tokens,
            prompt_tokens,
        })
    }

    /// Complete a single user prompt.
    pub async fn complete(&self, prompt: &str, params: &DecodingParams) -> Result<String> {
        self.complete_messages(vec![ChatMessage::user(prompt)], params)
            .await
    }

    /// Complete a conversation, returning the first candidate.
    pub async fn complete_messages(
        &self,
        messages: Vec<ChatMessage>,
        params: &DecodingParams,
    ) -> Result<String> {
        let candidates = self.send(messages, params).await?;
        candidates
            .into_iter()
            .next()
            .ok_or(SummaryError::EmptyCompletion)
    }

    /// Sample `n` candidates in one request and keep the one `pick` prefers.
    ///
    /// `pick` receives the non-empty candidates and returns an index into
    /// that slice.
    pub async fn complete_best_of<F>(
        &self,
        prompt: &str,
        params: &DecodingParams,
        n: u32,
        pick: F,
    ) -> Result<String>
    where
        F: FnOnce(&[String]) -> usize,
    {
        let params = params.clone().with_candidates(n);
        let mut candidates = self.send(vec![ChatMessage::user(prompt)], &params).await?;
        let chosen = pick(&candidates).min(candidates.len() - 1);
        debug!(candidates = candidates.len(), chosen, "Picked best candidate");
        Ok(candidates.swap_remove(chosen))
    }

    /// Send and return the non-empty, trimmed candidates (at least one).
    async fn send(
        &self,
        messages: Vec<ChatMessage>,
        params: &DecodingParams,
    ) -> Result<Vec<String>> {
        let request = self.build_request(messages, params)?;
        debug!(
            model = %request.model,
            prompt_tokens = request.prompt_tokens,
            max_tokens = request.max_tokens,
            n = request.params.n,
            "Completion request built"
        );

        self.limiter.acquire(&self.model.model).await?;

        let candidates: Vec<String> = self
            .backend
            .complete(&request)
            .await?
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();

        if candidates.is_empty() {
            return Err(SummaryError::EmptyCompletion);
        }
        Ok(candidates)
    }
}
