//! Token-budgeted transcript summarization for LectureMate.
//!
//! This crate turns a video transcript of any length into a summary while
//! keeping every model request inside the model's context window and under
//! a process-wide call quota.
//!
//! # Overview
//!
//! - [`ChunkedSummarizer`]: cut the transcript into token-aligned chunks,
//!   condense each, format each as markdown, concatenate. This is the
//!   primary strategy.
//! - [`RecursiveSummarizer`]: extend a running summary chunk by chunk and
//!   repeat on the result until it fits a token target, then clean up.
//! - [`QuestionAnswerer`]: answer follow-up questions from retrieved
//!   passages.
//!
//! # Core Types
//!
//! - [`Tokenizer`]: token counting and slicing
//! - [`RateLimiter`]: sliding-window call quota with an injectable [`Clock`]
//! - [`CompletionClient`]: budget-checked, rate-limited completion calls over
//!   a [`CompletionBackend`] such as [`OpenAiClient`]
//! - [`DocumentRenderer`]: markdown to HTML or PDF
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use lecturemate_summary::*;
//!
//! let model = ModelConfig::from_env();
//! let backend = Arc::new(OpenAiClient::from_config(&model)?);
//! let tokenizer = Arc::new(TiktokenTokenizer::cl100k()?);
//! let limiter = Arc::new(RateLimiter::with_tokio_clock(RateLimitConfig::from_env()));
//! let client = CompletionClient::new(backend, tokenizer, limiter, model);
//!
//! let summarizer = ChunkedSummarizer::new(client, SummaryConfig::from_env())?;
//! let summary = summarizer.summarize(&transcript).await?;
//! let pdf = PdfRenderer::from_env().render(&summary.to_markdown())?;
//! ```

pub mod chunker;
pub mod client;
pub mod completion;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod prompts;
pub mod qa;
pub mod rate_limit;
pub mod reduce;
pub mod render;
pub mod tokenizer;

// Re-export commonly used items
pub use chunker::{max_chunk_size, plan_chunks, Chunk};
pub use client::{ChatMessage, OpenAiClient};
pub use completion::{count_prompt_tokens, CompletionBackend, CompletionClient, CompletionRequest};
pub use config::{DecodingParams, ModelConfig, RateLimitConfig, SummaryConfig};
pub use error::{ErrorKind, Result, Step, SummaryError};
pub use pipeline::{ChunkPlan, ChunkedSummarizer, ChunkedSummary, SummarySegment};
pub use qa::{QuestionAnswerer, Retriever, TranscriptIndex};
pub use rate_limit::{Clock, ManualClock, RateLimiter, TokioClock};
pub use reduce::{RecursiveSummarizer, ReducedSummary};
pub use render::{DocumentRenderer, HtmlRenderer, PdfRenderer, RenderedDocument};
pub use tokenizer::{CharTokenizer, TiktokenTokenizer, TokenId, Tokenizer};
