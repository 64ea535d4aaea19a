//! Error types for the summarization pipeline.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Position inside a pipeline run where a failure happened.
///
/// Chunk and pass numbers are 1-based, as reported to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Condensing one chunk of the transcript.
    Summarize { chunk: usize, total: usize },
    /// Markdown formatting of a condensed chunk.
    Format { chunk: usize, total: usize },
    /// Extending the running summary during a reduction pass.
    Reduce { pass: usize, chunk: usize, total: usize },
    /// Final seam-smoothing request.
    Cleanup,
    /// Answering a follow-up question.
    Answer,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Summarize { chunk, total } => write!(f, "summarizing chunk {} of {}", chunk, total),
            Self::Format { chunk, total } => write!(f, "formatting chunk {} of {}", chunk, total),
            Self::Reduce { pass, chunk, total } => {
                write!(f, "reduction pass {} chunk {} of {}", pass, chunk, total)
            }
            Self::Cleanup => write!(f, "cleanup pass"),
            Self::Answer => write!(f, "answering question"),
        }
    }
}

/// Broad failure category, used by callers to pick a recovery policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The backend failed or produced nothing usable.
    Generation,
    /// No call slot became available in time.
    RateLimitTimeout,
    /// Recursive reduction stopped making progress.
    NonConvergence,
    /// Markdown could not be turned into a document.
    Rendering,
    /// Bad or missing configuration, or input rejected up front.
    Configuration,
    /// Text could not be tokenized or decoded.
    Tokenizer,
    /// Context lookup for a question failed.
    Retrieval,
}

/// Errors that can occur in summarization operations.
#[derive(Error, Debug)]
pub enum SummaryError {
    /// Backend answered but every choice was empty.
    #[error("generation failed: empty completion")]
    EmptyCompletion,

    /// Backend request failed (transport or non-success status).
    #[error("model invocation failed: {0}")]
    ModelInvocation(String),

    /// Backend response could not be parsed.
    #[error("failed to parse response: {0}")]
    ResponseParse(String),

    /// Prompt alone fills the model's context window.
    #[error("prompt of {prompt_tokens} tokens leaves no output room under the {ceiling}-token ceiling")]
    PromptTooLarge {
        /// Tokens in the prompt.
        prompt_tokens: usize,
        /// Absolute model ceiling.
        ceiling: usize,
    },

    /// Rate limiter could not grant a slot within the configured bound.
    #[error("no call slot for '{resource}' within {timeout:?}")]
    RateLimitTimeout {
        /// Limiter resource key.
        resource: String,
        /// Configured acquisition bound.
        timeout: Duration,
    },

    /// A reduction pass did not shrink the running summary.
    #[error("summary did not converge: pass {pass} went from {tokens_before} to {tokens_after} tokens")]
    NonConvergence {
        /// 1-based pass number.
        pass: usize,
        /// Tokens fed into the pass.
        tokens_before: usize,
        /// Tokens produced by the pass.
        tokens_after: usize,
    },

    /// Reduction kept shrinking but ran out of passes.
    #[error("summary still {tokens} tokens after {passes} passes (target {target})")]
    PassLimitExceeded {
        /// Passes performed.
        passes: usize,
        /// Tokens after the last pass.
        tokens: usize,
        /// Requested target.
        target: usize,
    },

    /// Document rendering failed.
    #[error("rendering failed: {0}")]
    Rendering(String),

    /// Tokenizer failure.
    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    /// Invalid pipeline parameters.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Missing credentials or environment.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Nothing to summarize.
    #[error("transcript is empty")]
    EmptyTranscript,

    /// Retriever failure.
    #[error("retrieval failed: {0}")]
    Retrieval(String),

    /// A failure tagged with where in the pipeline it happened.
    #[error("{at}: {source}")]
    Step {
        /// Pipeline position.
        at: Step,
        /// Underlying failure.
        #[source]
        source: Box<SummaryError>,
    },
}

impl SummaryError {
    /// Tag this error with a pipeline position.
    pub fn at(self, at: Step) -> Self {
        Self::Step {
            at,
            source: Box::new(self),
        }
    }

    /// Pipeline position, if the error was tagged with one.
    pub fn step(&self) -> Option<Step> {
        match self {
            Self::Step { at, .. } => Some(*at),
            _ => None,
        }
    }

    /// Innermost error, skipping position tags.
    pub fn root(&self) -> &SummaryError {
        match self {
            Self::Step { source, .. } => source.root(),
            other => other,
        }
    }

    /// Failure category of the innermost error.
    pub fn kind(&self) -> ErrorKind {
        match self.root() {
            Self::EmptyCompletion
            | Self::ModelInvocation(_)
            | Self::ResponseParse(_)
            | Self::PromptTooLarge { .. } => ErrorKind::Generation,
            Self::RateLimitTimeout { .. } => ErrorKind::RateLimitTimeout,
            Self::NonConvergence { .. } | Self::PassLimitExceeded { .. } => {
                ErrorKind::NonConvergence
            }
            Self::Rendering(_) => ErrorKind::Rendering,
            Self::Tokenizer(_) => ErrorKind::Tokenizer,
            Self::InvalidConfig(_) | Self::Configuration(_) | Self::EmptyTranscript => {
                ErrorKind::Configuration
            }
            Self::Retrieval(_) => ErrorKind::Retrieval,
            Self::Step { source, .. } => source.kind(),
        }
    }

    /// Whether retrying the whole call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.root(),
            Self::RateLimitTimeout { .. } | Self::ModelInvocation(_)
        )
    }
}

/// Result type for summarization operations.
pub type Result<T> = std::result::Result<T, SummaryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SummaryError::EmptyCompletion.at(Step::Summarize { chunk: 3, total: 5 });
        assert_eq!(
            err.to_string(),
            "summarizing chunk 3 of 5: generation failed: empty completion"
        );

        let err = SummaryError::NonConvergence {
            pass: 2,
            tokens_before: 400,
            tokens_after: 410,
        };
        assert_eq!(
            err.to_string(),
            "summary did not converge: pass 2 went from 400 to 410 tokens"
        );
    }

    #[test]
    fn test_step_and_root() {
        let err = SummaryError::Rendering("boom".into());
        assert!(err.step().is_none());

        let err = SummaryError::EmptyCompletion.at(Step::Format { chunk: 1, total: 2 });
        assert_eq!(err.step(), Some(Step::Format { chunk: 1, total: 2 }));
        assert!(matches!(err.root(), SummaryError::EmptyCompletion));
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(SummaryError::EmptyCompletion.kind(), ErrorKind::Generation);
        assert_eq!(
            SummaryError::Rendering("x".into()).kind(),
            ErrorKind::Rendering
        );
        let err = SummaryError::RateLimitTimeout {
            resource: "gpt".into(),
            timeout: Duration::from_secs(1),
        }
        .at(Step::Cleanup);
        assert_eq!(err.kind(), ErrorKind::RateLimitTimeout);
        assert!(err.is_retryable());
        assert!(!SummaryError::EmptyCompletion.is_retryable());
    }
}
