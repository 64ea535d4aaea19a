//! Recursive reduce-then-cleanup summarization.
//!
//! Alternative to the chunked pipeline when the goal is one summary under an
//! overall token target. Each pass walks the text in fixed-size character
//! chunks and asks the model to extend a running summary with every chunk.
//! Passes repeat on their own output until it fits the target. Then one
//! best-of-N cleanup request smooths the seams between chunk summaries.
//!
//! Passes are bounded: a pass that does not shrink the text fails with
//! [`SummaryError::NonConvergence`], and running out of passes fails with
//! [`SummaryError::PassLimitExceeded`].

use tracing::{debug, info, warn};

use crate::chunker::split_chars;
use crate::completion::CompletionClient;
use crate::config::{DecodingParams, SummaryConfig};
use crate::error::{Result, Step, SummaryError};
use crate::prompts::{cleanup_prompt, extend_summary_prompt, ExtendPrompt};

/// Approximate English words per token.
const WORDS_PER_TOKEN: f64 = 0.75;

/// Sampling temperature for cleanup candidates.
const CLEANUP_TEMPERATURE: f32 = 0.7;

/// Word count matching `tokens` tokens.
pub fn words_for_tokens(tokens: usize) -> usize {
    (tokens as f64 * WORDS_PER_TOKEN).round() as usize
}

/// Index of the candidate whose word count is closest to `target_words`.
///
/// Earlier candidates win ties.
pub fn closest_to_target(candidates: &[String], target_words: usize) -> usize {
    candidates
        .iter()
        .enumerate()
        .min_by_key(|(_, c)| c.split_whitespace().count().abs_diff(target_words))
        .map_or(0, |(i, _)| i)
}

/// Like [`closest_to_target`], but only among candidates for which `fits`
/// holds. Falls back to all candidates when none fits.
pub fn closest_fitting<F>(candidates: &[String], target_words: usize, fits: F) -> usize
where
    F: Fn(&str) -> bool,
{
    let fitting: Vec<usize> = (0..candidates.len())
        .filter(|&i| fits(candidates[i].as_str()))
        .collect();
    if fitting.is_empty() {
        return closest_to_target(candidates, target_words);
    }
    fitting
        .iter()
        .copied()
        .min_by_key(|&i| candidates[i].split_whitespace().count().abs_diff(target_words))
        .unwrap_or(0)
}

/// Result of a recursive reduction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReducedSummary {
    /// Cleaned-up summary.
    pub text: String,
    /// Reduction passes performed before cleanup.
    pub passes: usize,
    /// Tokens in `text`.
    pub tokens: usize,
}

/// Reduce-then-cleanup summarizer.
pub struct RecursiveSummarizer {
    client: CompletionClient,
    config: SummaryConfig,
    params: DecodingParams,
}

impl RecursiveSummarizer {
    /// Create a summarizer; rejects invalid parameters.
    pub fn new(client: CompletionClient, config: SummaryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client,
            config,
            params: DecodingParams::deterministic(),
        })
    }

    fn count(&self, text: &str) -> usize {
        self.client.tokenizer().count_tokens(text)
    }

    /// Reduce `transcript` to at most `target_tokens` tokens, then clean up.
    pub async fn summarize(&self, transcript: &str, target_tokens: usize) -> Result<ReducedSummary> {
        if transcript.trim().is_empty() {
            return Err(SummaryError::EmptyTranscript);
        }
        if target_tokens == 0 {
            return Err(SummaryError::InvalidConfig("target size must be positive".into()));
        }

        let mut current = transcript.to_string();
        let mut tokens_before = self.count(&current);
        let mut passes = 0;
        info!(tokens = tokens_before, target_tokens, "Starting recursive summary");

        loop {
            passes += 1;
            let running = self.reduce_pass(&current, passes, target_tokens).await?;
            let tokens_after = self.count(&running);
            info!(pass = passes, tokens_before, tokens_after, target_tokens, "Reduction pass finished");

            if tokens_after <= target_tokens {
                current = running;
                break;
            }
            if tokens_after >= tokens_before {
                return Err(SummaryError::NonConvergence {
                    pass: passes,
                    tokens_before,
                    tokens_after,
                });
            }
            if passes >= self.config.max_passes {
                return Err(SummaryError::PassLimitExceeded {
                    passes,
                    tokens: tokens_after,
                    target: target_tokens,
                });
            }

            current = running;
            tokens_before = tokens_after;
        }

        let words = words_for_tokens(target_tokens);
        let params = self.params.clone().with_temperature(CLEANUP_TEMPERATURE);
        let text = self
            .client
            .complete_best_of(&cleanup_prompt(&current, words), &params, self.config.best_of, |c| {
                closest_fitting(c, words, |text| self.count(text) <= target_tokens)
            })
            .await
            .map_err(|e| e.at(Step::Cleanup))?;

        let tokens = self.count(&text);
        if tokens > target_tokens {
            warn!(
                tokens,
                target_tokens,
                "No cleanup candidate fits the target, keeping the closest"
            );
        }
        Ok(ReducedSummary {
            text,
            passes,
            tokens,
        })
    }

    /// One pass: extend an initially empty running summary chunk by chunk.
    async fn reduce_pass(&self, text: &str, pass: usize, target_tokens: usize) -> Result<String> {
        let parts = split_chars(text, self.config.reduce_chunk_chars);
        let total = parts.len();
        let words = (words_for_tokens(target_tokens) / total).max(1);
        let mut running = String::new();

        for (i, part) in parts.iter().enumerate() {
            let chunk = i + 1;
            let prompt = extend_summary_prompt(ExtendPrompt {
                running_summary: &running,
                new_content: part,
                chunk,
                total,
                words,
            });

            let addition = self
                .client
                .complete(&prompt, &self.params)
                .await
                .map_err(|e| e.at(Step::Reduce { pass, chunk, total }))?;

            if !running.is_empty() {
                running.push_str("\n\n");
            }
            running.push_str(&addition);
            debug!(pass, chunk, total, running_len = running.len(), "Running summary extended");
        }

        Ok(running)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_words_for_tokens() {
        assert_eq!(words_for_tokens(400), 300);
        assert_eq!(words_for_tokens(1), 1);
        assert_eq!(words_for_tokens(0), 0);
    }

    #[test]
    fn test_closest_to_target() {
        let candidates = vec![
            "one two".to_string(),
            "one two three four five".to_string(),
            "one two three four".to_string(),
        ];
        assert_eq!(closest_to_target(&candidates, 4), 2);
        assert_eq!(closest_to_target(&candidates, 1), 0);
        assert_eq!(closest_to_target(&candidates, 100), 1);
    }

    #[test]
    fn test_closest_fitting_skips_over_length_candidates() {
        let candidates = vec!["a b c d e".to_string(), "a b".to_string()];
        let fits = |c: &str| c.split_whitespace().count() <= 4;

        assert_eq!(closest_to_target(&candidates, 4), 0);
        assert_eq!(closest_fitting(&candidates, 4, fits), 1);
    }

    #[test]
    fn test_closest_fitting_falls_back_when_nothing_fits() {
        let candidates = vec!["a b c d e f".to_string(), "a b c d e".to_string()];
        assert_eq!(closest_fitting(&candidates, 4, |_| false), 1);
        assert_eq!(closest_fitting(&[], 4, |_| true), 0);
    }

    #[test]
    fn test_closest_to_target_prefers_first_on_tie() {
        let candidates = vec!["a b c".to_string(), "a b c d e".to_string()];
        assert_eq!(closest_to_target(&candidates, 4), 0);
        assert_eq!(closest_to_target(&[], 4), 0);
    }
}
