//! Configuration types for the completion backend and the pipeline.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, SummaryError};

/// Environment variable for the OpenAI API key.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
/// Environment variable overriding the model identifier.
pub const MODEL_ENV: &str = "LECTUREMATE_MODEL";
/// Environment variable overriding the API base URL.
pub const API_BASE_ENV: &str = "LECTUREMATE_API_BASE";
/// Environment variable overriding the model's context window.
pub const CONTEXT_WINDOW_ENV: &str = "LECTUREMATE_CONTEXT_WINDOW";
/// Environment variable overriding the chunk planning budget.
pub const TOKEN_BUDGET_ENV: &str = "LECTUREMATE_TOKEN_BUDGET";
/// Environment variable overriding the compression ratio.
pub const SUMMARY_RATIO_ENV: &str = "LECTUREMATE_SUMMARY_RATIO";
/// Environment variable overriding requests per window.
pub const RATE_LIMIT_ENV: &str = "LECTUREMATE_RATE_LIMIT";
/// Environment variable overriding the window length in seconds.
pub const RATE_WINDOW_ENV: &str = "LECTUREMATE_RATE_WINDOW_SECS";
/// Environment variable bounding how long a caller waits for a slot.
pub const ACQUIRE_TIMEOUT_ENV: &str = "LECTUREMATE_ACQUIRE_TIMEOUT_SECS";

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
/// Default OpenAI-compatible API base.
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Model configuration for completion requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model identifier (e.g., "gpt-3.5-turbo").
    pub model: String,

    /// Absolute token ceiling: prompt plus generated output.
    #[serde(default = "default_context_window")]
    pub context_window: usize,

    /// Base URL of the OpenAI-compatible API.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// API key (if not using the environment variable).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub api_key: Option<String>,
}

fn default_context_window() -> usize {
    4096
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.into(),
            context_window: default_context_window(),
            api_base: default_api_base(),
            api_key: None,
        }
    }
}

impl ModelConfig {
    /// Create a configuration for the given model ID.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Build from `LECTUREMATE_*` and `OPENAI_API_KEY` variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            model: std::env::var(MODEL_ENV).unwrap_or(defaults.model),
            context_window: env_or(CONTEXT_WINDOW_ENV, defaults.context_window),
            api_base: std::env::var(API_BASE_ENV).unwrap_or(defaults.api_base),
            api_key: std::env::var(OPENAI_API_KEY_ENV).ok(),
        }
    }

    /// Set the context window.
    pub fn with_context_window(mut self, tokens: usize) -> Self {
        self.context_window = tokens;
        self
    }

    /// Set the API base URL.
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

/// Sampling parameters for one request.
///
/// `max_output_tokens` is only a cap; the client always clamps it to the
/// headroom left by the prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodingParams {
    pub temperature: f32,
    #[serde(default)]
    pub frequency_penalty: f32,
    #[serde(default)]
    pub presence_penalty: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<usize>,
    /// Number of candidates to sample.
    #[serde(default = "default_n")]
    pub n: u32,
}

fn default_n() -> u32 {
    1
}

impl Default for DecodingParams {
    fn default() -> Self {
        Self::deterministic()
    }
}

impl DecodingParams {
    /// Temperature 0, single candidate.
    pub fn deterministic() -> Self {
        Self {
            temperature: 0.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            max_output_tokens: None,
            n: 1,
        }
    }

    /// Set the temperature, clamped to the API range.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 2.0);
        self
    }

    /// Set frequency and presence penalties.
    pub fn with_penalties(mut self, frequency: f32, presence: f32) -> Self {
        self.frequency_penalty = frequency.clamp(-2.0, 2.0);
        self.presence_penalty = presence.clamp(-2.0, 2.0);
        self
    }

    /// Cap the generated output.
    pub fn with_max_output_tokens(mut self, tokens: usize) -> Self {
        self.max_output_tokens = Some(tokens);
        self
    }

    /// Sample several candidates in one request.
    pub fn with_candidates(mut self, n: u32) -> Self {
        self.n = n.max(1);
        self
    }
}

/// Pipeline sizing and convergence parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryConfig {
    /// Token budget used for chunk planning.
    #[serde(default = "default_token_budget")]
    pub token_budget: usize,

    /// Target fraction of a chunk's tokens for its summary.
    #[serde(default = "default_compression_ratio")]
    pub compression_ratio: f64,

    /// Character length of chunks in recursive reduction.
    #[serde(default = "default_reduce_chunk_chars")]
    pub reduce_chunk_chars: usize,

    /// Upper bound on recursive reduction passes.
    #[serde(default = "default_max_passes")]
    pub max_passes: usize,

    /// Candidates sampled for the cleanup pass.
    #[serde(default = "default_best_of")]
    pub best_of: u32,
}

fn default_token_budget() -> usize {
    3600
}

fn default_compression_ratio() -> f64 {
    0.4
}

fn default_reduce_chunk_chars() -> usize {
    6000
}

/// Enough for a 20x reduction when every pass shrinks the text by 10%.
fn default_max_passes() -> usize {
    32
}

fn default_best_of() -> u32 {
    3
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            token_budget: default_token_budget(),
            compression_ratio: default_compression_ratio(),
            reduce_chunk_chars: default_reduce_chunk_chars(),
            max_passes: default_max_passes(),
            best_of: default_best_of(),
        }
    }
}

impl SummaryConfig {
    /// Build from `LECTUREMATE_*` variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            token_budget: env_or(TOKEN_BUDGET_ENV, defaults.token_budget),
            compression_ratio: env_or(SUMMARY_RATIO_ENV, defaults.compression_ratio),
            ..defaults
        }
    }

    /// Set the chunk planning budget.
    pub fn with_token_budget(mut self, tokens: usize) -> Self {
        self.token_budget = tokens;
        self
    }

    /// Set the compression ratio.
    pub fn with_compression_ratio(mut self, ratio: f64) -> Self {
        self.compression_ratio = ratio;
        self
    }

    /// Set the reduction chunk length in characters.
    pub fn with_reduce_chunk_chars(mut self, chars: usize) -> Self {
        self.reduce_chunk_chars = chars;
        self
    }

    /// Set the pass bound.
    pub fn with_max_passes(mut self, passes: usize) -> Self {
        self.max_passes = passes;
        self
    }

    /// Set the cleanup candidate count.
    pub fn with_best_of(mut self, n: u32) -> Self {
        self.best_of = n;
        self
    }

    /// Reject parameters the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.token_budget == 0 {
            return Err(SummaryError::InvalidConfig("token budget must be positive".into()));
        }
        if !(self.compression_ratio > 0.0 && self.compression_ratio <= 1.0) {
            return Err(SummaryError::InvalidConfig(format!(
                "compression ratio {} outside (0, 1]",
                self.compression_ratio
            )));
        }
        if self.reduce_chunk_chars == 0 {
            return Err(SummaryError::InvalidConfig("reduce chunk size must be positive".into()));
        }
        if self.max_passes == 0 {
            return Err(SummaryError::InvalidConfig("at least one pass is required".into()));
        }
        if self.best_of == 0 {
            return Err(SummaryError::InvalidConfig("best_of must be at least 1".into()));
        }
        Ok(())
    }
}

/// Call quota for the completion backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Calls allowed per window.
    pub max_requests: usize,
    /// Rolling window length.
    pub window: Duration,
    /// How long a caller may wait for a slot; `None` waits indefinitely.
    pub acquire_timeout: Option<Duration>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 3,
            window: Duration::from_secs(60),
            acquire_timeout: None,
        }
    }
}

impl RateLimitConfig {
    /// `max_requests` calls per `window`, unbounded wait.
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            acquire_timeout: None,
        }
    }

    /// Build from `LECTUREMATE_RATE_*` variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_requests: env_or(RATE_LIMIT_ENV, defaults.max_requests),
            window: Duration::from_secs(env_or(RATE_WINDOW_ENV, defaults.window.as_secs())),
            acquire_timeout: env_opt::<u64>(ACQUIRE_TIMEOUT_ENV).map(Duration::from_secs),
        }
    }

    /// Bound the wait for a slot.
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout);
        self
    }
}

/// Parse an environment variable, falling back to `default` when unset or invalid.
fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => parse_setting(name, &raw).unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse an optional environment variable; `None` when unset or invalid.
fn env_opt<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|raw| parse_setting(name, &raw))
}

/// Parse a raw setting value, warning when it is not usable.
fn parse_setting<T: std::str::FromStr>(name: &str, raw: &str) -> Option<T> {
    let parsed = raw.trim().parse().ok();
    if parsed.is_none() {
        warn!(var = name, value = %raw, "Ignoring unparsable setting");
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_config_default() {
        let config = ModelConfig::default();
        assert_eq!(config.model, "gpt-3.5-turbo");
        assert_eq!(config.context_window, 4096);
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_model_config_builder() {
        let config = ModelConfig::new("test-model")
            .with_context_window(1000)
            .with_api_base("http://localhost:1234/v1")
            .with_api_key("sk-test");

        assert_eq!(config.model, "test-model");
        assert_eq!(config.context_window, 1000);
        assert_eq!(config.api_base, "http://localhost:1234/v1");
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_decoding_clamping() {
        let params = DecodingParams::deterministic()
            .with_temperature(5.0)
            .with_penalties(3.0, -3.0)
            .with_candidates(0);
        assert_eq!(params.temperature, 2.0);
        assert_eq!(params.frequency_penalty, 2.0);
        assert_eq!(params.presence_penalty, -2.0);
        assert_eq!(params.n, 1);
    }

    #[test]
    fn test_summary_config_defaults_valid() {
        let config = SummaryConfig::default();
        assert_eq!(config.token_budget, 3600);
        assert_eq!(config.compression_ratio, 0.4);
        assert_eq!(config.max_passes, 32);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_summary_config_rejects_bad_ratio() {
        for ratio in [0.0, -0.5, 1.5, f64::NAN] {
            let config = SummaryConfig::default().with_compression_ratio(ratio);
            assert!(matches!(
                config.validate(),
                Err(SummaryError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_summary_config_rejects_zero_passes() {
        let config = SummaryConfig::default().with_max_passes(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rate_limit_default_is_unbounded() {
        let config = RateLimitConfig::default();
        assert_eq!(config.max_requests, 3);
        assert_eq!(config.window, Duration::from_secs(60));
        assert!(config.acquire_timeout.is_none());
    }

    #[test]
    fn test_parse_setting() {
        assert_eq!(parse_setting::<u64>(ACQUIRE_TIMEOUT_ENV, " 30 "), Some(30));
        assert_eq!(parse_setting::<u64>(ACQUIRE_TIMEOUT_ENV, "30s"), None);
        assert_eq!(parse_setting::<u64>(ACQUIRE_TIMEOUT_ENV, "-1"), None);
        assert_eq!(parse_setting::<f64>(SUMMARY_RATIO_ENV, "0.25"), Some(0.25));
    }

    #[test]
    fn test_serialization() {
        let config = SummaryConfig::default().with_token_budget(1000);
        let json = serde_json::to_string(&config).unwrap();
        let parsed: SummaryConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, parsed);

        let parsed: SummaryConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed, SummaryConfig::default());
    }
}
