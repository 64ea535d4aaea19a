//! OpenAI-compatible chat completions client.
//!
//! This module provides the HTTP backend for [`CompletionClient`]:
//! - Chat completions with user/system/assistant roles
//! - Several sampled candidates per request (`n`)
//!
//! [`CompletionClient`]: crate::completion::CompletionClient

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::completion::{CompletionBackend, CompletionRequest};
use crate::config::{ModelConfig, OPENAI_API_KEY_ENV};
use crate::error::{Result, SummaryError};

/// Chat completions client for OpenAI and compatible servers.
#[derive(Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl OpenAiClient {
    /// Create a new client with the given API key and API base.
    pub fn new(api_key: impl Into<String>, api_base: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            endpoint: format!("{}/chat/completions", api_base.trim_end_matches('/')),
        }
    }

    /// Create a client from a model configuration.
    ///
    /// Uses the configured key, then the `OPENAI_API_KEY` environment variable.
    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        let api_key = match &config.api_key {
            Some(key) => key.clone(),
            None => std::env::var(OPENAI_API_KEY_ENV).map_err(|_| {
                SummaryError::Configuration(format!(
                    "Missing {} environment variable",
                    OPENAI_API_KEY_ENV
                ))
            })?,
        };
        Ok(Self::new(api_key, &config.api_base))
    }

    /// Send a chat completion request.
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        trace!("Sending chat request: {:?}", request);

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| SummaryError::ModelInvocation(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SummaryError::ModelInvocation(format!(
                "API error {}: {}",
                status, text
            )));
        }

        let response: ChatResponse = response
            .json()
            .await
            .map_err(|e| SummaryError::ResponseParse(format!("Failed to parse response: {}", e)))?;

        debug!(
            "Chat response received: {} tokens used",
            response.usage.as_ref().map_or(0, |u| u.total_tokens)
        );

        Ok(response)
    }
}

#[async_trait]
impl CompletionBackend for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Vec<String>> {
        let params = &request.params;
        let body = ChatRequest {
            model: request.model.clone(),
            messages: request.messages.clone(),
            max_tokens: Some(request.max_tokens),
            temperature: Some(params.temperature),
            frequency_penalty: (params.frequency_penalty != 0.0).then_some(params.frequency_penalty),
            presence_penalty: (params.presence_penalty != 0.0).then_some(params.presence_penalty),
            n: (params.n > 1).then_some(params.n),
        };

        let response = self.chat(&body).await?;
        Ok(response.contents())
    }
}

/// Chat completion request body.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// Model identifier.
    pub model: String,

    /// Conversation messages.
    pub messages: Vec<ChatMessage>,

    /// Maximum tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,

    /// Temperature for generation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,

    /// Number of candidates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,
}

/// A message in the chat conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender.
    pub role: String,

    /// Text content of the message.
    pub content: String,
}

impl ChatMessage {
    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Chat completion response.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    /// Unique identifier for this completion.
    pub id: String,

    /// Completion choices.
    #[serde(default)]
    pub choices: Vec<ChatChoice>,

    /// Token usage information.
    pub usage: Option<ChatUsage>,
}

impl ChatResponse {
    /// Text of every choice, in choice order; missing content becomes "".
    pub fn contents(&self) -> Vec<String> {
        self.choices
            .iter()
            .map(|c| c.message.content.clone().unwrap_or_default())
            .collect()
    }
}

/// A choice in the completion response.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    /// Index of this choice.
    pub index: u32,

    /// The message for this choice.
    pub message: ResponseMessage,

    /// Finish reason (stop, length, etc.).
    pub finish_reason: Option<String>,
}

/// Message in a completion response.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage {
    pub role: String,
    pub content: Option<String>,
}

/// Token usage information.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatUsage {
    /// Tokens in the prompt.
    pub prompt_tokens: u32,

    /// Tokens in the completion.
    pub completion_tokens: u32,

    /// Total tokens used.
    pub total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DecodingParams;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(params: DecodingParams) -> CompletionRequest {
        CompletionRequest {
            model: "gpt-3.5-turbo".into(),
            messages: vec![ChatMessage::user("Summarize this")],
            params,
            max_tokens: 300,
            prompt_tokens: 3,
        }
    }

    #[test]
    fn test_chat_message_constructor() {
        let message = ChatMessage::user("Hello");
        assert_eq!(message.role, "user");
        assert_eq!(message.content, "Hello");
    }

    #[test]
    fn test_request_serialization_skips_defaults() {
        let body = ChatRequest {
            model: "gpt-3.5-turbo".into(),
            messages: vec![ChatMessage::user("Hello")],
            max_tokens: Some(100),
            temperature: Some(0.0),
            frequency_penalty: None,
            presence_penalty: None,
            n: None,
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["max_tokens"], 100);
        assert!(json.get("n").is_none());
        assert!(json.get("frequency_penalty").is_none());
    }

    #[test]
    fn test_response_deserialization() {
        let json = r#"{
            "id": "chatcmpl-123",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "A short summary."},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 4, "total_tokens": 14}
        }"#;

        let response: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.id, "chatcmpl-123");
        assert_eq!(response.contents(), vec!["A short summary.".to_string()]);
    }

    #[tokio::test]
    async fn test_complete_posts_to_chat_endpoint() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-3.5-turbo",
                "max_tokens": 300,
                "n": 2
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "chatcmpl-1",
                "choices": [
                    {"index": 0, "message": {"role": "assistant", "content": "first"}, "finish_reason": "stop"},
                    {"index": 1, "message": {"role": "assistant", "content": null}, "finish_reason": "stop"}
                ],
                "usage": null
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenAiClient::new("sk-test", &format!("{}/v1/", server.uri()));
        let contents = client
            .complete(&request(DecodingParams::deterministic().with_candidates(2)))
            .await
            .unwrap();

        assert_eq!(contents, vec!["first".to_string(), String::new()]);
    }

    #[tokio::test]
    async fn test_complete_maps_error_status() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let client = OpenAiClient::new("sk-test", &format!("{}/v1", server.uri()));
        let err = client
            .complete(&request(DecodingParams::deterministic()))
            .await
            .unwrap_err();

        assert!(matches!(err, SummaryError::ModelInvocation(ref m) if m.contains("429")));
    }

    #[tokio::test]
    async fn test_complete_maps_malformed_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = OpenAiClient::new("sk-test", &server.uri());
        let err = client
            .complete(&request(DecodingParams::deterministic()))
            .await
            .unwrap_err();

        assert!(matches!(err, SummaryError::ResponseParse(_)));
    }

    #[test]
    fn test_from_config_prefers_explicit_key() {
        let config = ModelConfig::default().with_api_key("sk-explicit");
        assert!(OpenAiClient::from_config(&config).is_ok());
    }
}
