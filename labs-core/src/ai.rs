//! Outbound chat-completions client for pedagogical feedback.
//!
//! Provides a `ChatBackend` trait with a DeepSeek implementation. Every call
//! is a single round trip: the upstream budget is the client timeout and a
//! non-success status is surfaced to the caller as-is — no retry, no
//! streaming, no caching.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::config::AiConfig;

// ============================================================================
// ChatBackend trait
// ============================================================================

/// Abstraction over the upstream text-generation provider. Handlers depend on
/// this trait so tests can substitute a canned backend and count calls.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send one system + user message pair, expecting a JSON-object reply.
    /// Returns the raw content of the first choice.
    async fn complete(&self, system: &str, user: &str) -> Result<String, AiError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum AiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Missing API key")]
    MissingApiKey,

    #[error("Upstream response carried no message content")]
    MissingContent,
}

// ============================================================================
// Chat-completions API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct UpstreamErrorResponse {
    error: Option<UpstreamErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct UpstreamErrorDetail {
    message: String,
}

// ============================================================================
// DeepSeekClient
// ============================================================================

/// DeepSeek chat-completions client. The API key is held in memory only and
/// is never logged.
#[derive(Debug, Clone)]
pub struct DeepSeekClient {
    client: Client,
    config: AiConfig,
}

impl DeepSeekClient {
    pub fn new(config: AiConfig) -> Result<Self, AiError> {
        if config.api_key.is_empty() {
            return Err(AiError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self { client, config })
    }

    /// Create a client pointed at a custom base URL (for testing).
    pub fn with_base_url(mut config: AiConfig, base_url: String) -> Result<Self, AiError> {
        config.base_url = base_url;
        Self::new(config)
    }

    async fn complete_once(&self, system: &str, user: &str) -> Result<String, AiError> {
        let url = format!("{}/chat/completions", self.config.base_url);

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user.to_string(),
                },
            ],
            response_format: ResponseFormat { kind: "json_object" },
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<UpstreamErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.error)
                .map(|e| e.message)
                .unwrap_or(error_body);

            tracing::error!(code = status.as_u16(), message = %message, "Chat API error");

            return Err(AiError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let chat_response: ChatResponse = response.json().await?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(AiError::MissingContent)
    }
}

#[async_trait]
impl ChatBackend for DeepSeekClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, AiError> {
        self.complete_once(system, user).await
    }

    fn name(&self) -> &str {
        "deepseek"
    }
}

// ============================================================================
// TESTS
// ============================================================================
