//! Chat-completion client for the remote language model
//!
//! Provides a `CompletionBackend` trait and `ChatCompletionClient`, which talks
//! to any OpenAI-compatible `/chat/completions` endpoint (Groq by default).
//! One call per request: there is no retry policy.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::config::CompletionConfig;

// ============================================================================
// CompletionBackend trait
// ============================================================================

/// Abstraction over text-completion providers.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Send one system prompt and one user turn; return the reply text.
    async fn complete(&self, system_prompt: &str, user_message: &str)
        -> Result<String, CompletionError>;

    /// Model identifier, for logging.
    fn model(&self) -> &str;
}

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Completion response contained no choices")]
    EmptyCompletion,

    #[error("Missing API key (set {env_var})")]
    MissingApiKey { env_var: String },

    #[error("Completion settings carry an empty API key")]
    EmptyApiKey,
}

// ============================================================================
// Client settings
// ============================================================================

#[derive(Debug, Clone)]
pub struct CompletionSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl CompletionSettings {
    /// Build settings from config, reading the key from `api_key_env`.
    pub fn from_config(config: &CompletionConfig) -> Result<Self, CompletionError> {
        let api_key = std::env::var(&config.api_key_env).unwrap_or_default();
        if api_key.trim().is_empty() {
            return Err(CompletionError::MissingApiKey {
                env_var: config.api_key_env.clone(),
            });
        }

        Ok(Self {
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: Duration::from_secs(config.timeout_seconds),
        })
    }
}

// ============================================================================
// Wire structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

// ============================================================================
// ChatCompletionClient
// ============================================================================

#[derive(Debug, Clone)]
pub struct ChatCompletionClient {
    client: Client,
    settings: CompletionSettings,
}

impl ChatCompletionClient {
    pub fn new(settings: CompletionSettings) -> Result<Self, CompletionError> {
        if settings.api_key.trim().is_empty() {
            return Err(CompletionError::EmptyApiKey);
        }

        let client = Client::builder().timeout(settings.timeout).build()?;

        Ok(Self { client, settings })
    }

    pub fn from_config(config: &CompletionConfig) -> Result<Self, CompletionError> {
        Self::new(CompletionSettings::from_config(config)?)
    }

    pub fn settings(&self) -> &CompletionSettings {
        &self.settings
    }
}

#[async_trait]
impl CompletionBackend for ChatCompletionClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<String, CompletionError> {
        let url = format!("{}/chat/completions", self.settings.base_url);

        let request = ChatRequest {
            model: &self.settings.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_message,
                },
            ],
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.settings.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.error)
                .map(|e| e.message)
                .unwrap_or(error_body);

            tracing::error!(code = status.as_u16(), message = %message, "Completion API error");

            return Err(CompletionError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response.json().await?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(CompletionError::EmptyCompletion)?;

        Ok(content.trim().to_string())
    }

    fn model(&self) -> &str {
        &self.settings.model
    }
}

// ============================================================================
// TESTS
// ============================================================================
