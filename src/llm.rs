//! Chat-completion backend abstraction.
//!
//! Defines the [`CompletionBackend`] trait the memo generator talks to, and
//! [`ChatCompletionClient`], the production implementation for
//! OpenAI-compatible `/chat/completions` endpoints (Groq by default).
//!
//! The client is constructed explicitly with its credential and handed to
//! the generator; tests substitute a scripted backend.
//!
//! # Error mapping
//!
//! - request exceeded `timeout_secs` → [`GenerateError::RequestTimeout`]
//! - connection failure or non-2xx status → [`GenerateError::RequestFailure`]
//! - missing `choices[0].message` → [`GenerateError::RequestFailure`]
//!
//! No retries happen at this layer.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::LlmConfig;
use crate::generate::GenerateError;

/// One chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// A single completion call.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: Option<u32>,
}

/// Anything that can turn a chat request into completion text.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Model identifier, for logs.
    fn model_name(&self) -> &str;

    /// Returns the raw text of the first completion choice.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GenerateError>;
}

/// Client for OpenAI-compatible chat-completions endpoints.
pub struct ChatCompletionClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    timeout_secs: u64,
}

impl ChatCompletionClient {
    /// Builds a client with an explicit API key.
    pub fn new(config: &LlmConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint: chat_endpoint(&config.base_url),
            model: config.model.clone(),
            api_key: api_key.into(),
            timeout_secs: config.timeout_secs,
        })
    }

    /// Builds a client reading the key from the variable named by
    /// `llm.api_key_env` (a `.env` file in the working directory is honored).
    pub fn from_env(config: &LlmConfig) -> Result<Self> {
        let api_key = dotenv::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!("{} environment variable not set", config.api_key_env)
            })?;
        Self::new(config, api_key)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn transport_error(&self, err: reqwest::Error) -> GenerateError {
        if err.is_timeout() {
            GenerateError::RequestTimeout(self.timeout_secs)
        } else {
            GenerateError::RequestFailure(err.to_string())
        }
    }
}

#[async_trait]
impl CompletionBackend for ChatCompletionClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, GenerateError> {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": request.messages,
            "temperature": request.temperature,
            "top_p": request.top_p,
        });
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(GenerateError::RequestFailure(format!(
                "completion API error {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| self.transport_error(e))?;
        parse_chat_response(&json)
    }
}

/// Resolves the chat-completions URL from a base URL.
pub fn chat_endpoint(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with("/chat/completions") {
        base.to_string()
    } else if base.ends_with("/v1") {
        format!("{}/chat/completions", base)
    } else {
        format!("{}/v1/chat/completions", base)
    }
}

/// Extracts `choices[0].message.content`. A `null` content is returned as an
/// empty string so the generator reports it as malformed output.
pub fn parse_chat_response(json: &serde_json::Value) -> Result<String, GenerateError> {
    let message = json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .ok_or_else(|| {
            GenerateError::RequestFailure(
                "Invalid completion response: missing choices[0].message".to_string(),
            )
        })?;

    Ok(message
        .get("content")
        .and_then(|c| c.as_str())
        .unwrap_or_default()
        .to_string())
}
