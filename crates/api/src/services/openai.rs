//! OpenAI-compatible chat completion backend.
//!
//! Sends one system and one user message per call and returns the first
//! choice's content. Any base URL speaking the `/chat/completions` protocol
//! works.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

use domain::services::{GenerationBackend, GenerationError};

use crate::config::OpenAiConfig;

/// Errors that can occur while calling the completion API.
#[derive(Debug, Error)]
pub enum OpenAiError {
    #[error("Request timeout after {0}s")]
    Timeout(u64),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid response from completion API: {0}")]
    InvalidResponse(String),

    #[error("Completion API error: {0}")]
    ServiceError(String),
}

impl From<OpenAiError> for GenerationError {
    fn from(err: OpenAiError) -> Self {
        match err {
            OpenAiError::Timeout(secs) => GenerationError::Timeout(secs),
            OpenAiError::InvalidResponse(msg) => GenerationError::InvalidResponse(msg),
            other => GenerationError::Backend(other.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
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

/// Client for the chat completion endpoint.
pub struct OpenAiClient {
    client: Client,
    config: OpenAiConfig,
    endpoint: String,
    timeout_secs: u64,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.config.model)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl OpenAiClient {
    /// Create a client whose calls are bounded by `timeout`.
    pub fn new(config: OpenAiConfig, timeout: Duration) -> Result<Self, OpenAiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(OpenAiError::Http)?;

        let endpoint = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));

        Ok(Self {
            client,
            config,
            endpoint,
            timeout_secs: timeout.as_secs(),
        })
    }

    /// Run one completion.
    pub async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, OpenAiError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let start = Instant::now();
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OpenAiError::Timeout(self.timeout_secs)
                } else {
                    OpenAiError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(
                status = %status,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Completion request failed"
            );
            return Err(OpenAiError::ServiceError(format!(
                "HTTP {}: {}",
                status,
                truncate(&body, 300)
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| OpenAiError::InvalidResponse(e.to_string()))?;

        let content = first_content(parsed)?;
        debug!(
            model = %self.config.model,
            elapsed_ms = start.elapsed().as_millis() as u64,
            chars = content.len(),
            "Completion received"
        );
        Ok(content)
    }
}

fn first_content(response: ChatResponse) -> Result<String, OpenAiError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|c| c.trim().to_string())
        .ok_or_else(|| OpenAiError::InvalidResponse("no choices in response".to_string()))
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[async_trait]
impl GenerationBackend for OpenAiClient {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, GenerationError> {
        if !self.is_configured() {
            return Err(GenerationError::NotConfigured);
        }
        Ok(self.complete(system_prompt, user_prompt).await?)
    }

    fn is_configured(&self) -> bool {
        !self.config.api_key.trim().is_empty()
    }
}
