//! OpenAI chat completions backend.
//!
//! Sends `POST {base_url}/v1/chat/completions` with a system and a user
//! message and returns the first choice's content.

use crate::error::{ensure_success, LlmError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use smarthvac_core::port::{GenerationError, TextGenerator};
use std::time::Duration;
use tracing::debug;

pub const BACKEND_NAME: &str = "openai";

/// Connection settings for the OpenAI backend.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Base HTTP URL, e.g. `https://api.openai.com`.
    pub base_url: String,
    pub model: String,
    pub temperature: f64,
    /// Whole-request timeout enforced by the HTTP client.
    pub request_timeout: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-4o".to_string(),
            temperature: 0.2,
            request_timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// HTTP client for the OpenAI chat completions endpoint.
pub struct OpenAiGenerator {
    client: reqwest::Client,
    api_key: String,
    config: OpenAiConfig,
}

impl OpenAiGenerator {
    pub fn new(api_key: impl Into<String>, config: OpenAiConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::with_client(client, api_key, config))
    }

    /// Reuse an existing [`reqwest::Client`] (shared connection pool).
    pub fn with_client(
        client: reqwest::Client,
        api_key: impl Into<String>,
        config: OpenAiConfig,
    ) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            config,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    async fn complete(&self, body: &Value) -> Result<String, LlmError> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let response = ensure_success(response).await?;
        let parsed: ChatResponse = response.json().await?;
        first_choice_text(parsed)
    }
}

/// Request body for a generation call.
pub fn chat_request(config: &OpenAiConfig, system: &str, user: &str) -> Value {
    json!({
        "model": config.model,
        "temperature": config.temperature,
        "messages": [
            {"role": "system", "content": system},
            {"role": "user", "content": user},
        ],
    })
}

/// Smallest request that still proves the key and model work.
pub fn probe_request(config: &OpenAiConfig) -> Value {
    json!({
        "model": config.model,
        "max_tokens": 1,
        "messages": [{"role": "user", "content": "hi"}],
    })
}

fn first_choice_text(response: ChatResponse) -> Result<String, LlmError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::Decode("no choices in completion".to_string()))?;
    choice
        .message
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| LlmError::EmptyResponse("first choice has no content".to_string()))
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    async fn generate(&self, system: &str, user: &str) -> Result<String, GenerationError> {
        debug!(model = %self.config.model, "Calling OpenAI chat completions");
        self.complete(&chat_request(&self.config, system, user))
            .await
            .map_err(|e| e.into_generation(BACKEND_NAME))
    }

    async fn probe(&self) -> Result<(), GenerationError> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&probe_request(&self.config))
            .send()
            .await
            .map_err(|e| LlmError::from(e).into_generation(BACKEND_NAME))?;

        // Any 2xx proves reachability; a 1-token answer may legitimately be empty
        ensure_success(response)
            .await
            .map(|_| ())
            .map_err(|e| e.into_generation(BACKEND_NAME))
    }
}
