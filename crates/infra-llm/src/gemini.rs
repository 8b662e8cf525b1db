//! Gemini `generateContent` backend.
//!
//! Gemini takes a single prompt here: the system rules and the user message
//! are joined with a blank line.

use crate::error::{ensure_success, LlmError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use smarthvac_core::port::{GenerationError, TextGenerator};
use std::time::Duration;
use tracing::debug;

pub const BACKEND_NAME: &str = "gemini";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// Base HTTP URL, e.g. `https://generativelanguage.googleapis.com`.
    pub base_url: String,
    pub model: String,
    pub request_timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-1.5-flash-001".to_string(),
            request_timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// HTTP client for the Gemini API.
pub struct GeminiGenerator {
    client: reqwest::Client,
    api_key: String,
    config: GeminiConfig,
}

impl GeminiGenerator {
    pub fn new(api_key: impl Into<String>, config: GeminiConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            config,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    async fn generate_content(&self, prompt: &str) -> Result<String, LlmError> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.as_str())
            .json(&content_request(prompt))
            .send()
            .await?;

        let response = ensure_success(response).await?;
        let parsed: GenerateContentResponse = response.json().await?;
        candidate_text(parsed)
    }
}

/// Join system rules and user content into the single prompt Gemini receives
pub fn combined_prompt(system: &str, user: &str) -> String {
    format!("{}\n\n{}", system, user)
}

pub fn content_request(prompt: &str) -> Value {
    json!({
        "contents": [{"role": "user", "parts": [{"text": prompt}]}],
    })
}

fn candidate_text(response: GenerateContentResponse) -> Result<String, LlmError> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(LlmError::EmptyResponse(format!("prompt blocked: {}", reason)));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::Decode("no candidates in response".to_string()))?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(LlmError::EmptyResponse("candidate has no text".to_string()));
    }
    Ok(text)
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    async fn generate(&self, system: &str, user: &str) -> Result<String, GenerationError> {
        debug!(model = %self.config.model, "Calling Gemini generateContent");
        self.generate_content(&combined_prompt(system, user))
            .await
            .map_err(|e| e.into_generation(BACKEND_NAME))
    }

    async fn probe(&self) -> Result<(), GenerationError> {
        self.generate_content("hi")
            .await
            .map(|_| ())
            .map_err(|e| e.into_generation(BACKEND_NAME))
    }
}
