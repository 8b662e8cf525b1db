//! Errors from the HTTP generation backends.

use smarthvac_core::port::GenerationError;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(reqwest::Error),

    /// The provider answered with a non-2xx status.
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The response parsed but carried no text.
    #[error("response contained no text: {0}")]
    EmptyResponse(String),

    #[error("unexpected response shape: {0}")]
    Decode(String),
}

// Request URLs can carry credentials, and the message ends up in job records
impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Request(err.without_url())
    }
}

impl LlmError {
    /// Wrap into the port error, tagging the backend that produced it
    pub fn into_generation(self, backend: &str) -> GenerationError {
        match self {
            LlmError::Request(_) | LlmError::Api { .. } => GenerationError::Request {
                backend: backend.to_string(),
                message: self.to_string(),
            },
            LlmError::EmptyResponse(_) | LlmError::Decode(_) => GenerationError::InvalidResponse {
                backend: backend.to_string(),
                message: self.to_string(),
            },
        }
    }
}

/// Keep error bodies readable in job records
pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 500;
    if body.chars().count() <= MAX {
        body.to_string()
    } else {
        format!("{}...", body.chars().take(MAX).collect::<String>())
    }
}

/// Non-2xx responses become [`LlmError::Api`] with the body text
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    Err(LlmError::Api {
        status: status.as_u16(),
        body: truncate_body(&body),
    })
}
