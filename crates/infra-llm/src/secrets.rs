//! Provider API keys, loaded once at startup from a JSON file.

use serde::Deserialize;
use smarthvac_core::error::{AppError, Result};
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

/// `{"OPENAI_API_KEY": "...", "GEMINI_API_KEY": "..."}`
///
/// A missing key leaves that backend known but unconfigured.
#[derive(Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(rename = "OPENAI_API_KEY", default)]
    openai_api_key: Option<String>,

    #[serde(rename = "GEMINI_API_KEY", default)]
    gemini_api_key: Option<String>,
}

impl Secrets {
    pub fn new(openai_api_key: Option<String>, gemini_api_key: Option<String>) -> Self {
        Self {
            openai_api_key,
            gemini_api_key,
        }
    }

    /// A missing file is not fatal (every backend ends up unconfigured);
    /// an unreadable or malformed one is.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Secrets file not found, generation backends are unconfigured");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(AppError::Configuration(format!(
                    "cannot read secrets file {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let secrets: Secrets = serde_json::from_str(&raw).map_err(|e| {
            AppError::Configuration(format!("malformed secrets file {}: {}", path.display(), e))
        })?;
        info!(
            path = %path.display(),
            openai = secrets.openai().is_some(),
            gemini = secrets.gemini().is_some(),
            "Secrets loaded"
        );
        Ok(secrets)
    }

    pub fn openai(&self) -> Option<&str> {
        non_blank(&self.openai_api_key)
    }

    pub fn gemini(&self) -> Option<&str> {
        non_blank(&self.gemini_api_key)
    }
}

fn non_blank(key: &Option<String>) -> Option<&str> {
    key.as_deref().map(str::trim).filter(|k| !k.is_empty())
}

// Keys never reach logs
impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("openai", &self.openai().map(|_| "<redacted>"))
            .field("gemini", &self.gemini().map(|_| "<redacted>"))
            .finish()
    }
}
