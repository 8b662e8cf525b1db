//! Wires configured HTTP backends into the core [`BackendRegistry`].

use crate::gemini::{self, GeminiConfig, GeminiGenerator};
use crate::openai::{self, OpenAiConfig, OpenAiGenerator};
use crate::secrets::Secrets;
use smarthvac_core::application::BackendRegistry;
use smarthvac_core::error::{AppError, Result};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct LlmSettings {
    pub openai: OpenAiConfig,
    pub gemini: GeminiConfig,
}

/// Register every backend with a key; the rest stay known but unconfigured
pub fn build_registry(secrets: &Secrets, settings: &LlmSettings) -> Result<BackendRegistry> {
    let mut registry = BackendRegistry::new();

    match secrets.openai() {
        Some(key) => {
            let generator = OpenAiGenerator::new(key, settings.openai.clone())
                .map_err(|e| AppError::Configuration(format!("openai client: {}", e)))?;
            registry.register(Arc::new(generator));
        }
        None => {
            warn!(backend = openai::BACKEND_NAME, "No API key, backend unconfigured");
            registry.mark_unconfigured(openai::BACKEND_NAME);
        }
    }

    match secrets.gemini() {
        Some(key) => {
            let generator = GeminiGenerator::new(key, settings.gemini.clone())
                .map_err(|e| AppError::Configuration(format!("gemini client: {}", e)))?;
            registry.register(Arc::new(generator));
        }
        None => {
            warn!(backend = gemini::BACKEND_NAME, "No API key, backend unconfigured");
            registry.mark_unconfigured(gemini::BACKEND_NAME);
        }
    }

    info!(configured = ?registry.configured_names(), "Generation backends ready");
    Ok(registry)
}
