// Text Generation Port
// One capability shared by every provider: system + user instructions in, text out

use async_trait::async_trait;
use thiserror::Error;

/// Generation backend errors
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("backend '{0}' is not configured (missing API key)")]
    NotConfigured(String),

    #[error("{backend} request failed: {message}")]
    Request { backend: String, message: String },

    #[error("{backend} returned an unreadable response: {message}")]
    InvalidResponse { backend: String, message: String },
}

impl GenerationError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, GenerationError::NotConfigured(_))
    }
}

/// Text generation backend, selected by name
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Registry key (`openai`, `gemini`, ...)
    fn name(&self) -> &str;

    /// Return the raw generated text for the given instructions
    async fn generate(&self, system: &str, user: &str) -> Result<String, GenerationError>;

    /// Cheap connectivity check
    async fn probe(&self) -> Result<(), GenerationError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Mock generator behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Return this text
        Respond(String),
        /// Fail with a request error carrying this message
        Fail(String),
        /// Never answer (for timeout testing)
        Hang,
    }

    /// Mock generator recording every prompt it receives
    pub struct MockTextGenerator {
        name: String,
        behavior: Arc<Mutex<MockBehavior>>,
        probe_ok: bool,
        prompts: Arc<Mutex<Vec<(String, String)>>>,
        probe_calls: Arc<Mutex<usize>>,
    }

    impl MockTextGenerator {
        pub fn new(name: impl Into<String>, behavior: MockBehavior) -> Self {
            Self {
                name: name.into(),
                behavior: Arc::new(Mutex::new(behavior)),
                probe_ok: true,
                prompts: Arc::new(Mutex::new(Vec::new())),
                probe_calls: Arc::new(Mutex::new(0)),
            }
        }

        pub fn responding(name: impl Into<String>, text: impl Into<String>) -> Self {
            Self::new(name, MockBehavior::Respond(text.into()))
        }

        pub fn failing(name: impl Into<String>, message: impl Into<String>) -> Self {
            Self::new(name, MockBehavior::Fail(message.into()))
        }

        pub fn with_probe_ok(mut self, ok: bool) -> Self {
            self.probe_ok = ok;
            self
        }

        pub fn call_count(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }

        pub fn probe_calls(&self) -> usize {
            *self.probe_calls.lock().unwrap()
        }

        pub fn last_prompt(&self) -> Option<(String, String)> {
            self.prompts.lock().unwrap().last().cloned()
        }
    }

    #[async_trait]
    impl TextGenerator for MockTextGenerator {
        fn name(&self) -> &str {
            &self.name
        }

        async fn generate(&self, system: &str, user: &str) -> Result<String, GenerationError> {
            self.prompts
                .lock()
                .unwrap()
                .push((system.to_string(), user.to_string()));

            let behavior = self.behavior.lock().unwrap().clone();
            match behavior {
                MockBehavior::Respond(text) => Ok(text),
                MockBehavior::Fail(message) => Err(GenerationError::Request {
                    backend: self.name.clone(),
                    message,
                }),
                MockBehavior::Hang => {
                    std::future::pending::<()>().await;
                    unreachable!("pending future never resolves")
                }
            }
        }

        async fn probe(&self) -> Result<(), GenerationError> {
            *self.probe_calls.lock().unwrap() += 1;
            if self.probe_ok {
                Ok(())
            } else {
                Err(GenerationError::Request {
                    backend: self.name.clone(),
                    message: "401 Unauthorized".to_string(),
                })
            }
        }
    }
}
