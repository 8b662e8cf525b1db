// SmartHVAC Infrastructure - Text Generation Backends
// Implements: TextGenerator (OpenAI chat completions, Gemini generateContent)

pub mod error;
pub mod gemini;
pub mod openai;
pub mod registry;
pub mod secrets;

#[cfg(test)]
mod test_server;

pub use error::LlmError;
pub use gemini::{GeminiConfig, GeminiGenerator};
pub use openai::{OpenAiConfig, OpenAiGenerator};
pub use registry::{build_registry, LlmSettings};
pub use secrets::Secrets;
