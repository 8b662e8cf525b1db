// Artifact Generator - template + task text -> domain input file via a named backend

use crate::domain::BaseTemplate;
use crate::error::{AppError, Result};
use crate::port::{GenerationError, TextGenerator};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const FENCE: &str = "```";

/// Prompt pair sent to a backend (ephemeral, never persisted)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub system: String,
    pub user: String,
}

/// Per-backend reachability, stored as the connection-test result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    pub backends: BTreeMap<String, bool>,
    pub details: String,
}

impl ProbeReport {
    pub fn all_reachable(&self) -> bool {
        !self.backends.is_empty() && self.backends.values().all(|ok| *ok)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    fn record_failure(&mut self, name: &str, reason: impl std::fmt::Display) {
        self.backends.insert(name.to_string(), false);
        self.details.push_str(&format!("{} fail: {}; ", name, reason));
    }
}

/// Named generation backends
///
/// A name can be configured (usable), known but unconfigured (its API key is
/// missing), or unknown. Selecting an unconfigured backend is a configuration
/// error; selecting an unknown one is an unsupported request.
#[derive(Default)]
pub struct BackendRegistry {
    configured: BTreeMap<String, Arc<dyn TextGenerator>>,
    unconfigured: BTreeSet<String>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, backend: Arc<dyn TextGenerator>) {
        let name = backend.name().to_string();
        self.unconfigured.remove(&name);
        self.configured.insert(name, backend);
    }

    pub fn mark_unconfigured(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.configured.contains_key(&name) {
            self.unconfigured.insert(name);
        }
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn TextGenerator>> {
        if let Some(backend) = self.configured.get(name) {
            return Ok(Arc::clone(backend));
        }
        if self.unconfigured.contains(name) {
            return Err(GenerationError::NotConfigured(name.to_string()).into());
        }
        Err(AppError::UnsupportedRequest(format!(
            "unsupported backend '{}'",
            name
        )))
    }

    /// Every known backend name, configured or not
    pub fn names(&self) -> Vec<String> {
        self.configured
            .keys()
            .chain(self.unconfigured.iter())
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn configured_names(&self) -> Vec<String> {
        self.configured.keys().cloned().collect()
    }

    /// Probe every known backend; no file I/O, no simulation
    pub async fn probe_all(&self, per_backend_timeout: Duration) -> ProbeReport {
        let mut report = ProbeReport::default();

        for name in &self.unconfigured {
            report.record_failure(name, "not configured");
        }

        for (name, backend) in &self.configured {
            match tokio::time::timeout(per_backend_timeout, backend.probe()).await {
                Ok(Ok(())) => {
                    report.backends.insert(name.clone(), true);
                }
                Ok(Err(e)) => report.record_failure(name, e),
                Err(_) => report.record_failure(
                    name,
                    format!("no answer within {}ms", per_backend_timeout.as_millis()),
                ),
            }
        }

        info!(backends = ?report.backends, "Backend connectivity probed");
        report
    }
}

/// Produces the domain input file for a job
pub struct ArtifactGenerator {
    template: BaseTemplate,
    registry: Arc<BackendRegistry>,
}

impl ArtifactGenerator {
    pub fn new(template: BaseTemplate, registry: Arc<BackendRegistry>) -> Self {
        Self { template, registry }
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    /// Build the fixed system rules and the template/task/config user message
    pub fn build_prompts(&self, task_text: &str, config: &Value) -> Result<GenerationRequest> {
        let weather = config
            .get("weatherFilePath")
            .and_then(Value::as_str)
            .unwrap_or("Unknown");

        let system = format!(
            "You are an EnergyPlus expert. Your goal is to modify the provided Base Template IDF \
             to match the user's requirements.\n\
             RULES:\n\
             1. Return ONLY the valid IDF content. Do not output markdown code blocks ({fence}).\n\
             2. Do NOT break the geometry if not asked.\n\
             3. If the user asks for a feature not in the template, add the necessary EnergyPlus objects.\n\
             4. Use the Weather File provided in the config: {weather}\n\
             5. Remove internal heat loads (People, Lights, ElectricEquipment) if requested.",
            fence = FENCE,
            weather = weather,
        );

        let user = format!(
            "BASE TEMPLATE:\n{}\n\nUSER TASK: {}\nCONFIG: {}\n\nOUTPUT FULL VALID IDF:",
            self.template.content(),
            task_text,
            serde_json::to_string(config)?,
        );

        Ok(GenerationRequest { system, user })
    }

    /// Generate the domain file text with the named backend
    ///
    /// Unknown names fail before any prompt is built or request sent.
    pub async fn generate(&self, task_text: &str, config: &Value, backend_name: &str) -> Result<String> {
        let backend = self.registry.resolve(backend_name)?;
        let request = self.build_prompts(task_text, config)?;

        info!(
            backend = %backend_name,
            prompt_chars = request.user.len(),
            "Generating IDF"
        );

        let raw = backend.generate(&request.system, &request.user).await?;
        let clean = sanitize_output(&raw);

        if clean.is_empty() {
            warn!(backend = %backend_name, raw_chars = raw.len(), "Backend returned no usable content");
            return Err(AppError::Integrity(format!(
                "{} returned no IDF content",
                backend_name
            )));
        }

        Ok(clean)
    }
}

/// Strip surrounding whitespace and a markdown fence wrapper.
///
/// One pass: trim; drop a leading fence line (through the first newline);
/// drop a trailing fence marker; trim again. Passes repeat until the text is
/// stable, so `sanitize_output(sanitize_output(x)) == sanitize_output(x)`.
pub fn sanitize_output(text: &str) -> String {
    let mut current = text.trim().to_string();
    loop {
        let next = sanitize_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn sanitize_once(text: &str) -> String {
    let mut clean = text.trim();
    if clean.starts_with(FENCE) {
        if let Some(newline) = clean.find('\n') {
            clean = &clean[newline + 1..];
        }
    }
    if let Some(stripped) = clean.strip_suffix(FENCE) {
        clean = stripped;
    }
    clean.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::text_generator::mocks::MockTextGenerator;
    use serde_json::json;

    fn generator_with(backends: Vec<Arc<dyn TextGenerator>>, unconfigured: &[&str]) -> ArtifactGenerator {
        let mut registry = BackendRegistry::new();
        for backend in backends {
            registry.register(backend);
        }
        for name in unconfigured {
            registry.mark_unconfigured(*name);
        }
        ArtifactGenerator::new(BaseTemplate::new("Version,23.2;"), Arc::new(registry))
    }

    #[test]
    fn test_sanitize_removes_fence_wrapper() {
        assert_eq!(sanitize_output("```text\nHELLO\n```"), "HELLO");
        assert_eq!(sanitize_output("  ```idf\nA,\n  B;\n```  \n"), "A,\n  B;");
    }

    #[test]
    fn test_sanitize_leaves_plain_text() {
        assert_eq!(sanitize_output("Version,23.2;"), "Version,23.2;");
        assert_eq!(sanitize_output("```"), "");
        assert_eq!(sanitize_output("```Version"), "```Version");
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let samples = [
            "",
            "   ",
            "```",
            "``````",
            "```\n```",
            "```\n```\nX\n```\n```",
            "```text\nHELLO\n```",
            "Zone,\n  Office;   ",
            "```idf\nZone;\n",
            "Zone;\n```",
            "\n\n```json\n{\"a\": 1}\n```\n\n",
        ];
        for sample in samples {
            let once = sanitize_output(sample);
            assert_eq!(sanitize_output(&once), once, "input: {:?}", sample);
        }
    }

    #[test]
    fn test_prompts_carry_template_task_and_weather() {
        let generator = generator_with(vec![], &[]);
        let config = json!({"weatherFilePath": "Golden.epw", "timestep": 4});

        let request = generator.build_prompts("remove the lights", &config).unwrap();

        assert!(request.system.contains("Use the Weather File provided in the config: Golden.epw"));
        assert!(request.system.contains("Do not output markdown code blocks"));
        assert!(request.user.starts_with("BASE TEMPLATE:\nVersion,23.2;"));
        assert!(request.user.contains("USER TASK: remove the lights"));
        assert!(request.user.contains("\"timestep\":4"));
        assert!(request.user.ends_with("OUTPUT FULL VALID IDF:"));
    }

    #[test]
    fn test_prompts_without_weather_say_unknown() {
        let generator = generator_with(vec![], &[]);
        let request = generator.build_prompts("x", &json!({})).unwrap();
        assert!(request.system.contains("config: Unknown"));
    }

    #[tokio::test]
    async fn test_generate_sanitizes_backend_output() {
        let backend = Arc::new(MockTextGenerator::responding("openai", "```idf\nZone;\n```"));
        let generator = generator_with(vec![backend.clone() as Arc<dyn TextGenerator>], &[]);

        let idf = generator.generate("task", &json!({}), "openai").await.unwrap();

        assert_eq!(idf, "Zone;");
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_backend_is_unsupported_without_calls() {
        let backend = Arc::new(MockTextGenerator::responding("openai", "Zone;"));
        let generator = generator_with(vec![backend.clone() as Arc<dyn TextGenerator>], &["gemini"]);

        let err = generator.generate("task", &json!({}), "claude").await.unwrap_err();

        assert!(matches!(err, AppError::UnsupportedRequest(_)));
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unconfigured_backend_is_configuration_error() {
        let generator = generator_with(vec![], &["gemini"]);

        let err = generator.generate("task", &json!({}), "gemini").await.unwrap_err();

        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_backend_failure_keeps_backend_message() {
        let backend = Arc::new(MockTextGenerator::failing("openai", "rate limited"));
        let generator = generator_with(vec![backend as Arc<dyn TextGenerator>], &[]);

        let err = generator.generate("task", &json!({}), "openai").await.unwrap_err();

        assert!(err.to_string().contains("rate limited"));
        assert!(!err.is_configuration());
    }

    #[tokio::test]
    async fn test_empty_output_is_integrity_error() {
        let backend = Arc::new(MockTextGenerator::responding("openai", "```\n```"));
        let generator = generator_with(vec![backend as Arc<dyn TextGenerator>], &[]);

        let err = generator.generate("task", &json!({}), "openai").await.unwrap_err();

        assert!(matches!(err, AppError::Integrity(_)));
    }

    #[tokio::test]
    async fn test_probe_report_covers_every_known_backend() {
        let openai = Arc::new(MockTextGenerator::responding("openai", "hi"));
        let registry = {
            let mut registry = BackendRegistry::new();
            registry.register(openai.clone());
            registry.mark_unconfigured("gemini");
            registry
        };

        let report = registry.probe_all(Duration::from_secs(1)).await;

        assert_eq!(report.backends.get("openai"), Some(&true));
        assert_eq!(report.backends.get("gemini"), Some(&false));
        assert!(report.details.contains("gemini fail: not configured"));
        assert!(!report.all_reachable());
        assert_eq!(openai.probe_calls(), 1);
        assert_eq!(openai.call_count(), 0);
    }
}
