// Submit Use Case (requester side of the queue)

use crate::domain::{Job, JobRequest};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, JobRepository, TimeProvider};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

const MAX_TEXT_LEN: usize = 8_000;
const MAX_BACKEND_NAME_LEN: usize = 32;

/// Submission as the requester UI sends it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub nlp_input_text: String,

    #[serde(default)]
    pub weather_file_path: Option<String>,

    #[serde(default)]
    pub backend: Option<String>,

    /// Must be a JSON object when present
    #[serde(default)]
    pub simulation_config: Option<Value>,
}

impl SubmitRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            nlp_input_text: text.into(),
            weather_file_path: None,
            backend: None,
            simulation_config: None,
        }
    }
}

/// Validate a submission before anything is written
pub(crate) fn validate_request(req: &SubmitRequest) -> Result<()> {
    let text = req.nlp_input_text.trim();
    if text.is_empty() {
        return Err(AppError::Validation("request text cannot be empty".to_string()));
    }
    if text.len() > MAX_TEXT_LEN {
        return Err(AppError::Validation(format!(
            "request text too long ({} > {} bytes)",
            text.len(),
            MAX_TEXT_LEN
        )));
    }

    if let Some(backend) = &req.backend {
        if backend.trim().is_empty() {
            return Err(AppError::Validation("backend name cannot be empty".to_string()));
        }
        if backend.len() > MAX_BACKEND_NAME_LEN
            || !backend
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(AppError::Validation(format!(
                "backend name '{}' must be alphanumeric (max {} chars)",
                backend, MAX_BACKEND_NAME_LEN
            )));
        }
    }

    match &req.simulation_config {
        None | Some(Value::Object(_)) => Ok(()),
        Some(other) => Err(AppError::Validation(format!(
            "simulation config must be a JSON object, got {}",
            json_kind(other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn into_job_request(req: SubmitRequest) -> JobRequest {
    let mut request = JobRequest::new(req.nlp_input_text.trim());
    request.weather_file = req.weather_file_path.filter(|w| !w.trim().is_empty());
    request.backend = req.backend;
    if let Some(Value::Object(parameters)) = req.simulation_config {
        request.parameters = parameters;
    }
    request
}

/// Create a `queued` simulation job
pub async fn execute(
    job_repo: &dyn JobRepository,
    id_provider: &dyn IdProvider,
    time_provider: &dyn TimeProvider,
    req: SubmitRequest,
) -> Result<String> {
    validate_request(&req)?;

    let job = Job::new(
        id_provider.generate_id(),
        time_provider.now_millis(),
        into_job_request(req),
    );
    job_repo.insert(&job).await?;

    info!(job_id = %job.id, backend = ?job.request.backend, "Job submitted");
    Ok(job.id)
}

/// Create a `test_connection` job
pub async fn execute_connection_test(
    job_repo: &dyn JobRepository,
    id_provider: &dyn IdProvider,
    time_provider: &dyn TimeProvider,
) -> Result<String> {
    let job = Job::new_connection_test(id_provider.generate_id(), time_provider.now_millis());
    job_repo.insert(&job).await?;

    info!(job_id = %job.id, "Connection test submitted");
    Ok(job.id)
}
