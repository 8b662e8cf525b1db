// Job Domain Model

use crate::domain::error::{DomainError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

/// Job ID (opaque, assigned by the requester)
pub type JobId = String;

/// Job Status (wire values are shared with the requester UI)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    TestConnection,
    Processing,
    Done,
    Error,
}

impl JobStatus {
    /// Statuses a worker may claim from
    pub const CLAIMABLE: [JobStatus; 2] = [JobStatus::Queued, JobStatus::TestConnection];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::TestConnection => "test_connection",
            JobStatus::Processing => "processing",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }

    pub fn is_claimable(&self) -> bool {
        Self::CLAIMABLE.contains(self)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "test_connection" => Ok(JobStatus::TestConnection),
            "processing" => Ok(JobStatus::Processing),
            "done" => Ok(JobStatus::Done),
            "error" => Ok(JobStatus::Error),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

/// Which path `process` takes for a claimed job.
///
/// Derived from the status the job was submitted with and persisted, because
/// the claim overwrites the status with `processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Simulation,
    ConnectionTest,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Simulation => "simulation",
            JobKind::ConnectionTest => "connection_test",
        }
    }

    /// Status a job of this kind waits in before it is claimed
    pub fn initial_status(&self) -> JobStatus {
        match self {
            JobKind::Simulation => JobStatus::Queued,
            JobKind::ConnectionTest => JobStatus::TestConnection,
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "simulation" => Ok(JobKind::Simulation),
            "connection_test" => Ok(JobKind::ConnectionTest),
            other => Err(DomainError::ValidationError(format!(
                "unknown job kind: {}",
                other
            ))),
        }
    }
}

/// Natural-language request plus structured simulation configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    /// What the requester wants changed in the base template
    pub text: String,

    /// Weather file reference (file name inside the weather directory, or a path)
    #[serde(default, rename = "weatherFilePath")]
    pub weather_file: Option<String>,

    /// Named generation backend (`openai`, `gemini`, ...)
    #[serde(default)]
    pub backend: Option<String>,

    /// Arbitrary simulation parameters
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

impl JobRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_weather_file(mut self, weather_file: impl Into<String>) -> Self {
        self.weather_file = Some(weather_file.into());
        self
    }

    pub fn with_backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = Some(backend.into());
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Serialized configuration view handed to the generation prompt
    pub fn config_view(&self, weather_file: &str) -> Value {
        let mut config = self.parameters.clone();
        config.insert(
            "weatherFilePath".to_string(),
            Value::String(weather_file.to_string()),
        );
        Value::Object(config)
    }
}

/// Job Entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,

    pub created_at: i64, // epoch ms, FIFO key
    pub updated_at: i64, // epoch ms, stamped on every transition

    pub request: JobRequest,

    // Outcome (mutually exclusive, absent while non-terminal)
    pub error_message: Option<String>,
    pub result_path: Option<String>,

    // Outcome details
    pub result_summary: Option<String>, // JSON probe report for connection tests
    pub idf_path: Option<String>,       // Storage reference of the generated input
    pub artifacts: Vec<String>,         // All storage references of a finished job

    // Claim ownership
    pub claimed_by: Option<String>,
    pub claimed_at: Option<i64>,
}

impl Job {
    /// Create a new simulation job in `queued` status
    ///
    /// # Arguments
    ///
    /// * `id` - Unique job ID (injected, not generated)
    /// * `created_at` - Creation timestamp in epoch ms (injected, not system time)
    /// * `request` - What to generate and simulate
    pub fn new(id: impl Into<String>, created_at: i64, request: JobRequest) -> Self {
        Self::with_kind(id, created_at, JobKind::Simulation, request)
    }

    /// Create a connectivity check job in `test_connection` status
    pub fn new_connection_test(id: impl Into<String>, created_at: i64) -> Self {
        Self::with_kind(
            id,
            created_at,
            JobKind::ConnectionTest,
            JobRequest::new("connection test"),
        )
    }

    fn with_kind(
        id: impl Into<String>,
        created_at: i64,
        kind: JobKind,
        request: JobRequest,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            status: kind.initial_status(),
            created_at,
            updated_at: created_at,
            request,
            error_message: None,
            result_path: None,
            result_summary: None,
            idf_path: None,
            artifacts: Vec::new(),
            claimed_by: None,
            claimed_at: None,
        }
    }

    /// Create a test job with deterministic ID and timestamp.
    ///
    /// Uses a simple counter (test-1, test-2, ...); timestamps start at 1000
    /// and increment by 1000. Production code injects ID and time via providers.
    pub fn new_test(request: JobRequest) -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static TEST_COUNTER: AtomicU64 = AtomicU64::new(1);

        let counter = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        Self::new(format!("test-{}", counter), (counter * 1000) as i64, request)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// `error_message` and `result_path` never coexist and only appear once terminal
    pub fn invariant_holds(&self) -> bool {
        match self.status {
            JobStatus::Done => self.error_message.is_none(),
            JobStatus::Error => self.error_message.is_some() && self.result_path.is_none(),
            _ => self.error_message.is_none() && self.result_path.is_none(),
        }
    }

    /// Transition to `processing` on behalf of `worker_id`
    pub fn claim(&mut self, now_millis: i64, worker_id: &str) -> Result<()> {
        if !self.status.is_claimable() {
            return Err(self.transition_error(JobStatus::Processing));
        }
        self.status = JobStatus::Processing;
        self.updated_at = now_millis;
        self.claimed_at = Some(now_millis);
        self.claimed_by = Some(worker_id.to_string());
        Ok(())
    }

    /// Transition to `done` with the primary artifact reference
    pub fn complete(
        &mut self,
        now_millis: i64,
        result_path: String,
        idf_path: Option<String>,
        artifacts: Vec<String>,
    ) -> Result<()> {
        self.ensure_processing(JobStatus::Done)?;
        self.status = JobStatus::Done;
        self.updated_at = now_millis;
        self.result_path = Some(result_path);
        self.idf_path = idf_path;
        self.artifacts = artifacts;
        self.error_message = None;
        Ok(())
    }

    /// Transition to `done` for a connection test, recording the probe report
    pub fn complete_probe(&mut self, now_millis: i64, summary: String) -> Result<()> {
        self.ensure_processing(JobStatus::Done)?;
        self.status = JobStatus::Done;
        self.updated_at = now_millis;
        self.result_summary = Some(summary);
        self.error_message = None;
        self.result_path = None;
        Ok(())
    }

    /// Transition to `error`; partial outputs are dropped
    pub fn fail(&mut self, now_millis: i64, message: impl Into<String>) -> Result<()> {
        self.ensure_processing(JobStatus::Error)?;
        let message = message.into();
        self.status = JobStatus::Error;
        self.updated_at = now_millis;
        self.error_message = Some(if message.trim().is_empty() {
            "unknown error".to_string()
        } else {
            message
        });
        self.result_path = None;
        self.idf_path = None;
        self.artifacts.clear();
        Ok(())
    }

    /// Put an orphaned `processing` job back into its eligible status
    pub fn requeue(&mut self, now_millis: i64) -> Result<()> {
        self.ensure_processing(self.kind.initial_status())?;
        self.status = self.kind.initial_status();
        self.updated_at = now_millis;
        self.claimed_by = None;
        self.claimed_at = None;
        Ok(())
    }

    fn ensure_processing(&self, to: JobStatus) -> Result<()> {
        if self.status != JobStatus::Processing {
            return Err(self.transition_error(to));
        }
        Ok(())
    }

    fn transition_error(&self, to: JobStatus) -> DomainError {
        DomainError::InvalidStateTransition {
            from: self.status.to_string(),
            to: to.to_string(),
        }
    }
}
