// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type
///
/// The first five variants form the pipeline failure taxonomy; the rest are
/// plumbing errors from the store and the local filesystem.
#[derive(Error, Debug)]
pub enum AppError {
    /// Operator misconfiguration (missing credentials, template, engine). Never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A collaborator reported a failure mid-call
    #[error("Backend error: {0}")]
    Backend(String),

    /// A collaborator reported success but the required output is absent
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Unknown backend name or malformed request. Fails before any side effect.
    #[error("Unsupported request: {0}")]
    UnsupportedRequest(String),

    #[error("{stage} timed out after {after_ms}ms")]
    Timeout { stage: String, after_ms: u64 },

    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Generation error: {0}")]
    Generation(#[from] crate::port::GenerationError),

    #[error("Simulation error: {0}")]
    Simulation(#[from] crate::port::SimulationError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// True for failures caused by operator misconfiguration
    pub fn is_configuration(&self) -> bool {
        match self {
            AppError::Configuration(_) => true,
            AppError::Generation(e) => e.is_configuration(),
            AppError::Simulation(e) => e.is_configuration(),
            _ => false,
        }
    }

    /// Short taxonomy label used in logs
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Configuration(_) => "configuration",
            AppError::Backend(_) => "backend",
            AppError::Integrity(_) => "integrity",
            AppError::UnsupportedRequest(_) => "unsupported_request",
            AppError::Timeout { .. } => "timeout",
            AppError::Generation(e) if e.is_configuration() => "configuration",
            AppError::Simulation(e) if e.is_configuration() => "configuration",
            AppError::Generation(_) | AppError::Simulation(_) => "backend",
            AppError::Database(_) => "database",
            _ => "internal",
        }
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

// Note: sqlx::Error conversion is handled in infra-sqlite crate
// by converting to AppError::Database(String)
