// Domain Layer - Pure business logic and entities

pub mod error;
pub mod job;
pub mod template;

// Re-exports
pub use error::DomainError;
pub use job::{Job, JobId, JobKind, JobRequest, JobStatus};
pub use template::BaseTemplate;
