// Application Layer - Use Cases and Business Logic

pub mod generator;
pub mod publisher;
pub mod recovery;
pub mod simulation;
pub mod submission;
pub mod worker;

// Re-exports
pub use generator::{sanitize_output, ArtifactGenerator, BackendRegistry, GenerationRequest, ProbeReport};
pub use publisher::{ArtifactCategory, ResultPublisher};
pub use recovery::RecoveryService;
pub use simulation::{SimulationExecutor, SimulationOutputs};
pub use submission::{SubmissionService, SubmitRequest};
pub use worker::{shutdown_channel, ShutdownSender, ShutdownToken, Worker, WorkerConfig};
