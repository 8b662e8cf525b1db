// Port Layer - Interfaces for external collaborators

pub mod blob_store;
pub mod id_provider; // For deterministic testing
pub mod job_repository;
pub mod simulation_engine;
pub mod text_generator;
pub mod time_provider;

// Re-exports
pub use blob_store::BlobStore;
pub use id_provider::IdProvider;
pub use job_repository::JobRepository;
pub use simulation_engine::{OutputArtifact, SimulationEngine, SimulationError, SimulationModel};
pub use text_generator::{GenerationError, TextGenerator};
pub use time_provider::TimeProvider;
