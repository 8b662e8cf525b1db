// Simulation Engine Port
// Abstraction over the physical simulation binary (EnergyPlus in production)

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Simulation engine errors
#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("simulation engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("simulation failed: {0}")]
    Failed(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl SimulationError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, SimulationError::EngineUnavailable(_))
    }
}

/// An output file the engine leaves in its output directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputArtifact {
    /// Key in the result map (`sql`, `html`, ...)
    pub name: &'static str,
    /// File name inside the output directory
    pub file_name: &'static str,
    /// Missing required artifacts fail the run
    pub required: bool,
}

/// Model handed to the engine: two input files plus run options
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationModel {
    pub idf_path: PathBuf,
    pub weather_path: PathBuf,
    pub structured_outputs: Vec<String>,
    pub parameters: Map<String, Value>,
}

impl SimulationModel {
    pub fn new(idf_path: impl Into<PathBuf>, weather_path: impl Into<PathBuf>) -> Self {
        Self {
            idf_path: idf_path.into(),
            weather_path: weather_path.into(),
            structured_outputs: Vec::new(),
            parameters: Map::new(),
        }
    }

    pub fn with_parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Enable a structured-output mode; returns false when it was already on
    pub fn ensure_output(&mut self, mode: &str) -> bool {
        if self.structured_outputs.iter().any(|m| m == mode) {
            return false;
        }
        self.structured_outputs.push(mode.to_string());
        true
    }
}

/// Simulation engine
///
/// Implementations write into a single deterministic output directory, so
/// callers must never run two simulations against the same engine at once.
#[async_trait]
pub trait SimulationEngine: Send + Sync {
    /// Directory the engine writes its outputs into
    fn output_dir(&self) -> &Path;

    /// Structured-output mode the executor must enable before every run
    fn structured_output(&self) -> &str;

    /// Artifacts a successful run produces; the first one is primary
    fn outputs(&self) -> &[OutputArtifact];

    /// Check that the engine is installed and runnable
    async fn check_available(&self) -> Result<(), SimulationError>;

    /// Run the simulation to completion
    async fn execute(&self, model: &SimulationModel) -> Result<(), SimulationError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Mock engine behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Write these files (relative to the output dir) and succeed
        Produce(Vec<String>),
        /// Report success without writing anything
        SucceedEmpty,
        /// Fail with an engine error
        Fail(String),
        /// Engine not installed
        Unavailable,
        /// Panic inside execute
        Panic(String),
        /// Never return
        Hang,
        /// Sleep, then write `eplusout.sql` and succeed
        Delay(std::time::Duration),
    }

    pub const MOCK_OUTPUTS: &[OutputArtifact] = &[
        OutputArtifact {
            name: "sql",
            file_name: "eplusout.sql",
            required: true,
        },
        OutputArtifact {
            name: "html",
            file_name: "eplustbl.htm",
            required: false,
        },
    ];

    /// Mock engine writing real files into a real output directory
    pub struct MockSimulationEngine {
        output_dir: PathBuf,
        behavior: Arc<Mutex<MockBehavior>>,
        models: Arc<Mutex<Vec<SimulationModel>>>,
    }

    impl MockSimulationEngine {
        pub fn new(output_dir: impl Into<PathBuf>, behavior: MockBehavior) -> Self {
            Self {
                output_dir: output_dir.into(),
                behavior: Arc::new(Mutex::new(behavior)),
                models: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn producing_sql(output_dir: impl Into<PathBuf>) -> Self {
            Self::new(
                output_dir,
                MockBehavior::Produce(vec!["eplusout.sql".to_string()]),
            )
        }

        pub fn set_behavior(&self, behavior: MockBehavior) {
            *self.behavior.lock().unwrap() = behavior;
        }

        pub fn call_count(&self) -> usize {
            self.models.lock().unwrap().len()
        }

        pub fn last_model(&self) -> Option<SimulationModel> {
            self.models.lock().unwrap().last().cloned()
        }
    }

    #[async_trait]
    impl SimulationEngine for MockSimulationEngine {
        fn output_dir(&self) -> &Path {
            &self.output_dir
        }

        fn structured_output(&self) -> &str {
            "SQLite"
        }

        fn outputs(&self) -> &[OutputArtifact] {
            MOCK_OUTPUTS
        }

        async fn check_available(&self) -> Result<(), SimulationError> {
            match &*self.behavior.lock().unwrap() {
                MockBehavior::Unavailable => Err(SimulationError::EngineUnavailable(
                    "mock engine not installed".to_string(),
                )),
                _ => Ok(()),
            }
        }

        async fn execute(&self, model: &SimulationModel) -> Result<(), SimulationError> {
            self.models.lock().unwrap().push(model.clone());
            let behavior = self.behavior.lock().unwrap().clone();
            match behavior {
                MockBehavior::Produce(files) => {
                    tokio::fs::create_dir_all(&self.output_dir)
                        .await
                        .map_err(|e| SimulationError::Io(e.to_string()))?;
                    for file in files {
                        tokio::fs::write(self.output_dir.join(&file), b"mock output")
                            .await
                            .map_err(|e| SimulationError::Io(e.to_string()))?;
                    }
                    Ok(())
                }
                MockBehavior::SucceedEmpty => Ok(()),
                MockBehavior::Fail(message) => Err(SimulationError::Failed(message)),
                MockBehavior::Unavailable => Err(SimulationError::EngineUnavailable(
                    "mock engine not installed".to_string(),
                )),
                MockBehavior::Panic(message) => panic!("{}", message),
                MockBehavior::Hang => std::future::pending().await,
                MockBehavior::Delay(duration) => {
                    tokio::time::sleep(duration).await;
                    tokio::fs::create_dir_all(&self.output_dir)
                        .await
                        .map_err(|e| SimulationError::Io(e.to_string()))?;
                    tokio::fs::write(self.output_dir.join("eplusout.sql"), b"mock output")
                        .await
                        .map_err(|e| SimulationError::Io(e.to_string()))
                }
            }
        }
    }
}
