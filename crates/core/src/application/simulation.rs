// Simulation Executor - runs the engine against a generated input file

use crate::error::{AppError, Result};
use crate::port::{SimulationEngine, SimulationModel};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Output artifacts of one successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationOutputs {
    /// Name of the primary artifact (key into `artifacts`)
    pub primary: String,
    /// Artifact name -> local path
    pub artifacts: BTreeMap<String, PathBuf>,
}

impl SimulationOutputs {
    pub fn primary_path(&self) -> Option<&Path> {
        self.artifacts.get(&self.primary).map(PathBuf::as_path)
    }
}

/// Drives a `SimulationEngine` through one run
///
/// Sequence: check engine -> check inputs -> reset output dir -> load model ->
/// enable structured output -> execute -> verify artifacts.
pub struct SimulationExecutor {
    engine: Arc<dyn SimulationEngine>,
}

impl SimulationExecutor {
    pub fn new(engine: Arc<dyn SimulationEngine>) -> Self {
        Self { engine }
    }

    pub fn output_dir(&self) -> &Path {
        self.engine.output_dir()
    }

    pub async fn run(
        &self,
        idf_path: &Path,
        weather_path: &Path,
        parameters: &Map<String, Value>,
    ) -> Result<SimulationOutputs> {
        self.engine.check_available().await?;

        for input in [idf_path, weather_path] {
            if !tokio::fs::try_exists(input).await.unwrap_or(false) {
                return Err(AppError::NotFound(format!(
                    "simulation input {} does not exist",
                    input.display()
                )));
            }
        }

        self.reset_output_dir().await?;

        let mut model =
            SimulationModel::new(idf_path, weather_path).with_parameters(parameters.clone());
        if model.ensure_output(self.engine.structured_output()) {
            debug!(mode = %self.engine.structured_output(), "Structured output enabled");
        }

        info!(
            idf = %idf_path.display(),
            weather = %weather_path.display(),
            output_dir = %self.engine.output_dir().display(),
            "Starting simulation"
        );
        self.engine.execute(&model).await?;

        let outputs = self.collect_outputs().await?;
        info!(artifacts = ?outputs.artifacts.keys().collect::<Vec<_>>(), "Simulation complete");
        Ok(outputs)
    }

    /// Remove every file a previous run left behind
    async fn reset_output_dir(&self) -> Result<()> {
        let dir = self.engine.output_dir();
        match tokio::fs::remove_dir_all(dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tokio::fs::create_dir_all(dir).await?;
        Ok(())
    }

    async fn collect_outputs(&self) -> Result<SimulationOutputs> {
        let declared = self.engine.outputs();
        let primary = declared
            .first()
            .ok_or_else(|| AppError::Internal("engine declares no outputs".to_string()))?;

        let mut artifacts = BTreeMap::new();
        for artifact in declared {
            let path = self.engine.output_dir().join(artifact.file_name);
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                artifacts.insert(artifact.name.to_string(), path);
            } else if artifact.required || artifact.name == primary.name {
                return Err(AppError::Integrity(format!(
                    "simulation finished but '{}' was not created",
                    artifact.file_name
                )));
            }
        }

        Ok(SimulationOutputs {
            primary: primary.name.to_string(),
            artifacts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::simulation_engine::mocks::{MockBehavior, MockSimulationEngine};
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        idf: PathBuf,
        epw: PathBuf,
        out: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let idf = dir.path().join("in.idf");
        let epw = dir.path().join("weather.epw");
        std::fs::write(&idf, "Version,23.2;").unwrap();
        std::fs::write(&epw, "LOCATION,Golden").unwrap();
        let out = dir.path().join("eplus_out");
        Fixture {
            _dir: dir,
            idf,
            epw,
            out,
        }
    }

    fn listing(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_run_returns_primary_artifact() {
        let fx = fixture();
        let engine = Arc::new(MockSimulationEngine::producing_sql(&fx.out));
        let executor = SimulationExecutor::new(engine.clone());

        let outputs = executor.run(&fx.idf, &fx.epw, &Map::new()).await.unwrap();

        assert_eq!(outputs.primary, "sql");
        assert_eq!(outputs.primary_path(), Some(fx.out.join("eplusout.sql").as_path()));
        assert!(!outputs.artifacts.contains_key("html"));

        let model = engine.last_model().unwrap();
        assert_eq!(model.structured_outputs, vec!["SQLite".to_string()]);
    }

    #[tokio::test]
    async fn test_second_run_does_not_see_first_run_files() {
        let fx = fixture();
        let engine = Arc::new(MockSimulationEngine::new(
            &fx.out,
            MockBehavior::Produce(vec!["eplusout.sql".into(), "eplustbl.htm".into(), "stale.csv".into()]),
        ));
        let executor = SimulationExecutor::new(engine.clone());
        executor.run(&fx.idf, &fx.epw, &Map::new()).await.unwrap();

        engine.set_behavior(MockBehavior::Produce(vec!["eplusout.sql".into()]));
        let outputs = executor.run(&fx.idf, &fx.epw, &Map::new()).await.unwrap();

        assert_eq!(listing(&fx.out), vec!["eplusout.sql".to_string()]);
        assert_eq!(outputs.artifacts.len(), 1);
    }

    #[tokio::test]
    async fn test_success_without_primary_output_is_integrity_error() {
        let fx = fixture();
        std::fs::create_dir_all(&fx.out).unwrap();
        std::fs::write(fx.out.join("eplusout.sql"), "from an earlier run").unwrap();
        let engine = Arc::new(MockSimulationEngine::new(&fx.out, MockBehavior::SucceedEmpty));
        let executor = SimulationExecutor::new(engine);

        let err = executor.run(&fx.idf, &fx.epw, &Map::new()).await.unwrap_err();

        assert!(matches!(err, AppError::Integrity(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn test_engine_error_propagates() {
        let fx = fixture();
        let engine = Arc::new(MockSimulationEngine::new(
            &fx.out,
            MockBehavior::Fail("Fatal: severe errors".into()),
        ));
        let executor = SimulationExecutor::new(engine);

        let err = executor.run(&fx.idf, &fx.epw, &Map::new()).await.unwrap_err();

        assert!(err.to_string().contains("Fatal: severe errors"));
        assert!(!err.is_configuration());
    }

    #[tokio::test]
    async fn test_unavailable_engine_is_configuration_error() {
        let fx = fixture();
        let engine = Arc::new(MockSimulationEngine::new(&fx.out, MockBehavior::Unavailable));
        let executor = SimulationExecutor::new(engine.clone());

        let err = executor.run(&fx.idf, &fx.epw, &Map::new()).await.unwrap_err();

        assert!(err.is_configuration());
        assert_eq!(engine.call_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_weather_file_fails_before_execute() {
        let fx = fixture();
        let engine = Arc::new(MockSimulationEngine::producing_sql(&fx.out));
        let executor = SimulationExecutor::new(engine.clone());

        let err = executor
            .run(&fx.idf, &fx.out.join("nowhere.epw"), &Map::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(engine.call_count(), 0);
    }
}
