// EnergyPlus engine (subprocess)
// reason: tokio::process for async child management, kill_on_drop so a stage
// timeout in the worker also stops the simulation
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use smarthvac_core::port::{
    OutputArtifact, SimulationEngine, SimulationError, SimulationModel, TimeProvider,
};

/// Structured-output mode the executor enables before each run
pub const STRUCTURED_OUTPUT: &str = "SQLite";

const SQLITE_OUTPUT_OBJECT: &str = "Output:SQLite,\n    SimpleAndTabular;        !- Option Type\n";

/// Primary artifact first
pub const ENERGYPLUS_OUTPUTS: &[OutputArtifact] = &[
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
    OutputArtifact {
        name: "csv",
        file_name: "eplusout.csv",
        required: false,
    },
    OutputArtifact {
        name: "err",
        file_name: "eplusout.err",
        required: false,
    },
];

const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(30);
const ERROR_TAIL_CHARS: usize = 2_000;

/// Runs `energyplus -w <epw> -d <output_dir> [flags] <idf>`
///
/// The input IDF is never modified; a staged copy next to it carries any
/// output objects the run needs.
pub struct EnergyPlusEngine {
    binary: PathBuf,
    output_dir: PathBuf,
    env_allowlist: Vec<String>,
    time_provider: Arc<dyn TimeProvider>,
}

impl EnergyPlusEngine {
    /// # Example
    /// ```ignore
    /// let engine = EnergyPlusEngine::new(
    ///     "/usr/local/EnergyPlus-23-2-0/energyplus",
    ///     "/var/lib/smarthvac/eplus_out",
    ///     Arc::new(SystemTimeProvider),
    /// );
    /// ```
    pub fn new(
        binary: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            binary: binary.into(),
            output_dir: output_dir.into(),
            env_allowlist: vec![
                "PATH".to_string(),
                "HOME".to_string(),
                "LANG".to_string(),
                "ENERGYPLUS_DIR".to_string(),
            ],
            time_provider,
        }
    }

    /// Replace the environment variables passed through to the child
    pub fn with_env_allowlist(mut self, allowlist: Vec<String>) -> Self {
        self.env_allowlist = allowlist;
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn filtered_env(&self) -> HashMap<String, String> {
        std::env::vars()
            .filter(|(k, _)| self.env_allowlist.contains(k))
            .collect()
    }

    fn spawn_error(&self, err: std::io::Error) -> SimulationError {
        if err.kind() == std::io::ErrorKind::NotFound
            || err.kind() == std::io::ErrorKind::PermissionDenied
        {
            SimulationError::EngineUnavailable(format!(
                "{} cannot be started: {}",
                self.binary.display(),
                err
            ))
        } else {
            SimulationError::Io(err.to_string())
        }
    }

    /// Command line flags derived from the run parameters
    fn run_flags(model: &SimulationModel) -> Vec<&'static str> {
        let enabled = |key: &str| {
            model
                .parameters
                .get(key)
                .and_then(|v| v.as_bool())
                .unwrap_or(false)
        };

        let mut flags = Vec::new();
        if enabled("annual") {
            flags.push("--annual");
        }
        if enabled("designDay") {
            flags.push("--design-day");
        }
        if enabled("readVars") {
            flags.push("--readvars");
        }
        if enabled("expandObjects") {
            flags.push("--expandobjects");
        }
        flags
    }

    /// Copy the model IDF with the requested output objects appended
    async fn stage_idf(&self, model: &SimulationModel) -> Result<PathBuf, SimulationError> {
        let source = tokio::fs::read_to_string(&model.idf_path)
            .await
            .map_err(|e| {
                SimulationError::Io(format!("reading {}: {}", model.idf_path.display(), e))
            })?;

        let mut staged = source;
        for mode in &model.structured_outputs {
            if mode == STRUCTURED_OUTPUT {
                staged = ensure_sqlite_output(&staged);
            } else {
                warn!(mode = %mode, "Unknown structured output mode ignored");
            }
        }

        let staged_path = model.idf_path.with_extension("run.idf");
        tokio::fs::write(&staged_path, staged)
            .await
            .map_err(|e| SimulationError::Io(format!("writing {}: {}", staged_path.display(), e)))?;
        Ok(staged_path)
    }

    /// Last part of stderr, or of `eplusout.err` when stderr is empty
    async fn failure_detail(&self, stderr: &[u8]) -> String {
        let stderr = String::from_utf8_lossy(stderr);
        if !stderr.trim().is_empty() {
            return tail(stderr.trim(), ERROR_TAIL_CHARS);
        }
        match tokio::fs::read_to_string(self.output_dir.join("eplusout.err")).await {
            Ok(err_file) if !err_file.trim().is_empty() => tail(err_file.trim(), ERROR_TAIL_CHARS),
            _ => "no diagnostics produced".to_string(),
        }
    }
}

/// Append `Output:SQLite` unless the IDF already declares one
pub fn ensure_sqlite_output(idf: &str) -> String {
    let declared = idf.lines().any(|line| {
        let code = line.split('!').next().unwrap_or("").trim();
        code.to_ascii_lowercase().starts_with("output:sqlite")
    });
    if declared {
        return idf.to_string();
    }

    let mut staged = idf.trim_end().to_string();
    staged.push_str("\n\n");
    staged.push_str(SQLITE_OUTPUT_OBJECT);
    staged
}

fn tail(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    if count <= max_chars {
        return text.to_string();
    }
    let skipped: String = text.chars().skip(count - max_chars).collect();
    format!("...{}", skipped)
}

#[async_trait]
impl SimulationEngine for EnergyPlusEngine {
    fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn structured_output(&self) -> &str {
        STRUCTURED_OUTPUT
    }

    fn outputs(&self) -> &[OutputArtifact] {
        ENERGYPLUS_OUTPUTS
    }

    async fn check_available(&self) -> Result<(), SimulationError> {
        let child = Command::new(&self.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        match timeout(VERSION_CHECK_TIMEOUT, child.wait_with_output()).await {
            Ok(Ok(output)) if output.status.success() => {
                debug!(
                    version = %String::from_utf8_lossy(&output.stdout).trim(),
                    "EnergyPlus available"
                );
                Ok(())
            }
            Ok(Ok(output)) => Err(SimulationError::EngineUnavailable(format!(
                "{} --version exited with {}",
                self.binary.display(),
                output.status
            ))),
            Ok(Err(e)) => Err(SimulationError::Io(e.to_string())),
            Err(_) => Err(SimulationError::EngineUnavailable(format!(
                "{} --version did not answer within {}s",
                self.binary.display(),
                VERSION_CHECK_TIMEOUT.as_secs()
            ))),
        }
    }

    async fn execute(&self, model: &SimulationModel) -> Result<(), SimulationError> {
        let staged = self.stage_idf(model).await?;
        let flags = Self::run_flags(model);
        let start_time = self.time_provider.now_millis();

        info!(
            binary = %self.binary.display(),
            idf = %staged.display(),
            weather = %model.weather_path.display(),
            output_dir = %self.output_dir.display(),
            flags = ?flags,
            "Starting EnergyPlus"
        );

        let child = Command::new(&self.binary)
            .arg("-w")
            .arg(&model.weather_path)
            .arg("-d")
            .arg(&self.output_dir)
            .args(&flags)
            .arg(&staged)
            .env_clear()
            .envs(self.filtered_env())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| SimulationError::Io(e.to_string()))?;

        let duration_ms = self.time_provider.now_millis() - start_time;
        info!(
            duration_ms = %duration_ms,
            exit_code = ?output.status.code(),
            "EnergyPlus finished"
        );

        if !output.status.success() {
            let detail = self.failure_detail(&output.stderr).await;
            return Err(SimulationError::Failed(format!(
                "energyplus exited with {}: {}",
                output
                    .status
                    .code()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".to_string()),
                detail
            )));
        }
        Ok(())
    }
}
