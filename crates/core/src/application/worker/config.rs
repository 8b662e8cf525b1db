// Worker configuration (loaded once at startup, immutable afterwards)

use super::constants::*;
use crate::error::{AppError, Result};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Recorded as `claimed_by` on every claimed job
    pub worker_id: String,

    /// Backend used when a request names none
    pub default_backend: String,

    /// Directory weather file names are resolved against
    pub weather_dir: PathBuf,

    /// Weather file used when a request names none
    pub default_weather_file: Option<String>,

    /// Parent of the per-job work directories
    pub work_dir: PathBuf,

    pub poll_interval: Duration,
    pub generation_timeout: Duration,
    pub simulation_timeout: Duration,
    pub publish_timeout: Duration,

    /// Interval between `updated_at` refreshes while a job runs
    pub heartbeat_interval: Duration,

    /// Stop the loop (instead of only flagging) after a configuration failure
    pub halt_on_configuration_error: bool,
}

impl WorkerConfig {
    pub fn new(worker_id: impl Into<String>, work_dir: impl Into<PathBuf>) -> Self {
        let work_dir = work_dir.into();
        Self {
            worker_id: worker_id.into(),
            default_backend: "openai".to_string(),
            weather_dir: work_dir.join("weather"),
            default_weather_file: None,
            work_dir,
            poll_interval: DEFAULT_POLL_INTERVAL,
            generation_timeout: DEFAULT_GENERATION_TIMEOUT,
            simulation_timeout: DEFAULT_SIMULATION_TIMEOUT,
            publish_timeout: DEFAULT_PUBLISH_TIMEOUT,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            halt_on_configuration_error: false,
        }
    }

    /// Weather reference a request resolves to (request value or default)
    pub fn weather_reference<'a>(&'a self, requested: Option<&'a str>) -> Option<&'a str> {
        requested
            .filter(|w| !w.trim().is_empty())
            .or(self.default_weather_file.as_deref())
    }

    /// Bare names live in `weather_dir`; anything with a separator is a path
    pub fn resolve_weather_path(&self, reference: &str) -> PathBuf {
        let candidate = Path::new(reference);
        if candidate.is_absolute() || candidate.components().count() > 1 {
            candidate.to_path_buf()
        } else {
            self.weather_dir.join(reference)
        }
    }

    /// Work directory of one job; the id must be a single plain path segment
    pub fn job_dir(&self, job_id: &str) -> Result<PathBuf> {
        let mut components = Path::new(job_id).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.work_dir.join(job_id)),
            _ => Err(AppError::UnsupportedRequest(format!(
                "job id '{}' is not a valid directory name",
                job_id
            ))),
        }
    }
}
