// Daemon configuration, read once from `SMARTHVAC_*` environment variables

use anyhow::{anyhow, bail, Result};
use smarthvac_core::application::worker::constants::{
    DEFAULT_GENERATION_TIMEOUT, DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_POLL_INTERVAL,
    DEFAULT_PUBLISH_TIMEOUT, DEFAULT_SIMULATION_TIMEOUT, DEFAULT_STALE_AFTER,
};
use smarthvac_core::application::WorkerConfig;
use smarthvac_infra_llm::LlmSettings;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_DB_PATH: &str = "~/.smarthvac/jobs.db";
const DEFAULT_SECRETS_PATH: &str = "secrets.json";
const DEFAULT_TEMPLATE_PATH: &str = "templates/Base.idf";
const DEFAULT_WEATHER_DIR: &str = "weather";
const DEFAULT_WORK_DIR: &str = "~/.smarthvac/work";
const DEFAULT_BLOB_ROOT: &str = "~/.smarthvac/blobs";
const DEFAULT_ENERGYPLUS_BIN: &str = "energyplus";
const DEFAULT_BACKEND: &str = "openai";

/// Heartbeats a live job may miss before recovery treats it as orphaned
const MISSED_HEARTBEATS_BEFORE_STALE: u32 = 3;

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub db_path: PathBuf,
    pub secrets_path: PathBuf,
    pub template_path: PathBuf,
    pub blob_root: PathBuf,
    pub energyplus_bin: PathBuf,
    /// Simulation output directory; one per worker process
    pub output_dir: PathBuf,
    pub stale_after: Duration,
    pub worker: WorkerConfig,
    pub llm: LlmSettings,
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (environment in production, a map in tests)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str| {
            lookup(&format!("SMARTHVAC_{}", name)).filter(|v| !v.trim().is_empty())
        };
        let path = |name: &str, default: &str| expand(&get(name).unwrap_or_else(|| default.to_string()));

        let worker_id = get("WORKER_ID").unwrap_or_else(|| format!("worker-{}", std::process::id()));
        let work_dir = path("WORK_DIR", DEFAULT_WORK_DIR);
        let output_dir = get("OUTPUT_DIR")
            .map(|v| expand(&v))
            .unwrap_or_else(|| work_dir.join("eplus_out").join(&worker_id));

        let mut worker = WorkerConfig::new(worker_id, work_dir);
        worker.default_backend = get("DEFAULT_BACKEND").unwrap_or_else(|| DEFAULT_BACKEND.to_string());
        worker.weather_dir = path("WEATHER_DIR", DEFAULT_WEATHER_DIR);
        worker.default_weather_file = get("DEFAULT_WEATHER");
        worker.poll_interval = millis(&get, "POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL)?;
        worker.generation_timeout = secs(&get, "GENERATION_TIMEOUT_SECS", DEFAULT_GENERATION_TIMEOUT)?;
        worker.simulation_timeout = secs(&get, "SIMULATION_TIMEOUT_SECS", DEFAULT_SIMULATION_TIMEOUT)?;
        worker.publish_timeout = secs(&get, "PUBLISH_TIMEOUT_SECS", DEFAULT_PUBLISH_TIMEOUT)?;
        worker.heartbeat_interval = secs(&get, "HEARTBEAT_SECS", DEFAULT_HEARTBEAT_INTERVAL)?;
        worker.halt_on_configuration_error = parse(&get, "HALT_ON_CONFIG_ERROR")?.unwrap_or(false);

        let mut llm = LlmSettings::default();
        if let Some(url) = get("OPENAI_BASE_URL") {
            llm.openai.base_url = url;
        }
        if let Some(model) = get("OPENAI_MODEL") {
            llm.openai.model = model;
        }
        if let Some(url) = get("GEMINI_BASE_URL") {
            llm.gemini.base_url = url;
        }
        if let Some(model) = get("GEMINI_MODEL") {
            llm.gemini.model = model;
        }
        // The HTTP client timeout tracks the generation stage budget
        llm.openai.request_timeout = worker.generation_timeout;
        llm.gemini.request_timeout = worker.generation_timeout;

        let stale_after = secs(&get, "STALE_AFTER_SECS", DEFAULT_STALE_AFTER)?;
        if worker.heartbeat_interval.is_zero() {
            bail!("SMARTHVAC_HEARTBEAT_SECS must be at least 1");
        }
        if stale_after < worker.heartbeat_interval * MISSED_HEARTBEATS_BEFORE_STALE {
            bail!(
                "SMARTHVAC_STALE_AFTER_SECS ({}) must be at least {} heartbeat intervals \
                 (SMARTHVAC_HEARTBEAT_SECS = {}), or live jobs get requeued",
                stale_after.as_secs(),
                MISSED_HEARTBEATS_BEFORE_STALE,
                worker.heartbeat_interval.as_secs()
            );
        }

        Ok(Self {
            db_path: path("DB_PATH", DEFAULT_DB_PATH),
            secrets_path: path("SECRETS_PATH", DEFAULT_SECRETS_PATH),
            template_path: path("TEMPLATE_PATH", DEFAULT_TEMPLATE_PATH),
            blob_root: path("BLOB_ROOT", DEFAULT_BLOB_ROOT),
            energyplus_bin: path("ENERGYPLUS_BIN", DEFAULT_ENERGYPLUS_BIN),
            output_dir,
            stale_after,
            worker,
            llm,
        })
    }
}

fn expand(value: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(value).into_owned())
}

fn parse<T>(get: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get(name)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| anyhow!("SMARTHVAC_{} = '{}': {}", name, raw, e))
        })
        .transpose()
}

fn millis(get: &impl Fn(&str) -> Option<String>, name: &str, default: Duration) -> Result<Duration> {
    Ok(parse::<u64>(get, name)?
        .map(Duration::from_millis)
        .unwrap_or(default))
}

fn secs(get: &impl Fn(&str) -> Option<String>, name: &str, default: Duration) -> Result<Duration> {
    Ok(parse::<u64>(get, name)?
        .map(Duration::from_secs)
        .unwrap_or(default))
}
