//! Logging setup
//!
//! - `RUST_LOG`: filter (default: `smarthvac=info`)
//! - `SMARTHVAC_LOG_FORMAT`: `json` or `pretty` (default) for stdout
//! - `SMARTHVAC_LOG_DIR`: when set, JSON logs also go to a daily rolling file

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "smarthvac=info";
const LOG_FILE_PREFIX: &str = "smarthvac-worker.log";

/// Install the global subscriber. Keep the returned guard alive until exit so
/// buffered file output is flushed.
pub fn init_logging() -> Result<Option<WorkerGuard>> {
    let log_format =
        std::env::var("SMARTHVAC_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
    let json = log_format == "json";

    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))?;

    // Production: JSON structured logging; development: pretty formatting
    let stdout_json = json.then(|| fmt::layer().json());
    let stdout_pretty = (!json).then(|| fmt::layer().pretty());

    let (file_layer, guard) = match std::env::var("SMARTHVAC_LOG_DIR") {
        Ok(dir) if !dir.trim().is_empty() => {
            let dir = shellexpand::tilde(&dir).into_owned();
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().json().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_json)
        .with(stdout_pretty)
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}
