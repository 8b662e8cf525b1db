//! SmartHVAC Simulation Worker - Main Entry Point
//!
//! Polls the job queue and runs generate -> simulate -> publish for each job.

mod config;
mod logging;

use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use config::DaemonConfig;
use smarthvac_core::application::{
    shutdown_channel, ArtifactGenerator, RecoveryService, ResultPublisher, SimulationExecutor,
    Worker,
};
use smarthvac_core::domain::BaseTemplate;
use smarthvac_core::port::time_provider::SystemTimeProvider;
use smarthvac_core::port::{SimulationEngine, TimeProvider};
use smarthvac_infra_llm::{build_registry, Secrets};
use smarthvac_infra_sqlite::{create_pool, run_migrations, SqliteJobRepository};
use smarthvac_infra_system::{EnergyPlusEngine, LocalBlobStore};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Logging (guard flushes the file writer on exit)
    let _log_guard = logging::init_logging()?;

    info!("SmartHVAC worker v{} starting...", VERSION);

    // 2. Configuration
    let config = DaemonConfig::from_env()?;
    info!(
        worker_id = %config.worker.worker_id,
        db_path = %config.db_path.display(),
        work_dir = %config.worker.work_dir.display(),
        "Configuration loaded"
    );

    // A worker without its base template cannot do anything useful
    let template = BaseTemplate::load(&config.template_path)
        .with_context(|| format!("base template {}", config.template_path.display()))?;

    let secrets = Secrets::load(&config.secrets_path)?;
    let registry = Arc::new(build_registry(&secrets, &config.llm)?);

    for dir in [&config.worker.work_dir, &config.output_dir, &config.blob_root] {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("cannot create directory {}", dir.display()))?;
    }
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // 3. Database
    let database_url = format!("sqlite://{}", config.db_path.display());
    let pool = create_pool(&database_url)
        .await
        .map_err(|e| anyhow!("DB pool creation failed: {}", e))?;
    run_migrations(&pool)
        .await
        .map_err(|e| anyhow!("Migration failed: {}", e))?;

    // 4. DI wiring
    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let job_repo = Arc::new(SqliteJobRepository::new(pool.clone(), time_provider.clone()));

    let engine = EnergyPlusEngine::new(
        &config.energyplus_bin,
        &config.output_dir,
        time_provider.clone(),
    );
    if let Err(e) = engine.check_available().await {
        // Jobs will fail individually until the binary is installed
        warn!(
            binary = %engine.binary().display(),
            error = %e,
            configuration_error = true,
            "EnergyPlus is not available"
        );
    }

    let publisher = Arc::new(ResultPublisher::new(Arc::new(LocalBlobStore::new(
        &config.blob_root,
    ))));
    let executor = Arc::new(SimulationExecutor::new(Arc::new(engine)));
    let generator = Arc::new(ArtifactGenerator::new(template, registry));

    // 5. Crash recovery
    info!("Running crash recovery...");
    let recovery_service =
        RecoveryService::new(job_repo.clone(), time_provider.clone(), Some(config.stale_after));
    match recovery_service.recover_orphaned_jobs().await {
        Ok(count) => info!(recovered_jobs = count, "Crash recovery completed"),
        Err(e) => error!(error = ?e, "Crash recovery failed"),
    }

    // 6. Worker loop
    info!("Starting worker...");
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let worker = Worker::new(
        config.worker.clone(),
        job_repo,
        generator,
        executor,
        publisher,
        time_provider,
    );
    let mut worker_handle = tokio::spawn(async move { worker.run(shutdown_rx).await });

    info!("System ready. Waiting for jobs...");

    // 7. Run until Ctrl+C or the worker stops on its own
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Shutdown signal received. Exiting gracefully...");
            shutdown_tx.shutdown();
            match tokio::time::timeout(SHUTDOWN_GRACE, &mut worker_handle).await {
                Ok(_) => info!("Worker stopped"),
                Err(_) => warn!("Worker did not stop within {:?}, abandoning current job", SHUTDOWN_GRACE),
            }
        }
        outcome = &mut worker_handle => {
            match outcome {
                Ok(Ok(())) => info!("Worker exited"),
                Ok(Err(e)) => {
                    error!(error = %e, "Worker halted");
                    pool.close().await;
                    return Err(anyhow!("worker halted: {}", e));
                }
                Err(e) => return Err(anyhow!("worker task failed: {}", e)),
            }
        }
    }

    pool.close().await;
    info!("Shutdown complete.");

    Ok(())
}
