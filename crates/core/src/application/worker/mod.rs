// Worker - Job lifecycle loop (claim -> generate -> simulate -> publish -> finish)

mod config;
pub mod constants;
mod shutdown;

pub use config::WorkerConfig;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use constants::*;

use crate::application::generator::ArtifactGenerator;
use crate::application::publisher::{ArtifactCategory, ResultPublisher};
use crate::application::simulation::SimulationExecutor;
use crate::domain::{Job, JobKind, JobRequest};
use crate::error::{AppError, Result};
use crate::port::{JobRepository, TimeProvider};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// A failed pipeline stage, converted into the job's error message
#[derive(Debug)]
struct StageFailure {
    stage: &'static str,
    error: AppError,
}

impl StageFailure {
    fn new(stage: &'static str, error: AppError) -> Self {
        Self { stage, error }
    }

    fn message(&self) -> String {
        match &self.error {
            AppError::Timeout { .. } => self.error.to_string(),
            other => format!("{} failed: {}", self.stage, other),
        }
    }
}

/// Storage references of a fully published job
#[derive(Debug)]
struct Published {
    result_path: String,
    idf_path: String,
    artifacts: Vec<String>,
}

/// Generate -> Simulate -> Publish for one job
///
/// Cloned into a spawned task so a panic in any stage cannot take the loop down.
#[derive(Clone)]
struct Pipeline {
    config: Arc<WorkerConfig>,
    generator: Arc<ArtifactGenerator>,
    executor: Arc<SimulationExecutor>,
    publisher: Arc<ResultPublisher>,
}

impl Pipeline {
    async fn run(
        self,
        job_id: String,
        request: JobRequest,
    ) -> std::result::Result<Published, StageFailure> {
        let job_dir = self
            .config
            .job_dir(&job_id)
            .map_err(|e| StageFailure::new("generation", e))?;
        let weather = self
            .config
            .weather_reference(request.weather_file.as_deref())
            .map(str::to_string)
            .ok_or_else(|| {
                StageFailure::new(
                    "generation",
                    AppError::UnsupportedRequest(
                        "request names no weather file and no default is configured".to_string(),
                    ),
                )
            })?;
        let backend = request
            .backend
            .clone()
            .unwrap_or_else(|| self.config.default_backend.clone());

        // Generate
        let config_view = request.config_view(&weather);
        let idf = with_timeout(
            "generation",
            self.config.generation_timeout,
            self.generator.generate(&request.text, &config_view, &backend),
        )
        .await
        .map_err(|e| StageFailure::new("generation", e))?;

        let idf_file = job_dir.join(GENERATED_IDF_FILE_NAME);
        write_input(&job_dir, &idf_file, &idf)
            .await
            .map_err(|e| StageFailure::new("generation", e))?;
        info!(job_id = %job_id, backend = %backend, idf = %idf_file.display(), "IDF generated");

        // Simulate
        let weather_path = self.config.resolve_weather_path(&weather);
        let outputs = with_timeout(
            "simulation",
            self.config.simulation_timeout,
            self.executor.run(&idf_file, &weather_path, &request.parameters),
        )
        .await
        .map_err(|e| StageFailure::new("simulation", e))?;

        // Publish: generated input, then the primary output, then the rest
        let publish = async {
            let idf_path = self
                .publisher
                .publish_text(&job_id, &idf, GENERATED_IDF_FILE_NAME, ArtifactCategory::GeneratedInput)
                .await?;

            let primary = outputs.primary_path().ok_or_else(|| {
                AppError::Integrity(format!("primary artifact '{}' missing", outputs.primary))
            })?;
            let result_path = self
                .publisher
                .publish_file(&job_id, primary, ArtifactCategory::Results)
                .await?;

            let mut artifacts = vec![result_path.clone()];
            for (name, path) in &outputs.artifacts {
                if *name == outputs.primary {
                    continue;
                }
                artifacts.push(
                    self.publisher
                        .publish_file(&job_id, path, ArtifactCategory::Results)
                        .await?,
                );
            }

            Ok::<_, AppError>(Published {
                result_path,
                idf_path,
                artifacts,
            })
        };

        with_timeout("publish", self.config.publish_timeout, publish)
            .await
            .map_err(|e| StageFailure::new("publish", e))
    }
}

async fn with_timeout<T>(
    stage: &str,
    limit: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Timeout {
            stage: stage.to_string(),
            after_ms: limit.as_millis() as u64,
        }),
    }
}

async fn write_input(dir: &std::path::Path, file: &std::path::Path, content: &str) -> Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(file, content).await?;
    Ok(())
}

/// Worker drives claimed jobs to a terminal status
pub struct Worker {
    config: Arc<WorkerConfig>,
    job_repo: Arc<dyn JobRepository>,
    pipeline: Pipeline,
    time_provider: Arc<dyn TimeProvider>,
}

impl Worker {
    pub fn new(
        config: WorkerConfig,
        job_repo: Arc<dyn JobRepository>,
        generator: Arc<ArtifactGenerator>,
        executor: Arc<SimulationExecutor>,
        publisher: Arc<ResultPublisher>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        let config = Arc::new(config);
        Self {
            pipeline: Pipeline {
                config: Arc::clone(&config),
                generator,
                executor,
                publisher,
            },
            config,
            job_repo,
            time_provider,
        }
    }

    /// Run worker loop with graceful shutdown support
    ///
    /// Returns `Err` only for a configuration failure while
    /// `halt_on_configuration_error` is set.
    pub async fn run(&self, mut shutdown: ShutdownToken) -> Result<()> {
        info!(worker_id = %self.config.worker_id, "Worker started");
        loop {
            if shutdown.is_shutdown() {
                info!(worker_id = %self.config.worker_id, "Worker shutting down");
                break;
            }
            match self.process_next_job().await {
                Ok(true) => {}
                Ok(false) => {
                    tokio::select! {
                        _ = sleep(self.config.poll_interval) => {},
                        _ = shutdown.wait() => {
                            info!("Worker interrupted during idle");
                            break;
                        }
                    }
                }
                Err(e) if e.is_configuration() && self.config.halt_on_configuration_error => {
                    error!(
                        configuration_error = true,
                        error = %e,
                        "Halting worker on configuration error"
                    );
                    return Err(e);
                }
                Err(e) => {
                    error!(category = e.category(), error = %e, "Worker error");
                    tokio::select! {
                        _ = sleep(ERROR_RECOVERY_SLEEP_DURATION) => {},
                        _ = shutdown.wait() => {
                            info!("Worker interrupted during error recovery");
                            break;
                        }
                    }
                }
            }
        }
        info!(worker_id = %self.config.worker_id, "Worker stopped");
        Ok(())
    }

    /// Claim and process the next job (returns true if a job was processed)
    pub async fn process_next_job(&self) -> Result<bool> {
        let job = match self.job_repo.claim_next(&self.config.worker_id).await? {
            Some(job) => job,
            None => return Ok(false),
        };

        info!(job_id = %job.id, kind = %job.kind, "Claimed job");
        self.process(job).await?;
        Ok(true)
    }

    /// Drive a claimed (`processing`) job to `done` or `error` and persist it
    ///
    /// A failed status write propagates: the job's outcome is then unknown to
    /// the store and it stays `processing` until recovered.
    pub async fn process(&self, mut job: Job) -> Result<Job> {
        let configuration_failure = match job.kind {
            JobKind::ConnectionTest => {
                self.run_connection_test(&mut job).await?;
                None
            }
            JobKind::Simulation => self.run_simulation(&mut job).await?,
        };

        if let Err(e) = self.job_repo.finish(&job).await {
            error!(job_id = %job.id, status = %job.status, error = %e, "Failed to write job status");
            return Err(e);
        }
        info!(job_id = %job.id, status = %job.status, "Job finished");

        match configuration_failure {
            Some(message) if self.config.halt_on_configuration_error => {
                Err(AppError::Configuration(message))
            }
            _ => Ok(job),
        }
    }

    /// Probe generation backends only; never touches the simulator or storage
    async fn run_connection_test(&self, job: &mut Job) -> Result<()> {
        let report = self.pipeline.generator.registry().probe_all(PROBE_TIMEOUT).await;
        if !report.all_reachable() {
            warn!(job_id = %job.id, details = %report.details, "Connection test found unreachable backends");
        }
        job.complete_probe(self.time_provider.now_millis(), report.to_json()?)?;
        Ok(())
    }

    /// A failed refresh only risks a duplicate run after recovery, so it is logged
    async fn heartbeat(&self, job_id: &str) {
        match self.job_repo.heartbeat(job_id, &self.config.worker_id).await {
            Ok(true) => debug!(job_id = %job_id, "Job heartbeat"),
            Ok(false) => warn!(job_id = %job_id, "Job no longer held by this worker"),
            Err(e) => warn!(job_id = %job_id, error = %e, "Job heartbeat failed"),
        }
    }

    /// Returns the failure message when the job failed on a configuration error
    async fn run_simulation(&self, job: &mut Job) -> Result<Option<String>> {
        let pipeline = self.pipeline.clone();
        let job_id = job.id.clone();
        let request = job.request.clone();

        let mut handle = tokio::spawn(async move { pipeline.run(job_id, request).await });
        let now = || self.time_provider.now_millis();

        // interval() panics on a zero period
        let period = self.config.heartbeat_interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; the claim itself is fresh
        ticker.tick().await;
        let joined = loop {
            tokio::select! {
                joined = &mut handle => break joined,
                _ = ticker.tick() => self.heartbeat(&job.id).await,
            }
        };

        match joined {
            Ok(Ok(published)) => {
                info!(
                    job_id = %job.id,
                    result_path = %published.result_path,
                    artifacts = published.artifacts.len(),
                    "Job completed"
                );
                job.complete(
                    now(),
                    published.result_path,
                    Some(published.idf_path),
                    published.artifacts,
                )?;
                Ok(None)
            }
            Ok(Err(failure)) => {
                let message = failure.message();
                let configuration = failure.error.is_configuration();
                if configuration {
                    error!(
                        job_id = %job.id,
                        stage = failure.stage,
                        configuration_error = true,
                        error = %failure.error,
                        "Job failed on configuration error"
                    );
                } else {
                    warn!(
                        job_id = %job.id,
                        stage = failure.stage,
                        category = failure.error.category(),
                        error = %failure.error,
                        "Job failed"
                    );
                }
                job.fail(now(), message.clone())?;
                Ok(configuration.then_some(message))
            }
            Err(join_err) => {
                let message = if join_err.is_panic() {
                    let payload = join_err.into_panic();
                    let detail = payload
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    format!("pipeline panicked: {}", detail)
                } else {
                    "pipeline cancelled".to_string()
                };
                error!(job_id = %job.id, error = %message, "Job pipeline aborted");
                job.fail(now(), message)?;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::generator::BackendRegistry;
    use crate::application::recovery::RecoveryService;
    use crate::domain::{BaseTemplate, JobStatus};
    use crate::port::blob_store::mocks::MemoryBlobStore;
    use crate::port::job_repository::mocks::InMemoryJobRepository;
    use crate::port::simulation_engine::mocks::{MockBehavior, MockSimulationEngine};
    use crate::port::text_generator::mocks::{self as gen_mocks, MockTextGenerator};
    use crate::port::time_provider::mocks::ManualClock;
    use crate::port::TextGenerator;
    use tempfile::TempDir;

    struct Harness {
        dir: TempDir,
        worker: Worker,
        repo: Arc<InMemoryJobRepository>,
        backend: Arc<MockTextGenerator>,
        engine: Arc<MockSimulationEngine>,
        store: Arc<MemoryBlobStore>,
        clock: Arc<ManualClock>,
    }

    fn harness(backend: MockTextGenerator, configure: impl FnOnce(&mut WorkerConfig)) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let weather_dir = dir.path().join("weather");
        std::fs::create_dir_all(&weather_dir).unwrap();
        std::fs::write(weather_dir.join("Golden.epw"), "LOCATION,Golden").unwrap();

        let clock = Arc::new(ManualClock::new(1_000));
        let repo = Arc::new(InMemoryJobRepository::new(clock.clone()));
        let backend = Arc::new(backend);
        let engine = Arc::new(MockSimulationEngine::new(
            dir.path().join("eplus_out"),
            MockBehavior::Produce(vec!["eplusout.sql".into(), "eplustbl.htm".into()]),
        ));
        let store = Arc::new(MemoryBlobStore::new());

        let mut registry = BackendRegistry::new();
        registry.register(backend.clone() as Arc<dyn TextGenerator>);
        registry.mark_unconfigured("gemini");
        let generator = Arc::new(ArtifactGenerator::new(
            BaseTemplate::new("Version,23.2;"),
            Arc::new(registry),
        ));

        let mut config = WorkerConfig::new("worker-test", dir.path().join("work"));
        config.weather_dir = weather_dir;
        config.default_weather_file = Some("Golden.epw".to_string());
        configure(&mut config);

        let worker = Worker::new(
            config,
            repo.clone(),
            generator,
            Arc::new(SimulationExecutor::new(engine.clone())),
            Arc::new(ResultPublisher::new(store.clone())),
            clock.clone(),
        );

        Harness {
            dir,
            worker,
            repo,
            backend,
            engine,
            store,
            clock,
        }
    }

    fn ok_backend() -> MockTextGenerator {
        MockTextGenerator::responding("openai", "```idf\nVersion,23.2;\nZone,Office;\n```")
    }

    async fn enqueue(h: &Harness, job: Job) -> String {
        let id = job.id.clone();
        h.repo.insert(&job).await.unwrap();
        id
    }

    async fn stored(h: &Harness, id: &str) -> Job {
        h.repo.find_by_id(id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_successful_job_ends_done_with_result_path() {
        let h = harness(ok_backend(), |_| {});
        let id = enqueue(&h, Job::new("job-a", 10, JobRequest::new("add a window"))).await;
        h.clock.set(5_000);

        assert!(h.worker.process_next_job().await.unwrap());

        let job = stored(&h, &id).await;
        assert_eq!(job.status, JobStatus::Done);
        assert_eq!(job.result_path.as_deref(), Some("results/job-a/eplusout.sql"));
        assert_eq!(job.idf_path.as_deref(), Some("idf/job-a/in.idf"));
        assert_eq!(
            job.artifacts,
            vec![
                "results/job-a/eplusout.sql".to_string(),
                "results/job-a/eplustbl.htm".to_string()
            ]
        );
        assert!(job.error_message.is_none());
        assert_eq!(job.updated_at, 5_000);

        let idf = h.store.get("idf/job-a/in.idf").unwrap();
        assert_eq!(idf.bytes, b"Version,23.2;\nZone,Office;".to_vec());
        assert_eq!(idf.content_type, "text/plain");
    }

    #[tokio::test]
    async fn test_generation_failure_skips_simulation_and_publish() {
        let h = harness(MockTextGenerator::failing("openai", "quota exceeded"), |_| {});
        let id = enqueue(&h, Job::new("job-b", 10, JobRequest::new("x"))).await;

        h.worker.process_next_job().await.unwrap();

        let job = stored(&h, &id).await;
        assert_eq!(job.status, JobStatus::Error);
        let message = job.error_message.unwrap();
        assert!(message.starts_with("generation failed:"), "{}", message);
        assert!(message.contains("quota exceeded"));
        assert!(job.result_path.is_none());
        assert_eq!(h.engine.call_count(), 0);
        assert_eq!(h.store.upload_count(), 0);
    }

    #[tokio::test]
    async fn test_connection_test_never_simulates_or_publishes() {
        let h = harness(ok_backend().with_probe_ok(false), |_| {});
        let id = enqueue(&h, Job::new_connection_test("probe-1", 10)).await;

        h.worker.process_next_job().await.unwrap();

        let job = stored(&h, &id).await;
        assert_eq!(job.status, JobStatus::Done);
        let summary: serde_json::Value =
            serde_json::from_str(job.result_summary.as_deref().unwrap()).unwrap();
        assert_eq!(summary["backends"]["openai"], serde_json::json!(false));
        assert_eq!(summary["backends"]["gemini"], serde_json::json!(false));
        assert_eq!(h.backend.probe_calls(), 1);
        assert_eq!(h.backend.call_count(), 0);
        assert_eq!(h.engine.call_count(), 0);
        assert_eq!(h.store.upload_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_backend_fails_without_backend_call() {
        let h = harness(ok_backend(), |_| {});
        let id = enqueue(
            &h,
            Job::new("job-c", 10, JobRequest::new("x").with_backend("claude")),
        )
        .await;

        h.worker.process_next_job().await.unwrap();

        let job = stored(&h, &id).await;
        assert_eq!(job.status, JobStatus::Error);
        assert!(job.error_message.unwrap().contains("unsupported backend 'claude'"));
        assert_eq!(h.backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_generation_timeout_is_recorded_as_error() {
        let h = harness(
            MockTextGenerator::new("openai", gen_mocks::MockBehavior::Hang),
            |c| c.generation_timeout = Duration::from_millis(50),
        );
        let id = enqueue(&h, Job::new("job-d", 10, JobRequest::new("x"))).await;

        h.worker.process_next_job().await.unwrap();

        let job = stored(&h, &id).await;
        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(
            job.error_message.as_deref(),
            Some("generation timed out after 50ms")
        );
        assert_eq!(h.engine.call_count(), 0);
    }

    #[tokio::test]
    async fn test_panicking_simulation_marks_job_error_and_loop_survives() {
        let h = harness(ok_backend(), |_| {});
        h.engine.set_behavior(MockBehavior::Panic("engine exploded".into()));
        let first = enqueue(&h, Job::new("job-e1", 10, JobRequest::new("x"))).await;
        let second = enqueue(&h, Job::new("job-e2", 20, JobRequest::new("x"))).await;

        h.worker.process_next_job().await.unwrap();
        h.engine.set_behavior(MockBehavior::Produce(vec!["eplusout.sql".into()]));
        h.worker.process_next_job().await.unwrap();

        let failed = stored(&h, &first).await;
        assert_eq!(failed.status, JobStatus::Error);
        assert!(failed.error_message.unwrap().contains("engine exploded"));
        assert_eq!(stored(&h, &second).await.status, JobStatus::Done);
    }

    #[tokio::test]
    async fn test_missing_primary_output_is_not_done() {
        let h = harness(ok_backend(), |_| {});
        h.engine.set_behavior(MockBehavior::SucceedEmpty);
        let id = enqueue(&h, Job::new("job-f", 10, JobRequest::new("x"))).await;

        h.worker.process_next_job().await.unwrap();

        let job = stored(&h, &id).await;
        assert_eq!(job.status, JobStatus::Error);
        assert!(job.error_message.unwrap().starts_with("simulation failed: Integrity error"));
        assert_eq!(h.store.upload_count(), 0);
    }

    #[tokio::test]
    async fn test_status_write_failure_propagates() {
        let h = harness(ok_backend(), |_| {});
        let id = enqueue(&h, Job::new("job-g", 10, JobRequest::new("x"))).await;
        h.repo.set_fail_finish(true);

        let err = h.worker.process_next_job().await.unwrap_err();

        assert!(matches!(err, AppError::Database(_)));
        assert_eq!(stored(&h, &id).await.status, JobStatus::Processing);
        assert_eq!(h.engine.call_count(), 1);
    }

    #[tokio::test]
    async fn test_configuration_error_halts_only_when_requested() {
        let h = harness(ok_backend(), |c| c.halt_on_configuration_error = true);
        let id = enqueue(
            &h,
            Job::new("job-h", 10, JobRequest::new("x").with_backend("gemini")),
        )
        .await;
        let (_tx, token) = shutdown_channel();

        let err = h.worker.run(token).await.unwrap_err();

        assert!(err.is_configuration());
        assert_eq!(stored(&h, &id).await.status, JobStatus::Error);
    }

    #[tokio::test]
    async fn test_configuration_error_without_halt_keeps_polling() {
        let h = harness(ok_backend(), |_| {});
        let bad = enqueue(
            &h,
            Job::new("job-i1", 10, JobRequest::new("x").with_backend("gemini")),
        )
        .await;
        let good = enqueue(&h, Job::new("job-i2", 20, JobRequest::new("x"))).await;

        assert!(h.worker.process_next_job().await.unwrap());
        assert!(h.worker.process_next_job().await.unwrap());
        assert!(!h.worker.process_next_job().await.unwrap());

        assert_eq!(stored(&h, &bad).await.status, JobStatus::Error);
        assert_eq!(stored(&h, &good).await.status, JobStatus::Done);
    }

    #[tokio::test]
    async fn test_jobs_are_processed_in_creation_order() {
        let h = harness(ok_backend(), |_| {});
        enqueue(&h, Job::new("job-late", 300, JobRequest::new("x"))).await;
        enqueue(&h, Job::new("job-early", 100, JobRequest::new("x"))).await;
        enqueue(&h, Job::new_connection_test("job-mid", 200)).await;

        let mut order = Vec::new();
        while let Some(job) = h.repo.claim_next("observer").await.unwrap() {
            order.push(job.id);
        }

        assert_eq!(order, vec!["job-early", "job-mid", "job-late"]);
    }

    #[tokio::test]
    async fn test_missing_weather_without_default_is_unsupported() {
        let h = harness(ok_backend(), |c| c.default_weather_file = None);
        let id = enqueue(&h, Job::new("job-j", 10, JobRequest::new("x"))).await;

        h.worker.process_next_job().await.unwrap();

        let job = stored(&h, &id).await;
        assert_eq!(job.status, JobStatus::Error);
        assert!(job.error_message.unwrap().contains("no weather file"));
        assert_eq!(h.backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let h = harness(ok_backend(), |c| c.poll_interval = Duration::from_secs(60));
        let (tx, token) = shutdown_channel();

        let stopper = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            tx.shutdown();
        };
        let (result, _) = tokio::join!(h.worker.run(token), stopper);

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_publish_failure_leaves_no_result_references() {
        let h = harness(ok_backend(), |_| {});
        // The generated input lands, the primary output is rejected
        h.store.set_fail_after(1);
        let id = enqueue(&h, Job::new("job-k", 10, JobRequest::new("x"))).await;

        h.worker.process_next_job().await.unwrap();

        let job = stored(&h, &id).await;
        assert_eq!(job.status, JobStatus::Error);
        let message = job.error_message.clone().unwrap();
        assert!(message.starts_with("publish failed:"), "{}", message);
        assert!(message.contains("bucket rejected results/job-k/eplusout.sql"), "{}", message);
        assert!(job.result_path.is_none());
        assert!(job.idf_path.is_none());
        assert!(job.artifacts.is_empty());
        assert!(job.invariant_holds());
        assert_eq!(h.store.paths(), vec!["idf/job-k/in.idf".to_string()]);
    }

    #[tokio::test]
    async fn test_simulation_timeout_is_recorded_as_error() {
        let h = harness(ok_backend(), |c| c.simulation_timeout = Duration::from_millis(50));
        h.engine.set_behavior(MockBehavior::Hang);
        let id = enqueue(&h, Job::new("job-l", 10, JobRequest::new("x"))).await;

        h.worker.process_next_job().await.unwrap();

        let job = stored(&h, &id).await;
        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(
            job.error_message.as_deref(),
            Some("simulation timed out after 50ms")
        );
        assert_eq!(h.engine.call_count(), 1);
        assert_eq!(h.store.upload_count(), 0);
    }

    #[tokio::test]
    async fn test_job_id_outside_work_dir_is_rejected_before_any_file_is_written() {
        let h = harness(ok_backend(), |_| {});
        let id = enqueue(&h, Job::new("../escaped", 10, JobRequest::new("x"))).await;

        h.worker.process_next_job().await.unwrap();

        let job = stored(&h, &id).await;
        assert_eq!(job.status, JobStatus::Error);
        let message = job.error_message.unwrap();
        assert!(message.contains("job id '../escaped'"), "{}", message);
        assert!(!h.dir.path().join("escaped").exists());
        assert_eq!(h.backend.call_count(), 0);
        assert_eq!(h.engine.call_count(), 0);
        assert_eq!(h.store.upload_count(), 0);
    }

    #[tokio::test]
    async fn test_long_running_job_is_not_recovered_while_alive() {
        const MINUTE: i64 = 60_000;
        let h = harness(ok_backend(), |c| c.heartbeat_interval = Duration::from_millis(10));
        h.engine.set_behavior(MockBehavior::Delay(Duration::from_millis(300)));
        let id = enqueue(&h, Job::new("job-m", 10, JobRequest::new("x"))).await;

        let observer = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            // Well past the stale threshold since the claim at t=1000
            h.clock.set(40 * MINUTE);
            tokio::time::sleep(Duration::from_millis(50)).await;

            let running = stored(&h, &id).await;
            assert_eq!(running.status, JobStatus::Processing);
            assert_eq!(running.updated_at, 40 * MINUTE);

            let recovery = RecoveryService::new(h.repo.clone(), h.clock.clone(), None);
            recovery.recover_orphaned_jobs().await.unwrap()
        };
        let (processed, recovered) = tokio::join!(h.worker.process_next_job(), observer);

        assert!(processed.unwrap());
        assert_eq!(recovered, 0);
        assert_eq!(stored(&h, &id).await.status, JobStatus::Done);
    }
}
