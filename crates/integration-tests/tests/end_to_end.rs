//! Worker pipeline over a file-backed SQLite queue and a local blob store
//!
//! The generation backend and the simulation engine are mocks; everything
//! else is the production wiring.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use smarthvac_core::application::{
    shutdown_channel, ArtifactGenerator, BackendRegistry, ResultPublisher, SimulationExecutor,
    SubmissionService, SubmitRequest, Worker, WorkerConfig,
};
use smarthvac_core::domain::{BaseTemplate, JobStatus};
use smarthvac_core::port::id_provider::mocks::SequentialIdProvider;
use smarthvac_core::port::job_repository::JobRepository;
use smarthvac_core::port::simulation_engine::mocks::{MockBehavior, MockSimulationEngine};
use smarthvac_core::port::text_generator::mocks::MockTextGenerator;
use smarthvac_core::port::time_provider::SystemTimeProvider;
use smarthvac_core::port::{TextGenerator, TimeProvider};
use smarthvac_infra_sqlite::{create_pool, run_migrations, SqliteJobRepository};
use smarthvac_infra_system::LocalBlobStore;
use tempfile::TempDir;

const GENERATED: &str = "```idf\nVersion,23.2;\nZone,Office;\n```";

struct Stack {
    dir: TempDir,
    repo: Arc<SqliteJobRepository>,
    submissions: SubmissionService,
    engine: Arc<MockSimulationEngine>,
    backend: Arc<MockTextGenerator>,
    worker: Worker,
}

impl Stack {
    fn blob(&self, path: &str) -> std::path::PathBuf {
        self.dir.path().join("blobs").join(path)
    }
}

async fn stack() -> Stack {
    let dir = tempfile::tempdir().unwrap();
    let weather_dir = dir.path().join("weather");
    std::fs::create_dir_all(&weather_dir).unwrap();
    std::fs::write(weather_dir.join("Golden.epw"), "LOCATION,Golden").unwrap();

    let pool = create_pool(&format!("sqlite://{}", dir.path().join("jobs.db").display()))
        .await
        .unwrap();
    run_migrations(&pool).await.unwrap();

    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let repo = Arc::new(SqliteJobRepository::new(pool, time_provider.clone()));
    let submissions = SubmissionService::new(
        repo.clone(),
        Arc::new(SequentialIdProvider::new("job")),
        time_provider.clone(),
    );

    let backend = Arc::new(MockTextGenerator::responding("openai", GENERATED));
    let mut registry = BackendRegistry::new();
    registry.register(backend.clone() as Arc<dyn TextGenerator>);
    registry.mark_unconfigured("gemini");
    let generator = Arc::new(ArtifactGenerator::new(
        BaseTemplate::new("Version,23.2;"),
        Arc::new(registry),
    ));

    let engine = Arc::new(MockSimulationEngine::new(
        dir.path().join("eplus_out"),
        MockBehavior::Produce(vec!["eplusout.sql".into(), "eplustbl.htm".into()]),
    ));
    let publisher = Arc::new(ResultPublisher::new(Arc::new(LocalBlobStore::new(
        dir.path().join("blobs"),
    ))));

    let mut config = WorkerConfig::new("worker-e2e", dir.path().join("work"));
    config.weather_dir = weather_dir;
    config.default_weather_file = Some("Golden.epw".to_string());
    config.poll_interval = Duration::from_millis(20);

    let worker = Worker::new(
        config,
        repo.clone(),
        generator,
        Arc::new(SimulationExecutor::new(engine.clone())),
        publisher,
        time_provider,
    );

    Stack {
        dir,
        repo,
        submissions,
        engine,
        backend,
        worker,
    }
}

fn request(text: &str) -> SubmitRequest {
    SubmitRequest {
        simulation_config: Some(serde_json::json!({"annual": true})),
        ..SubmitRequest::new(text)
    }
}

#[tokio::test]
async fn test_submitted_job_is_simulated_and_published() {
    let s = stack().await;
    let id = s.submissions.submit(request("add a south window")).await.unwrap();

    assert!(s.worker.process_next_job().await.unwrap());

    let job = s.repo.find_by_id(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(job.result_path.as_deref(), Some("results/job-1/eplusout.sql"));
    assert_eq!(job.idf_path.as_deref(), Some("idf/job-1/in.idf"));
    assert!(job.error_message.is_none());
    assert!(job.updated_at >= job.created_at);

    // The sanitized model is what was simulated and what was published
    let idf = std::fs::read_to_string(s.blob("idf/job-1/in.idf")).unwrap();
    assert_eq!(idf.trim(), "Version,23.2;\nZone,Office;");
    assert!(s.blob("results/job-1/eplusout.sql").exists());
    assert!(s.blob("results/job-1/eplustbl.htm").exists());
    assert!(Path::new(&format!("{}.meta.json", s.blob("results/job-1/eplusout.sql").display())).exists());

    let model = s.engine.last_model().unwrap();
    assert!(model.weather_path.ends_with("Golden.epw"));

    // Task text and configuration reach the backend
    let (_, user) = s.backend.last_prompt().unwrap();
    assert!(user.contains("add a south window"));
    assert!(user.contains("annual"));

    assert!(!s.worker.process_next_job().await.unwrap());
}

#[tokio::test]
async fn test_engine_failure_is_recorded_on_the_job() {
    let s = stack().await;
    s.engine
        .set_behavior(MockBehavior::Fail("** Severe ** unknown object".to_string()));
    let id = s.submissions.submit(request("add a zone")).await.unwrap();

    s.worker.process_next_job().await.unwrap();

    let job = s.repo.find_by_id(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Error);
    assert!(job.result_path.is_none());
    assert!(job.idf_path.is_none());
    let message = job.error_message.unwrap();
    assert!(message.starts_with("simulation failed"), "{}", message);
    assert!(message.contains("unknown object"), "{}", message);
}

#[tokio::test]
async fn test_unconfigured_backend_fails_only_that_job() {
    let s = stack().await;
    let gemini = s
        .submissions
        .submit(SubmitRequest {
            backend: Some("gemini".to_string()),
            ..request("use gemini")
        })
        .await
        .unwrap();
    let openai = s.submissions.submit(request("use openai")).await.unwrap();

    s.worker.process_next_job().await.unwrap();
    s.worker.process_next_job().await.unwrap();

    let failed = s.repo.find_by_id(&gemini).await.unwrap().unwrap();
    assert_eq!(failed.status, JobStatus::Error);
    assert!(failed.error_message.unwrap().contains("gemini"));

    let done = s.repo.find_by_id(&openai).await.unwrap().unwrap();
    assert_eq!(done.status, JobStatus::Done);
}

#[tokio::test]
async fn test_connection_test_stores_probe_report() {
    let s = stack().await;
    let id = s.submissions.submit_connection_test().await.unwrap();

    s.worker.process_next_job().await.unwrap();

    let job = s.repo.find_by_id(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Done);
    assert!(job.result_path.is_none());
    let report: serde_json::Value = serde_json::from_str(&job.result_summary.unwrap()).unwrap();
    assert_eq!(report["backends"]["openai"], true);
    assert_eq!(report["backends"]["gemini"], false);
    assert_eq!(s.backend.probe_calls(), 1);
    assert_eq!(s.engine.call_count(), 0);
}

#[tokio::test]
async fn test_run_loop_drains_queue_until_shutdown() {
    let s = stack().await;
    let mut ids = Vec::new();
    for i in 0..3 {
        ids.push(s.submissions.submit(request(&format!("variant {}", i))).await.unwrap());
    }

    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let repo = s.repo.clone();
    let worker = s.worker;
    let handle = tokio::spawn(async move { worker.run(shutdown_rx).await });

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        if repo.count_by_status(JobStatus::Done).await.unwrap() == 3 {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "queue not drained");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    shutdown_tx.shutdown();
    let outcome = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("worker did not stop")
        .unwrap();
    assert!(outcome.is_ok());

    // FIFO: claim times follow submission order
    let mut claimed = Vec::new();
    for id in &ids {
        claimed.push(repo.find_by_id(id).await.unwrap().unwrap().claimed_at.unwrap());
    }
    assert!(claimed.windows(2).all(|w| w[0] <= w[1]));
}
