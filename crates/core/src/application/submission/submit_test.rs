//! Unit tests for submission validation and job creation

#[cfg(test)]
mod tests {
    use super::super::submit::validate_request;
    use super::super::*;
    use crate::domain::{JobKind, JobStatus};
    use crate::port::id_provider::mocks::SequentialIdProvider;
    use crate::port::job_repository::mocks::InMemoryJobRepository;
    use crate::port::time_provider::mocks::ManualClock;
    use crate::port::JobRepository;
    use serde_json::json;
    use std::sync::Arc;

    fn service() -> (SubmissionService, Arc<InMemoryJobRepository>) {
        let clock = Arc::new(ManualClock::new(42_000));
        let repo = Arc::new(InMemoryJobRepository::new(clock.clone()));
        let service = SubmissionService::new(
            repo.clone(),
            Arc::new(SequentialIdProvider::new("job")),
            clock,
        );
        (service, repo)
    }

    #[test]
    fn test_validate_text_empty() {
        let result = validate_request(&SubmitRequest::new("   "));
        assert!(result.unwrap_err().to_string().contains("empty"));
    }

    #[test]
    fn test_validate_config_must_be_object() {
        let mut req = SubmitRequest::new("remove lights");
        req.simulation_config = Some(json!([1, 2]));

        let result = validate_request(&req);
        assert!(result.unwrap_err().to_string().contains("got array"));
    }

    #[test]
    fn test_validate_backend_name() {
        let mut req = SubmitRequest::new("remove lights");
        req.backend = Some("".to_string());
        assert!(validate_request(&req).is_err());

        req.backend = Some("open ai!".to_string());
        assert!(validate_request(&req)
            .unwrap_err()
            .to_string()
            .contains("alphanumeric"));

        req.backend = Some("gemini".to_string());
        assert!(validate_request(&req).is_ok());
    }

    #[test]
    fn test_request_accepts_requester_wire_format() {
        let req: SubmitRequest = serde_json::from_value(json!({
            "nlpInputText": "make the office south-facing",
            "weatherFilePath": "USA_CO_Golden.epw",
            "simulationConfig": {"timestep": 6}
        }))
        .unwrap();

        assert_eq!(req.weather_file_path.as_deref(), Some("USA_CO_Golden.epw"));
        assert!(validate_request(&req).is_ok());
    }

    #[tokio::test]
    async fn test_submit_creates_queued_job() {
        let (service, repo) = service();
        let mut req = SubmitRequest::new("  remove lights ");
        req.weather_file_path = Some("Golden.epw".to_string());
        req.simulation_config = Some(json!({"timestep": 4}));

        let id = service.submit(req).await.unwrap();

        let job = repo.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(id, "job-1");
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.created_at, 42_000);
        assert_eq!(job.request.text, "remove lights");
        assert_eq!(job.request.parameters["timestep"], json!(4));
        assert!(job.invariant_holds());
    }

    #[tokio::test]
    async fn test_invalid_submission_writes_nothing() {
        let (service, repo) = service();

        assert!(service.submit(SubmitRequest::new("")).await.is_err());
        assert!(repo.list_recent(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_submit_connection_test() {
        let (service, repo) = service();

        let id = service.submit_connection_test().await.unwrap();

        let job = repo.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::TestConnection);
        assert_eq!(job.kind, JobKind::ConnectionTest);
    }
}
