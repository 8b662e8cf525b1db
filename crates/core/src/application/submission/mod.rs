// Submission Service - Creates jobs for the worker to claim

pub mod submit;
mod submit_test;

pub use submit::SubmitRequest;

use crate::error::Result;
use crate::port::{IdProvider, JobRepository, TimeProvider};
use std::sync::Arc;

pub struct SubmissionService {
    job_repo: Arc<dyn JobRepository>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
}

impl SubmissionService {
    pub fn new(
        job_repo: Arc<dyn JobRepository>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            job_repo,
            id_provider,
            time_provider,
        }
    }

    /// Submit a simulation request
    pub async fn submit(&self, req: SubmitRequest) -> Result<String> {
        submit::execute(
            self.job_repo.as_ref(),
            self.id_provider.as_ref(),
            self.time_provider.as_ref(),
            req,
        )
        .await
    }

    /// Submit a backend connectivity check
    pub async fn submit_connection_test(&self) -> Result<String> {
        submit::execute_connection_test(
            self.job_repo.as_ref(),
            self.id_provider.as_ref(),
            self.time_provider.as_ref(),
        )
        .await
    }
}
