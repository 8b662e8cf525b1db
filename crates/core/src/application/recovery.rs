// Orphan recovery: `processing` jobs left behind by a crashed or killed worker
use crate::domain::{Job, JobStatus};
use crate::error::{AppError, Result};
use crate::port::{JobRepository, TimeProvider};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::application::worker::constants::DEFAULT_STALE_AFTER;

/// Crash recovery service
///
/// A claimed job whose worker died stays `processing` forever. On startup
/// every `processing` job untouched for longer than `stale_after` is put back
/// into its eligible status with a compare-and-set, so a live worker that
/// finishes it concurrently always wins.
pub struct RecoveryService {
    job_repo: Arc<dyn JobRepository>,
    time_provider: Arc<dyn TimeProvider>,
    stale_after: Duration,
}

impl RecoveryService {
    /// # Example
    /// ```ignore
    /// let recovery = RecoveryService::new(job_repo, time_provider, None);
    /// recovery.recover_orphaned_jobs().await?;
    /// ```
    pub fn new(
        job_repo: Arc<dyn JobRepository>,
        time_provider: Arc<dyn TimeProvider>,
        stale_after: Option<Duration>,
    ) -> Self {
        Self {
            job_repo,
            time_provider,
            stale_after: stale_after.unwrap_or(DEFAULT_STALE_AFTER),
        }
    }

    /// Requeue stale `processing` jobs; returns how many moved
    pub async fn recover_orphaned_jobs(&self) -> Result<usize> {
        let cutoff = self.time_provider.now_millis() - self.stale_after.as_millis() as i64;

        info!(
            cutoff = %cutoff,
            stale_after_secs = self.stale_after.as_secs(),
            "Starting orphaned job recovery"
        );

        let mut recovered = 0;
        for job in self.job_repo.find_by_status(JobStatus::Processing).await? {
            if job.updated_at >= cutoff {
                continue;
            }
            if self.job_repo.requeue(&job.id, cutoff).await? {
                info!(
                    job_id = %job.id,
                    claimed_by = ?job.claimed_by,
                    updated_at = job.updated_at,
                    "Orphaned job requeued"
                );
                recovered += 1;
            }
        }

        info!(recovered_count = recovered, "Orphaned job recovery complete");
        Ok(recovered)
    }

    /// Operator reset of one job
    ///
    /// Without `force` only a stale job moves; with `force` any `processing`
    /// job does. Returns the job as stored afterwards.
    pub async fn requeue_job(&self, id: &str, force: bool) -> Result<Job> {
        let job = self
            .job_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Job {} not found", id)))?;

        if job.status != JobStatus::Processing {
            return Err(AppError::InvalidState(format!(
                "Job {} is {}, only processing jobs can be requeued",
                id, job.status
            )));
        }

        let now = self.time_provider.now_millis();
        let stale_before = if force {
            i64::MAX
        } else {
            now - self.stale_after.as_millis() as i64
        };

        if !self.job_repo.requeue(id, stale_before).await? {
            warn!(job_id = %id, "Job not requeued (recently active or already finished)");
            return Err(AppError::InvalidState(format!(
                "Job {} was updated within the last {}s; use force to requeue anyway",
                id,
                self.stale_after.as_secs()
            )));
        }

        info!(job_id = %id, force = force, "Job requeued by operator");
        self.job_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Job {} not found", id)))
    }
}
