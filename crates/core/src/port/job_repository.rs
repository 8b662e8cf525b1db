// Job Repository Port (Interface)

use crate::domain::{Job, JobStatus};
use crate::error::Result;
use async_trait::async_trait;

/// Queue/store interface for Job persistence
///
/// Constructed once per process and passed by `Arc` to every service that
/// needs it.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert a new job
    async fn insert(&self, job: &Job) -> Result<()>;

    /// Find job by ID
    async fn find_by_id(&self, id: &str) -> Result<Option<Job>>;

    /// Atomically claim the oldest `queued`/`test_connection` job
    ///
    /// FIFO by `created_at`, ties broken by id. The returned job is already
    /// `processing` in the store; a concurrent caller can never receive the same job.
    async fn claim_next(&self, worker_id: &str) -> Result<Option<Job>>;

    /// Persist a terminal outcome
    ///
    /// Conditional on the stored status still being `processing`; returns
    /// `InvalidState` otherwise and `NotFound` for unknown ids.
    async fn finish(&self, job: &Job) -> Result<()>;

    /// Compare-and-set `processing -> initial status` for a job whose
    /// `updated_at` is older than `stale_before`. Returns whether the job moved.
    async fn requeue(&self, id: &str, stale_before: i64) -> Result<bool>;

    /// Refresh `updated_at` of a job still `processing` under `worker_id`
    ///
    /// Keeps a long-running job out of orphan recovery. Returns false when the
    /// job is no longer held by that worker.
    async fn heartbeat(&self, id: &str, worker_id: &str) -> Result<bool>;

    /// Find all jobs by status, oldest first
    async fn find_by_status(&self, status: JobStatus) -> Result<Vec<Job>>;

    /// Count jobs by status
    async fn count_by_status(&self, status: JobStatus) -> Result<i64>;

    /// Most recently created jobs, newest first
    async fn list_recent(&self, limit: i64) -> Result<Vec<Job>>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use crate::port::TimeProvider;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// In-memory queue with the same claim/finish semantics as the SQLite store
    pub struct InMemoryJobRepository {
        jobs: Mutex<BTreeMap<String, Job>>,
        time_provider: Arc<dyn TimeProvider>,
        fail_finish: AtomicBool,
        finish_calls: AtomicUsize,
    }

    impl InMemoryJobRepository {
        pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
            Self {
                jobs: Mutex::new(BTreeMap::new()),
                time_provider,
                fail_finish: AtomicBool::new(false),
                finish_calls: AtomicUsize::new(0),
            }
        }

        /// Make every subsequent `finish` fail as if the store were unreachable
        pub fn set_fail_finish(&self, fail: bool) {
            self.fail_finish.store(fail, Ordering::SeqCst);
        }

        pub fn finish_calls(&self) -> usize {
            self.finish_calls.load(Ordering::SeqCst)
        }

        /// Overwrite a stored job (test setup only)
        pub fn put(&self, job: Job) {
            self.jobs.lock().unwrap().insert(job.id.clone(), job);
        }
    }

    #[async_trait]
    impl JobRepository for InMemoryJobRepository {
        async fn insert(&self, job: &Job) -> Result<()> {
            let mut jobs = self.jobs.lock().unwrap();
            if jobs.contains_key(&job.id) {
                return Err(AppError::Validation(format!("Job {} already exists", job.id)));
            }
            jobs.insert(job.id.clone(), job.clone());
            Ok(())
        }

        async fn find_by_id(&self, id: &str) -> Result<Option<Job>> {
            Ok(self.jobs.lock().unwrap().get(id).cloned())
        }

        async fn claim_next(&self, worker_id: &str) -> Result<Option<Job>> {
            let now = self.time_provider.now_millis();
            let mut jobs = self.jobs.lock().unwrap();
            let next_id = jobs
                .values()
                .filter(|j| j.status.is_claimable())
                .min_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)))
                .map(|j| j.id.clone());

            let Some(id) = next_id else {
                return Ok(None);
            };
            let job = jobs
                .get_mut(&id)
                .ok_or_else(|| AppError::NotFound(format!("Job {} not found", id)))?;
            job.claim(now, worker_id)?;
            Ok(Some(job.clone()))
        }

        async fn finish(&self, job: &Job) -> Result<()> {
            self.finish_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_finish.load(Ordering::SeqCst) {
                return Err(AppError::Database("store unreachable".to_string()));
            }
            let mut jobs = self.jobs.lock().unwrap();
            match jobs.get_mut(&job.id) {
                None => Err(AppError::NotFound(format!("Job {} not found", job.id))),
                Some(stored) if stored.status != JobStatus::Processing => {
                    Err(AppError::InvalidState(format!(
                        "Cannot update job {} from {} to {}",
                        job.id, stored.status, job.status
                    )))
                }
                Some(stored) => {
                    *stored = job.clone();
                    Ok(())
                }
            }
        }

        async fn requeue(&self, id: &str, stale_before: i64) -> Result<bool> {
            let now = self.time_provider.now_millis();
            let mut jobs = self.jobs.lock().unwrap();
            match jobs.get_mut(id) {
                Some(job)
                    if job.status == JobStatus::Processing && job.updated_at < stale_before =>
                {
                    job.requeue(now)?;
                    Ok(true)
                }
                Some(_) => Ok(false),
                None => Err(AppError::NotFound(format!("Job {} not found", id))),
            }
        }

        async fn heartbeat(&self, id: &str, worker_id: &str) -> Result<bool> {
            let now = self.time_provider.now_millis();
            let mut jobs = self.jobs.lock().unwrap();
            match jobs.get_mut(id) {
                Some(job)
                    if job.status == JobStatus::Processing
                        && job.claimed_by.as_deref() == Some(worker_id) =>
                {
                    job.updated_at = now;
                    Ok(true)
                }
                Some(_) => Ok(false),
                None => Err(AppError::NotFound(format!("Job {} not found", id))),
            }
        }

        async fn find_by_status(&self, status: JobStatus) -> Result<Vec<Job>> {
            let mut found: Vec<Job> = self
                .jobs
                .lock()
                .unwrap()
                .values()
                .filter(|j| j.status == status)
                .cloned()
                .collect();
            found.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
            Ok(found)
        }

        async fn count_by_status(&self, status: JobStatus) -> Result<i64> {
            Ok(self
                .jobs
                .lock()
                .unwrap()
                .values()
                .filter(|j| j.status == status)
                .count() as i64)
        }

        async fn list_recent(&self, limit: i64) -> Result<Vec<Job>> {
            let mut all: Vec<Job> = self.jobs.lock().unwrap().values().cloned().collect();
            all.sort_by(|a, b| (b.created_at, &b.id).cmp(&(a.created_at, &a.id)));
            all.truncate(limit.max(0) as usize);
            Ok(all)
        }
    }
}
