// SQLite JobRepository Implementation

use async_trait::async_trait;
use smarthvac_core::domain::{Job, JobKind, JobRequest, JobStatus};
use smarthvac_core::error::{AppError, Result};
use smarthvac_core::port::{JobRepository, TimeProvider};
use sqlx::SqlitePool;
use std::sync::Arc;

/// CHECK constraint names from `001_initial_schema.sql`
const SINGLE_OUTCOME: &str = "jobs_single_outcome";
const STATUS_KNOWN: &str = "jobs_status_known";
const KIND_KNOWN: &str = "jobs_kind_known";

// sqlx::Error -> AppError; the jobs table CHECKs get their own variants
fn map_sqlx_error(err: sqlx::Error) -> AppError {
    let sqlx::Error::Database(db_err) = &err else {
        return AppError::Database(err.to_string());
    };
    let message = db_err.message();
    if db_err.is_check_violation() && message.contains(SINGLE_OUTCOME) {
        AppError::InvalidState("a job cannot record both an error and a result".to_string())
    } else if db_err.is_check_violation()
        && (message.contains(STATUS_KNOWN) || message.contains(KIND_KNOWN))
    {
        AppError::Validation(format!("unknown job status or kind ({})", message))
    } else {
        AppError::Database(message.to_string())
    }
}

/// Job queue backed by one SQLite file
///
/// Every state change is a single conditional UPDATE, so any number of
/// worker processes can share the file without double-claiming.
pub struct SqliteJobRepository {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteJobRepository {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }

    /// Distinguish "no such job" from "job is not in the expected status"
    async fn explain_missed_update(&self, id: &str, expected: JobStatus) -> AppError {
        match self.find_by_id(id).await {
            Ok(Some(stored)) => AppError::InvalidState(format!(
                "Job {} is {}, expected {}",
                id, stored.status, expected
            )),
            Ok(None) => AppError::NotFound(format!("Job {} not found", id)),
            Err(e) => e,
        }
    }
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    async fn insert(&self, job: &Job) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, kind, status, created_at, updated_at, request,
                error_message, result_path, result_summary, idf_path, artifacts,
                claimed_by, claimed_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(job.kind.as_str())
        .bind(job.status.as_str())
        .bind(job.created_at)
        .bind(job.updated_at)
        .bind(serde_json::to_string(&job.request)?)
        .bind(&job.error_message)
        .bind(&job.result_path)
        .bind(&job.result_summary)
        .bind(&job.idf_path)
        .bind(serde_json::to_string(&job.artifacts)?)
        .bind(&job.claimed_by)
        .bind(job.claimed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Validation(format!("Job {} already exists", job.id))
            }
            other => map_sqlx_error(other),
        })?;

        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(JobRow::into_job).transpose()
    }

    async fn claim_next(&self, worker_id: &str) -> Result<Option<Job>> {
        let now = self.time_provider.now_millis();

        // The outer status guard makes the claim a compare-and-set even if
        // another writer slipped in between the subquery and the update.
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE jobs
            SET status = ?, updated_at = ?, claimed_by = ?, claimed_at = ?
            WHERE id = (
                SELECT id FROM jobs
                WHERE status IN (?, ?)
                ORDER BY created_at ASC, id ASC
                LIMIT 1
            )
            AND status IN (?, ?)
            RETURNING *
            "#,
        )
        .bind(JobStatus::Processing.as_str())
        .bind(now)
        .bind(worker_id)
        .bind(now)
        .bind(JobStatus::Queued.as_str())
        .bind(JobStatus::TestConnection.as_str())
        .bind(JobStatus::Queued.as_str())
        .bind(JobStatus::TestConnection.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(JobRow::into_job).transpose()
    }

    async fn finish(&self, job: &Job) -> Result<()> {
        if !job.is_terminal() || !job.invariant_holds() {
            return Err(AppError::InvalidState(format!(
                "Job {} cannot be finished as {}",
                job.id, job.status
            )));
        }

        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = ?, updated_at = ?, error_message = ?, result_path = ?,
                result_summary = ?, idf_path = ?, artifacts = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(job.status.as_str())
        .bind(job.updated_at)
        .bind(&job.error_message)
        .bind(&job.result_path)
        .bind(&job.result_summary)
        .bind(&job.idf_path)
        .bind(serde_json::to_string(&job.artifacts)?)
        .bind(&job.id)
        .bind(JobStatus::Processing.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(self.explain_missed_update(&job.id, JobStatus::Processing).await);
        }
        Ok(())
    }

    async fn requeue(&self, id: &str, stale_before: i64) -> Result<bool> {
        let now = self.time_provider.now_millis();

        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = CASE kind WHEN ? THEN ? ELSE ? END,
                updated_at = ?, claimed_by = NULL, claimed_at = NULL
            WHERE id = ? AND status = ? AND updated_at < ?
            "#,
        )
        .bind(JobKind::ConnectionTest.as_str())
        .bind(JobKind::ConnectionTest.initial_status().as_str())
        .bind(JobKind::Simulation.initial_status().as_str())
        .bind(now)
        .bind(id)
        .bind(JobStatus::Processing.as_str())
        .bind(stale_before)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }
        match self.find_by_id(id).await? {
            Some(_) => Ok(false),
            None => Err(AppError::NotFound(format!("Job {} not found", id))),
        }
    }

    async fn heartbeat(&self, id: &str, worker_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE jobs SET updated_at = ? WHERE id = ? AND status = ? AND claimed_by = ?",
        )
        .bind(self.time_provider.now_millis())
        .bind(id)
        .bind(JobStatus::Processing.as_str())
        .bind(worker_id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }
        match self.find_by_id(id).await? {
            Some(_) => Ok(false),
            None => Err(AppError::NotFound(format!("Job {} not found", id))),
        }
    }

    async fn find_by_status(&self, status: JobStatus) -> Result<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(
            "SELECT * FROM jobs WHERE status = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(JobRow::into_job).collect()
    }

    async fn count_by_status(&self, status: JobStatus) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(count)
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(
            "SELECT * FROM jobs ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(JobRow::into_job).collect()
    }
}

#[derive(sqlx::FromRow)]
struct JobRow {
    id: String,
    kind: String,
    status: String,
    created_at: i64,
    updated_at: i64,
    request: String, // JSON
    error_message: Option<String>,
    result_path: Option<String>,
    result_summary: Option<String>,
    idf_path: Option<String>,
    artifacts: String, // JSON array
    claimed_by: Option<String>,
    claimed_at: Option<i64>,
}

impl JobRow {
    fn into_job(self) -> Result<Job> {
        let status: JobStatus = self.status.parse()?;
        let kind: JobKind = self.kind.parse()?;
        let request: JobRequest = serde_json::from_str(&self.request)?;
        let artifacts: Vec<String> = serde_json::from_str(&self.artifacts)?;

        Ok(Job {
            id: self.id,
            kind,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
            request,
            error_message: self.error_message,
            result_path: self.result_path,
            result_summary: self.result_summary,
            idf_path: self.idf_path,
            artifacts,
            claimed_by: self.claimed_by,
            claimed_at: self.claimed_at,
        })
    }
}
