//! Job repository: active jobs, their history, and dead letters.

use chrono::{DateTime, Utc};
use dispatch_core::{Job, JobId, JobStatus};
use serde::{Deserialize, Serialize};
use surrealdb::sql::Thing;

use crate::{DbError, get_db};

/// Repository for job persistence operations.
pub struct JobRepository;

/// Internal record type for SurrealDB.
#[derive(Debug, Serialize, Deserialize)]
struct JobRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<Thing>,
    job: Job,
}

impl JobRecord {
    fn new(job: &Job) -> Self {
        Self {
            id: None,
            job: job.clone(),
        }
    }
}

/// Archived outcome of a job that reached a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobHistoryRecord {
    pub job_id: String,
    pub queue_name: String,
    pub name: String,
    pub correlation_id: String,
    pub final_status: String,
    pub attempts: u32,
    pub duration_ms: Option<u64>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// A job that will not be delivered again, with the envelope kept for replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterRecord {
    pub job_id: String,
    pub queue_name: String,
    pub name: String,
    pub correlation_id: String,
    pub data: String,
    pub error: String,
    pub attempts: u32,
    pub failed_at: DateTime<Utc>,
}

impl JobRepository {
    /// Persist a newly accepted job.
    ///
    /// Fails with `AlreadyExists` if the id is stored or has already finished.
    pub async fn create(job: &Job) -> Result<Job, DbError> {
        let db = get_db()?;

        if Self::exists(job.id).await? {
            return Err(DbError::AlreadyExists(format!("Job {}", job.id)));
        }
        if Self::is_archived(job.id).await? {
            return Err(DbError::AlreadyExists(format!("Job {} (finished)", job.id)));
        }

        let record: Option<JobRecord> = db
            .create(("job", job.id.to_string()))
            .content(JobRecord::new(job))
            .await?;

        record
            .map(|r| r.job)
            .ok_or_else(|| DbError::Query("Failed to create job".into()))
    }

    /// Get a job by ID.
    pub async fn get(id: JobId) -> Result<Job, DbError> {
        let db = get_db()?;

        let record: Option<JobRecord> = db.select(("job", id.to_string())).await?;

        record
            .map(|r| r.job)
            .ok_or_else(|| DbError::NotFound(format!("Job not found: {}", id)))
    }

    /// Whether an active job with this id is stored.
    pub async fn exists(id: JobId) -> Result<bool, DbError> {
        let db = get_db()?;
        let record: Option<JobRecord> = db.select(("job", id.to_string())).await?;
        Ok(record.is_some())
    }

    /// Replace the stored job with `job`.
    pub async fn update(job: &Job) -> Result<Job, DbError> {
        let db = get_db()?;

        let mut updated = job.clone();
        updated.updated_at = Utc::now();

        let record: Option<JobRecord> = db
            .update(("job", job.id.to_string()))
            .content(JobRecord::new(&updated))
            .await?;

        record
            .map(|r| r.job)
            .ok_or_else(|| DbError::NotFound(format!("Job not found: {}", job.id)))
    }

    /// Delete a job.
    pub async fn delete(id: JobId) -> Result<(), DbError> {
        let db = get_db()?;

        let _: Option<JobRecord> = db.delete(("job", id.to_string())).await?;

        Ok(())
    }

    /// Jobs of a queue that still need delivering, oldest first.
    pub async fn list_unfinished(queue_name: &str) -> Result<Vec<Job>, DbError> {
        let db = get_db()?;

        let mut result = db
            .query(
                r#"
                SELECT * FROM job
                WHERE job.queue_name = $queue_name
                  AND job.status.state IN ["waiting", "delayed", "active"]
                "#,
            )
            .bind(("queue_name", queue_name.to_string()))
            .await?;

        let records: Vec<JobRecord> = result.take(0)?;

        let mut jobs: Vec<Job> = records.into_iter().map(|r| r.job).collect();
        jobs.sort_by_key(|job| job.created_at);
        Ok(jobs)
    }

    /// Archive a terminal job to history and delete it from active jobs.
    pub async fn archive(job: &Job) -> Result<(), DbError> {
        let db = get_db()?;

        let (final_status, duration_ms, error) = match &job.status {
            JobStatus::Completed {
                started_at,
                completed_at,
            } => {
                let duration = (*completed_at - *started_at).num_milliseconds().max(0) as u64;
                ("completed", Some(duration), None)
            }
            JobStatus::Failed { error, .. } => ("failed", None, Some(error.clone())),
            _ => return Ok(()), // Don't archive non-terminal jobs
        };

        let history = JobHistoryRecord {
            job_id: job.id.to_string(),
            queue_name: job.queue_name.clone(),
            name: job.name.clone(),
            correlation_id: job.message.correlation_id.to_string(),
            final_status: final_status.to_string(),
            attempts: job.attempts,
            duration_ms,
            error,
            created_at: job.created_at,
            finished_at: Utc::now(),
        };

        let _: Option<serde_json::Value> = db.create("job_history").content(history).await?;

        Self::delete(job.id).await?;

        Ok(())
    }

    /// Record a failed job as a dead letter, then archive it.
    pub async fn dead_letter(job: &Job) -> Result<(), DbError> {
        let db = get_db()?;

        let (error, failed_at) = match &job.status {
            JobStatus::Failed { error, failed_at } => (error.clone(), *failed_at),
            other => {
                return Err(DbError::Query(format!(
                    "Job {} is {}, only failed jobs can be dead-lettered",
                    job.id,
                    other.as_str()
                )));
            }
        };

        let letter = DeadLetterRecord {
            job_id: job.id.to_string(),
            queue_name: job.queue_name.clone(),
            name: job.name.clone(),
            correlation_id: job.message.correlation_id.to_string(),
            data: job.message.data.clone(),
            error,
            attempts: job.attempts,
            failed_at,
        };

        let _: Option<serde_json::Value> = db
            .create(("dead_letter", job.id.to_string()))
            .content(letter)
            .await?;

        Self::archive(job).await
    }

    /// Dead letters recorded for a queue.
    pub async fn list_dead_letters(queue_name: &str) -> Result<Vec<DeadLetterRecord>, DbError> {
        let db = get_db()?;

        let mut result = db
            .query("SELECT * OMIT id FROM dead_letter WHERE queue_name = $queue_name")
            .bind(("queue_name", queue_name.to_string()))
            .await?;

        let mut letters: Vec<DeadLetterRecord> = result.take(0)?;
        letters.sort_by_key(|l| l.failed_at);
        Ok(letters)
    }

    /// Whether a job with this id reached a terminal state.
    pub async fn is_archived(id: JobId) -> Result<bool, DbError> {
        let db = get_db()?;

        let mut result = db
            .query("SELECT job_id FROM job_history WHERE job_id = $job_id LIMIT 1")
            .bind(("job_id", id.to_string()))
            .await?;

        let found: Vec<serde_json::Value> = result.take(0)?;
        Ok(!found.is_empty())
    }

    /// History entries for a job id.
    pub async fn history(id: JobId) -> Result<Vec<JobHistoryRecord>, DbError> {
        let db = get_db()?;

        let mut result = db
            .query("SELECT * OMIT id FROM job_history WHERE job_id = $job_id")
            .bind(("job_id", id.to_string()))
            .await?;

        let records: Vec<JobHistoryRecord> = result.take(0)?;
        Ok(records)
    }
}
