//! PostgreSQL job store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orca_core::{Job, JobId, JobMetadata, JobPatch, ResultRefs};
use sqlx::PgPool;

use super::JobStore;
use crate::{DbError, DbResult};

/// A row of the `jobs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct JobRecord {
    id: uuid::Uuid,
    source_ref: String,
    status: String,
    error_message: Option<String>,
    result_refs: serde_json::Value,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<JobRecord> for Job {
    type Error = DbError;

    fn try_from(record: JobRecord) -> DbResult<Self> {
        let corrupt = |what: &str, err: &dyn std::fmt::Display| {
            DbError::Corrupt(format!("job {}: {what}: {err}", record.id))
        };
        let status = record
            .status
            .parse()
            .map_err(|e| corrupt("status", &e))?;
        let result_refs: ResultRefs = serde_json::from_value(record.result_refs.clone())
            .map_err(|e| corrupt("result_refs", &e))?;
        let metadata: JobMetadata = serde_json::from_value(record.metadata.clone())
            .map_err(|e| corrupt("metadata", &e))?;

        Ok(Job {
            id: record.id.into(),
            source_ref: record.source_ref,
            status,
            error_message: record.error_message,
            result_refs,
            metadata,
            created_at: record.created_at,
            updated_at: record.updated_at,
            completed_at: record.completed_at,
        })
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> DbResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| DbError::Corrupt(e.to_string()))
}

/// PostgreSQL implementation of JobStore.
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create(&self, job: &Job) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO jobs (id, source_ref, status, error_message, result_refs, metadata,
                              created_at, updated_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(job.id.as_uuid())
        .bind(&job.source_ref)
        .bind(job.status.as_str())
        .bind(&job.error_message)
        .bind(to_json(&job.result_refs)?)
        .bind(to_json(&job.metadata)?)
        .bind(job.created_at)
        .bind(job.updated_at)
        .bind(job.completed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                DbError::Duplicate(format!("job {}", job.id))
            }
            other => DbError::Database(other),
        })?;
        Ok(())
    }

    async fn get(&self, id: JobId) -> DbResult<Job> {
        let record = sqlx::query_as::<_, JobRecord>("SELECT * FROM jobs WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("job {}", id)))?;
        record.try_into()
    }

    async fn list(&self, limit: usize) -> DbResult<Vec<Job>> {
        let records = sqlx::query_as::<_, JobRecord>(
            "SELECT * FROM jobs ORDER BY created_at DESC, id DESC LIMIT $1",
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        records.into_iter().map(Job::try_from).collect()
    }

    async fn update(&self, id: JobId, patch: JobPatch) -> DbResult<Job> {
        let mut tx = self.pool.begin().await?;

        let record =
            sqlx::query_as::<_, JobRecord>("SELECT * FROM jobs WHERE id = $1 FOR UPDATE")
                .bind(id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| DbError::NotFound(format!("job {}", id)))?;

        let mut job = Job::try_from(record)?;
        job.apply(patch, Utc::now())?;

        sqlx::query(
            r#"
            UPDATE jobs
            SET status = $2, error_message = $3, result_refs = $4, metadata = $5,
                updated_at = $6, completed_at = $7
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(job.status.as_str())
        .bind(&job.error_message)
        .bind(to_json(&job.result_refs)?)
        .bind(to_json(&job.metadata)?)
        .bind(job.updated_at)
        .bind(job.completed_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(job)
    }

    async fn delete(&self, id: JobId) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("job {}", id)));
        }
        Ok(())
    }

    async fn ping(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
