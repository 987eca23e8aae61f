//! In-process job store for development and tests.

use async_trait::async_trait;
use chrono::Utc;
use orca_core::{Job, JobId, JobPatch};
use std::cmp::Reverse;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::JobStore;
use crate::{DbError, DbResult};

/// Job store held in a map behind an async lock. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, job: &Job) -> DbResult<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(DbError::Duplicate(format!("job {}", job.id)));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn get(&self, id: JobId) -> DbResult<Job> {
        self.jobs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| DbError::NotFound(format!("job {}", id)))
    }

    async fn list(&self, limit: usize) -> DbResult<Vec<Job>> {
        let mut jobs: Vec<Job> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by_key(|job| Reverse((job.created_at, job.id)));
        jobs.truncate(limit);
        Ok(jobs)
    }

    async fn update(&self, id: JobId, patch: JobPatch) -> DbResult<Job> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| DbError::NotFound(format!("job {}", id)))?;
        job.apply(patch, Utc::now())?;
        Ok(job.clone())
    }

    async fn delete(&self, id: JobId) -> DbResult<()> {
        self.jobs
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| DbError::NotFound(format!("job {}", id)))
    }
}
