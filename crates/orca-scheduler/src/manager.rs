//! Job lifecycle coordination.

use bytes::Bytes;
use orca_artifacts::Bundle;
use orca_core::artifact::{ArtifactPath, ArtifactStore};
use orca_core::queue::WorkQueue;
use orca_core::{Error, Job, JobId, Result, StatusReport};
use orca_db::JobStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info};

/// Coordinates the job store, the work queue and the artifact store.
///
/// Cheap to share behind an `Arc`; every operation is safe to call from many
/// tasks at once.
pub struct JobManager {
    jobs: Arc<dyn JobStore>,
    queue: Arc<dyn WorkQueue>,
    artifacts: Arc<dyn ArtifactStore>,
}

impl JobManager {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        queue: Arc<dyn WorkQueue>,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            jobs,
            queue,
            artifacts,
        }
    }

    /// Persist a new job in `queued` and hand it to the work queue.
    ///
    /// If the enqueue fails the record stays behind in `queued` and the error
    /// is returned to the caller.
    pub async fn create_job(&self, source_ref: &str) -> Result<Job> {
        let source_ref = source_ref.trim();
        if source_ref.is_empty() {
            return Err(Error::InvalidInput("sourceRef is required".to_string()));
        }

        let job = Job::new(source_ref);
        self.jobs.create(&job).await?;

        if let Err(e) = self.queue.enqueue(job.id, &job.source_ref).await {
            error!(job_id = %job.id, error = %e, "Failed to enqueue job");
            return Err(e);
        }

        info!(job_id = %job.id, source_ref = %job.source_ref, "Created job");
        Ok(job)
    }

    pub async fn get_job(&self, id: JobId) -> Result<Job> {
        Ok(self.jobs.get(id).await?)
    }

    /// Newest first, at most `limit` jobs.
    pub async fn list_jobs(&self, limit: usize) -> Result<Vec<Job>> {
        Ok(self.jobs.list(limit).await?)
    }

    /// Apply a worker's progress report and return the updated job.
    pub async fn report_status(&self, id: JobId, report: StatusReport) -> Result<Job> {
        let status = report.status;
        let job = self.jobs.update(id, report.into()).await?;
        info!(job_id = %id, status = %status, "Job status updated");
        Ok(job)
    }

    /// Every artifact of a job, keyed by path relative to the job prefix.
    pub async fn get_artifacts(&self, id: JobId) -> Result<BTreeMap<String, Bytes>> {
        let artifacts = orca_artifacts::collect_all(self.artifacts.as_ref(), &id).await?;
        if artifacts.is_empty() {
            return Err(Error::NotFound(format!("artifacts of job {id}")));
        }
        Ok(artifacts)
    }

    /// Fetch one artifact. The path is validated before the store is touched.
    pub async fn download_artifact(
        &self,
        id: JobId,
        raw_path: &str,
    ) -> Result<(ArtifactPath, Bytes)> {
        let path = ArtifactPath::parse(raw_path)?;
        let data = self.artifacts.get(&id, &path).await?;
        Ok((path, data))
    }

    pub async fn bundle_artifacts(&self, id: JobId) -> Result<Bundle> {
        orca_artifacts::bundle(self.artifacts.as_ref(), &id).await
    }

    /// Check that the job store and the artifact store both answer.
    pub async fn check_ready(&self) -> Result<()> {
        self.jobs.ping().await?;
        self.artifacts.ping().await
    }

    /// Remove the job record. Its artifacts stay in the store.
    pub async fn delete_job(&self, id: JobId) -> Result<()> {
        self.jobs.delete(id).await?;
        info!(job_id = %id, "Deleted job");
        Ok(())
    }

    /// Remove the job record and every artifact under its prefix.
    ///
    /// Returns the number of artifacts removed.
    pub async fn delete_job_cascade(&self, id: JobId) -> Result<usize> {
        self.jobs.delete(id).await?;
        let removed = self.artifacts.delete_all(&id).await?;
        info!(job_id = %id, artifacts = removed, "Deleted job and artifacts");
        Ok(removed)
    }
}
