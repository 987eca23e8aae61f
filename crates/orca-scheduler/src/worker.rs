//! Worker harness that drains the work queue.
//!
//! The generation step itself lives behind [`JobProcessor`]; this module only
//! moves a job through `analyzing` and into its terminal state.

use async_trait::async_trait;
use orca_core::queue::{QueueMessage, WorkQueue};
use orca_core::{Error, Job, JobId, JobMetadata, JobStatus, ResultRefs, Result, StatusReport};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::JobManager;

/// Sink for worker progress reports.
#[async_trait]
pub trait StatusReporter: Send + Sync {
    async fn report(&self, job_id: JobId, report: StatusReport) -> Result<Job>;
}

#[async_trait]
impl StatusReporter for JobManager {
    async fn report(&self, job_id: JobId, report: StatusReport) -> Result<Job> {
        self.report_status(job_id, report).await
    }
}

/// What a successful run leaves on the job record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobOutput {
    pub result_refs: ResultRefs,
    pub metadata: JobMetadata,
}

/// Handle given to a processor for announcing intermediate stages.
pub struct Progress<'a> {
    job_id: JobId,
    reporter: &'a dyn StatusReporter,
}

impl<'a> Progress<'a> {
    pub fn new(job_id: JobId, reporter: &'a dyn StatusReporter) -> Self {
        Self { job_id, reporter }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub async fn stage(&self, status: JobStatus) -> Result<()> {
        self.report(StatusReport::new(status)).await
    }

    /// Report a non-terminal stage along with any partial fields.
    /// Terminal states are reserved for the worker.
    pub async fn report(&self, report: StatusReport) -> Result<()> {
        if report.status.is_terminal() {
            return Err(Error::InvalidInput(format!(
                "processors cannot report terminal status {}",
                report.status
            )));
        }
        self.reporter.report(self.job_id, report).await?;
        Ok(())
    }
}

/// The step that turns a source reference into deployable output.
#[async_trait]
pub trait JobProcessor: Send + Sync {
    /// Name of this processor.
    fn name(&self) -> &'static str;

    /// Run the job. An `Err` message ends up as the job's `errorMessage`.
    async fn process(
        &self,
        message: &QueueMessage,
        progress: &Progress<'_>,
    ) -> std::result::Result<JobOutput, String>;
}

/// A worker that takes jobs off the queue one at a time.
pub struct Worker {
    id: String,
    queue: Arc<dyn WorkQueue>,
    processor: Arc<dyn JobProcessor>,
    reporter: Arc<dyn StatusReporter>,
    retry_delay: Duration,
}

impl Worker {
    pub fn new(
        id: impl Into<String>,
        queue: Arc<dyn WorkQueue>,
        processor: Arc<dyn JobProcessor>,
        reporter: Arc<dyn StatusReporter>,
    ) -> Self {
        Self {
            id: id.into(),
            queue,
            processor,
            reporter,
            retry_delay: Duration::from_secs(5),
        }
    }

    /// Back-off after a failed dequeue.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Run the worker loop. Never returns.
    pub async fn run(&self) {
        info!(worker_id = %self.id, processor = self.processor.name(), "Starting worker");

        loop {
            if let Err(e) = self.process_next().await {
                match e {
                    Error::Dependency(_) => {
                        warn!(worker_id = %self.id, error = %e, "Failed to take job");
                        sleep(self.retry_delay).await;
                    }
                    _ => warn!(worker_id = %self.id, error = %e, "Abandoned job"),
                }
            }
        }
    }

    /// Wait for the next message and carry its job to a terminal state.
    pub async fn process_next(&self) -> Result<Job> {
        let message = self.queue.dequeue().await?;
        self.handle(message).await
    }

    /// Carry one dequeued job through processing.
    ///
    /// A job that can no longer enter `analyzing` (deleted, or already
    /// terminal) is dropped without running the processor.
    pub async fn handle(&self, message: QueueMessage) -> Result<Job> {
        let job_id = message.job_id;
        info!(worker_id = %self.id, job_id = %job_id, source_ref = %message.source_ref, "Took job");

        self.reporter
            .report(job_id, StatusReport::new(JobStatus::Analyzing))
            .await?;

        let progress = Progress::new(job_id, self.reporter.as_ref());
        let report = match self.processor.process(&message, &progress).await {
            Ok(output) => StatusReport::new(JobStatus::Completed)
                .with_result_refs(output.result_refs)
                .with_metadata(output.metadata),
            Err(message) => {
                error!(job_id = %job_id, error = %message, "Job processing failed");
                StatusReport::failed(message)
            }
        };

        let job = self.reporter.report(job_id, report).await?;
        info!(worker_id = %self.id, job_id = %job_id, status = %job.status, "Finished job");
        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryWorkQueue;
    use orca_artifacts::ObjectArtifactStore;
    use orca_db::MemoryJobStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Walks through the build stages and returns a fixed endpoint.
    struct StagedProcessor {
        runs: AtomicUsize,
    }

    #[async_trait]
    impl JobProcessor for StagedProcessor {
        fn name(&self) -> &'static str {
            "staged"
        }

        async fn process(
            &self,
            message: &QueueMessage,
            progress: &Progress<'_>,
        ) -> std::result::Result<JobOutput, String> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            progress
                .report(StatusReport::new(JobStatus::Building).with_metadata(JobMetadata {
                    python_files: Some(3),
                    notebooks: Some(0),
                    frameworks: Some(vec!["pytorch".to_string()]),
                }))
                .await
                .map_err(|e| e.to_string())?;
            progress
                .stage(JobStatus::Deploying)
                .await
                .map_err(|e| e.to_string())?;
            if message.source_ref.contains("broken") {
                return Err("no model found".to_string());
            }
            Ok(JobOutput {
                result_refs: ResultRefs {
                    endpoint: Some(format!("http://models/{}", progress.job_id())),
                    ..Default::default()
                },
                metadata: JobMetadata::default(),
            })
        }
    }

    struct Harness {
        manager: Arc<JobManager>,
        processor: Arc<StagedProcessor>,
        worker: Worker,
    }

    fn harness() -> Harness {
        let queue = Arc::new(MemoryWorkQueue::new());
        let manager = Arc::new(JobManager::new(
            Arc::new(MemoryJobStore::new()),
            queue.clone(),
            Arc::new(ObjectArtifactStore::in_memory()),
        ));
        let processor = Arc::new(StagedProcessor {
            runs: AtomicUsize::new(0),
        });
        let worker = Worker::new("worker-1", queue, processor.clone(), manager.clone());
        Harness {
            manager,
            processor,
            worker,
        }
    }

    #[tokio::test]
    async fn test_process_next_completes_job() {
        let h = harness();
        let job = h.manager.create_job("https://example.com/repo").await.unwrap();

        let done = h.worker.process_next().await.unwrap();
        assert_eq!(done.id, job.id);
        assert_eq!(done.status, JobStatus::Completed);
        assert!(done.completed_at.is_some());
        assert_eq!(
            done.result_refs.endpoint,
            Some(format!("http://models/{}", job.id))
        );
        // Metadata reported mid-run survives the final report.
        assert_eq!(done.metadata.python_files, Some(3));
        assert_eq!(done.metadata.frameworks, Some(vec!["pytorch".to_string()]));
    }

    #[tokio::test]
    async fn test_processor_error_fails_job() {
        let h = harness();
        let job = h.manager.create_job("https://example.com/broken").await.unwrap();

        let done = h.worker.process_next().await.unwrap();
        assert_eq!(done.status, JobStatus::Failed);
        assert_eq!(done.error_message.as_deref(), Some("no model found"));
        assert_eq!(h.manager.get_job(job.id).await.unwrap().status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_deleted_job_is_skipped() {
        let h = harness();
        let job = h.manager.create_job("https://example.com/repo").await.unwrap();
        h.manager.delete_job(job.id).await.unwrap();

        let err = h.worker.process_next().await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(h.processor.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_progress_rejects_terminal_status() {
        let h = harness();
        let job = h.manager.create_job("https://example.com/repo").await.unwrap();
        let progress = Progress::new(job.id, h.manager.as_ref());

        let err = progress.stage(JobStatus::Completed).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(h.manager.get_job(job.id).await.unwrap().status, JobStatus::Queued);
    }

    #[tokio::test]
    async fn test_run_drains_queue() {
        let Harness {
            manager, worker, ..
        } = harness();
        let first = manager.create_job("https://example.com/a").await.unwrap();
        let second = manager.create_job("https://example.com/broken").await.unwrap();

        let worker = tokio::spawn(async move { worker.run().await });

        let settled = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let a = manager.get_job(first.id).await.unwrap();
                let b = manager.get_job(second.id).await.unwrap();
                if a.status.is_terminal() && b.status.is_terminal() {
                    return (a.status, b.status);
                }
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        worker.abort();

        assert_eq!(settled, (JobStatus::Completed, JobStatus::Failed));
    }
}
