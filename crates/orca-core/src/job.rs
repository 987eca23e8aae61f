//! Job records and the status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::patch::JobPatch;
use crate::{Error, JobId, Result};

/// Status of a job in the pipeline.
///
/// Non-terminal statuses are ordered; a job only moves forward through them,
/// or jumps to `Failed`. `Pending` exists for completeness but creation
/// enqueues synchronously, so stored jobs start at `Queued`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Queued,
    Analyzing,
    #[serde(alias = "generating")]
    Building,
    Training,
    Deploying,
    Completed,
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 8] = [
        JobStatus::Pending,
        JobStatus::Queued,
        JobStatus::Analyzing,
        JobStatus::Building,
        JobStatus::Training,
        JobStatus::Deploying,
        JobStatus::Completed,
        JobStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Queued => "queued",
            JobStatus::Analyzing => "analyzing",
            JobStatus::Building => "building",
            JobStatus::Training => "training",
            JobStatus::Deploying => "deploying",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Position along the pipeline. `Failed` sits outside the order.
    fn stage(&self) -> Option<u8> {
        match self {
            JobStatus::Pending => Some(0),
            JobStatus::Queued => Some(1),
            JobStatus::Analyzing => Some(2),
            JobStatus::Building => Some(3),
            JobStatus::Training => Some(4),
            JobStatus::Deploying => Some(5),
            JobStatus::Completed => Some(6),
            JobStatus::Failed => None,
        }
    }

    /// Whether a job in `self` may be reported as `next`.
    ///
    /// Re-reporting the current status is always allowed so workers can attach
    /// fields without moving the job.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        if *self == next {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
        match (self.stage(), next.stage()) {
            (_, None) => true,
            (Some(current), Some(target)) => target > current,
            (None, Some(_)) => false,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "generating" => Ok(JobStatus::Building),
            _ => JobStatus::ALL
                .into_iter()
                .find(|status| status.as_str() == s)
                .ok_or_else(|| Error::InvalidInput(format!("unknown job status: {s}"))),
        }
    }
}

/// Pointers to what a worker produced for a job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRefs {
    /// Inference endpoint serving the trained model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Object store location of the model files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_path: Option<String>,
    /// Repository the generated code was published to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_actions_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gitlab_ci_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jenkinsfile_url: Option<String>,
}

/// Descriptive facts gathered while analyzing the source repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub python_files: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notebooks: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frameworks: Option<Vec<String>>,
}

/// A tracked unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub source_ref: String,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub result_refs: ResultRefs,
    #[serde(default)]
    pub metadata: JobMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// A freshly created job, already in `Queued`.
    pub fn new(source_ref: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            source_ref: source_ref.into(),
            status: JobStatus::Queued,
            error_message: None,
            result_refs: ResultRefs::default(),
            metadata: JobMetadata::default(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Apply a sparse patch in place.
    ///
    /// Validation happens before any field is touched, so a rejected patch
    /// leaves the job unchanged.
    pub fn apply(&mut self, patch: JobPatch, now: DateTime<Utc>) -> Result<()> {
        let next_status = patch.status.unwrap_or(self.status);
        if !self.status.can_transition_to(next_status) {
            return Err(Error::InvalidTransition {
                from: self.status,
                to: next_status,
            });
        }

        let mut error_message = self.error_message.clone();
        patch.error_message.apply_to(&mut error_message);
        if error_message.is_some() && next_status != JobStatus::Failed {
            return Err(Error::InvalidInput(
                "errorMessage may only be set on a failed job".to_string(),
            ));
        }

        self.status = next_status;
        self.error_message = error_message;

        let refs = patch.result_refs;
        let current = &mut self.result_refs;
        refs.endpoint.apply_to(&mut current.endpoint);
        refs.model_path.apply_to(&mut current.model_path);
        refs.repository_url.apply_to(&mut current.repository_url);
        refs.deployment_url.apply_to(&mut current.deployment_url);
        refs.github_actions_url.apply_to(&mut current.github_actions_url);
        refs.gitlab_ci_url.apply_to(&mut current.gitlab_ci_url);
        refs.jenkinsfile_url.apply_to(&mut current.jenkinsfile_url);

        let meta = patch.metadata;
        meta.python_files.apply_to(&mut self.metadata.python_files);
        meta.notebooks.apply_to(&mut self.metadata.notebooks);
        meta.frameworks.apply_to(&mut self.metadata.frameworks);

        if next_status.is_terminal() && self.completed_at.is_none() {
            self.completed_at = Some(now);
        }
        self.updated_at = now;
        Ok(())
    }
}
