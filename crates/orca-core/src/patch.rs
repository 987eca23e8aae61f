//! Sparse updates to job records.
//!
//! Every optional field in a patch is tri-state. On the JSON wire an absent key
//! leaves the stored value alone, `null` clears it, and any other value
//! (including `""` or `0`) replaces it.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::JobStatus;

/// Update instruction for a single optional field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FieldUpdate<T> {
    #[default]
    Unchanged,
    Set(T),
    Clear,
}

impl<T> FieldUpdate<T> {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, FieldUpdate::Unchanged)
    }

    pub fn apply_to(self, target: &mut Option<T>) {
        match self {
            FieldUpdate::Unchanged => {}
            FieldUpdate::Set(value) => *target = Some(value),
            FieldUpdate::Clear => *target = None,
        }
    }
}

impl<T> From<Option<T>> for FieldUpdate<T> {
    /// `None` means "not supplied", never "clear".
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => FieldUpdate::Set(v),
            None => FieldUpdate::Unchanged,
        }
    }
}

// Absent keys never reach this impl; `#[serde(default)]` yields `Unchanged`.
impl<'de, T: Deserialize<'de>> Deserialize<'de> for FieldUpdate<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => FieldUpdate::Set(value),
            None => FieldUpdate::Clear,
        })
    }
}

// Callers pair this with `skip_serializing_if = "FieldUpdate::is_unchanged"`.
impl<T: Serialize> Serialize for FieldUpdate<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldUpdate::Set(value) => serializer.serialize_some(value),
            FieldUpdate::Unchanged | FieldUpdate::Clear => serializer.serialize_none(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRefsPatch {
    #[serde(default, skip_serializing_if = "FieldUpdate::is_unchanged")]
    pub endpoint: FieldUpdate<String>,
    #[serde(default, skip_serializing_if = "FieldUpdate::is_unchanged")]
    pub model_path: FieldUpdate<String>,
    #[serde(default, skip_serializing_if = "FieldUpdate::is_unchanged")]
    pub repository_url: FieldUpdate<String>,
    #[serde(default, skip_serializing_if = "FieldUpdate::is_unchanged")]
    pub deployment_url: FieldUpdate<String>,
    #[serde(default, skip_serializing_if = "FieldUpdate::is_unchanged")]
    pub github_actions_url: FieldUpdate<String>,
    #[serde(default, skip_serializing_if = "FieldUpdate::is_unchanged")]
    pub gitlab_ci_url: FieldUpdate<String>,
    #[serde(default, skip_serializing_if = "FieldUpdate::is_unchanged")]
    pub jenkinsfile_url: FieldUpdate<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataPatch {
    #[serde(default, skip_serializing_if = "FieldUpdate::is_unchanged")]
    pub python_files: FieldUpdate<u32>,
    #[serde(default, skip_serializing_if = "FieldUpdate::is_unchanged")]
    pub notebooks: FieldUpdate<u32>,
    #[serde(default, skip_serializing_if = "FieldUpdate::is_unchanged")]
    pub frameworks: FieldUpdate<Vec<String>>,
}

/// A sparse patch to a job record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(default, skip_serializing_if = "FieldUpdate::is_unchanged")]
    pub error_message: FieldUpdate<String>,
    #[serde(default)]
    pub result_refs: ResultRefsPatch,
    #[serde(default)]
    pub metadata: MetadataPatch,
}

impl JobPatch {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

/// A worker's progress report: a status plus optional sparse fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "FieldUpdate::is_unchanged")]
    pub error_message: FieldUpdate<String>,
    #[serde(default)]
    pub result_refs: ResultRefsPatch,
    #[serde(default)]
    pub metadata: MetadataPatch,
}

impl StatusReport {
    pub fn new(status: JobStatus) -> Self {
        Self {
            status,
            error_message: FieldUpdate::Unchanged,
            result_refs: ResultRefsPatch::default(),
            metadata: MetadataPatch::default(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error_message: FieldUpdate::Set(message.into()),
            ..Self::new(JobStatus::Failed)
        }
    }

    pub fn with_result_refs(mut self, refs: crate::ResultRefs) -> Self {
        self.result_refs = refs.into();
        self
    }

    pub fn with_metadata(mut self, metadata: crate::JobMetadata) -> Self {
        self.metadata = metadata.into();
        self
    }
}

impl From<StatusReport> for JobPatch {
    fn from(report: StatusReport) -> Self {
        Self {
            status: Some(report.status),
            error_message: report.error_message,
            result_refs: report.result_refs,
            metadata: report.metadata,
        }
    }
}

impl From<crate::ResultRefs> for ResultRefsPatch {
    /// Fields the worker left empty stay unchanged on the stored record.
    fn from(refs: crate::ResultRefs) -> Self {
        Self {
            endpoint: refs.endpoint.into(),
            model_path: refs.model_path.into(),
            repository_url: refs.repository_url.into(),
            deployment_url: refs.deployment_url.into(),
            github_actions_url: refs.github_actions_url.into(),
            gitlab_ci_url: refs.gitlab_ci_url.into(),
            jenkinsfile_url: refs.jenkinsfile_url.into(),
        }
    }
}

impl From<crate::JobMetadata> for MetadataPatch {
    fn from(meta: crate::JobMetadata) -> Self {
        Self {
            python_files: meta.python_files.into(),
            notebooks: meta.notebooks.into(),
            frameworks: meta.frameworks.into(),
        }
    }
}
