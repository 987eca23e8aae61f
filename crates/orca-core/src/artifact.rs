//! Artifact storage abstraction.
//!
//! Artifacts live under `jobs/{job_id}/{relative_path}` in an object store.
//! Relative paths may contain sub-prefixes (`ci/github.yml`).

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Error, JobId, Result};

/// Root prefix under which every job's artifacts are stored.
pub const JOBS_PREFIX: &str = "jobs";

/// Key prefix holding every artifact of `job_id`, without trailing slash.
pub fn job_prefix(job_id: &JobId) -> String {
    format!("{JOBS_PREFIX}/{job_id}")
}

/// A validated artifact path relative to its job prefix.
///
/// Construction normalizes away empty and `.` segments and rejects anything
/// that could resolve outside the prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ArtifactPath(String);

impl ArtifactPath {
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidPath(format!("{raw:?}: {reason}"));

        if raw.contains('\0') {
            return Err(invalid("contains NUL"));
        }
        if raw.contains('\\') {
            return Err(invalid("contains a backslash"));
        }
        if raw.starts_with('/') {
            return Err(invalid("absolute path"));
        }

        let mut segments = Vec::new();
        for segment in raw.split('/') {
            match segment {
                "" | "." => continue,
                ".." => return Err(invalid("parent directory segment")),
                s if segments.is_empty() && is_drive(s) => {
                    return Err(invalid("drive prefix"));
                }
                s => segments.push(s),
            }
        }

        if segments.is_empty() {
            return Err(invalid("empty path"));
        }
        Ok(Self(segments.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Full object key for this path under `job_id`.
    pub fn key_for(&self, job_id: &JobId) -> String {
        format!("{}/{}", job_prefix(job_id), self.0)
    }

    /// Last path segment, used as the download file name.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl std::fmt::Display for ArtifactPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A bare drive designator such as `C:`.
fn is_drive(segment: &str) -> bool {
    matches!(segment.as_bytes(), [letter, b':'] if letter.is_ascii_alphabetic())
}

/// Reference to a stored artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactRef {
    pub job_id: JobId,
    /// Path relative to the job prefix.
    pub path: String,
    /// Full object store key.
    pub key: String,
    /// Hex-encoded SHA-256 of the content.
    pub checksum: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

impl ArtifactRef {
    pub fn new(job_id: JobId, path: &ArtifactPath, data: &[u8]) -> Self {
        Self {
            job_id,
            path: path.as_str().to_string(),
            key: path.key_for(&job_id),
            checksum: hex::encode(Sha256::digest(data)),
            size: data.len() as u64,
            created_at: Utc::now(),
        }
    }
}

/// Trait for artifact storage backends.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store an artifact, replacing any object at the same path.
    async fn put(&self, job_id: &JobId, path: &ArtifactPath, data: Bytes) -> Result<ArtifactRef>;

    /// Fetch one artifact. Missing objects are `NotFound`.
    async fn get(&self, job_id: &JobId, path: &ArtifactPath) -> Result<Bytes>;

    /// Discover every artifact path under the job prefix, sorted.
    async fn list(&self, job_id: &JobId) -> Result<Vec<ArtifactPath>>;

    /// Delete every artifact under the job prefix, returning how many were removed.
    async fn delete_all(&self, job_id: &JobId) -> Result<usize>;

    /// Check that the backend is reachable.
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
