//! Artifact discovery and zip bundling.

use bytes::Bytes;
use orca_core::artifact::ArtifactStore;
use orca_core::{Error, JobId, Result};
use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use tracing::{debug, info, warn};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// Fetch every artifact of a job, keyed by relative path.
///
/// Objects that disappear between listing and fetching are left out; any other
/// fetch failure fails the whole call.
pub async fn collect_all(
    store: &dyn ArtifactStore,
    job_id: &JobId,
) -> Result<BTreeMap<String, Bytes>> {
    let mut artifacts = BTreeMap::new();
    for path in store.list(job_id).await? {
        match store.get(job_id, &path).await {
            Ok(data) => {
                artifacts.insert(path.to_string(), data);
            }
            Err(Error::NotFound(_)) => {
                debug!(job_id = %job_id, path = %path, "Artifact vanished after listing");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(artifacts)
}

/// An in-memory zip archive of a job's artifacts.
#[derive(Debug, Clone)]
pub struct Bundle {
    pub data: Bytes,
    /// Relative paths written into the archive.
    pub entries: Vec<String>,
    /// Relative paths that could not be fetched.
    pub skipped: Vec<String>,
}

/// Pack every discovered artifact of a job into a zip archive.
///
/// Best effort: an artifact that fails to fetch is logged and left out, and
/// the archive is built from the rest. The call fails when the job prefix
/// cannot be listed, when the job has no artifacts, or when none of them
/// could be fetched.
pub async fn bundle(store: &dyn ArtifactStore, job_id: &JobId) -> Result<Bundle> {
    let paths = store.list(job_id).await?;
    if paths.is_empty() {
        return Err(Error::NotFound(format!("artifacts of job {job_id}")));
    }

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    let mut entries = Vec::with_capacity(paths.len());
    let mut skipped = Vec::new();

    for path in paths {
        let data = match store.get(job_id, &path).await {
            Ok(data) => data,
            Err(e) => {
                warn!(job_id = %job_id, path = %path, error = %e, "Skipping artifact in bundle");
                skipped.push(path.to_string());
                continue;
            }
        };
        writer
            .start_file(path.as_str(), options)
            .map_err(|e| Error::Dependency(format!("zip entry {path}: {e}")))?;
        writer
            .write_all(&data)
            .map_err(|e| Error::Dependency(format!("zip entry {path}: {e}")))?;
        entries.push(path.to_string());
    }

    if entries.is_empty() {
        return Err(Error::Dependency(format!(
            "none of the {} artifacts of job {job_id} could be fetched",
            skipped.len()
        )));
    }

    let archive = writer
        .finish()
        .map_err(|e| Error::Dependency(format!("zip finish: {e}")))?
        .into_inner();

    info!(
        job_id = %job_id,
        entries = entries.len(),
        skipped = skipped.len(),
        size = archive.len(),
        "Bundled artifacts"
    );

    Ok(Bundle {
        data: Bytes::from(archive),
        entries,
        skipped,
    })
}
