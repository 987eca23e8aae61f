//! `ArtifactStore` over the `object_store` crate.

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::{Path as ObjectPath, PathPart};
use object_store::{ObjectStore, PutPayload};
use orca_config::{ArtifactBackend, ArtifactStoreConfig};
use orca_core::artifact::{ArtifactPath, ArtifactRef, ArtifactStore, JOBS_PREFIX, job_prefix};
use orca_core::{Error, JobId, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Artifact store backed by any `object_store` implementation.
#[derive(Clone)]
pub struct ObjectArtifactStore {
    store: Arc<dyn ObjectStore>,
}

impl ObjectArtifactStore {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Process-local store; contents vanish on restart.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()))
    }

    /// Build the backend selected in configuration.
    pub fn from_config(config: &ArtifactStoreConfig) -> Result<Self> {
        let store: Arc<dyn ObjectStore> = match config.backend {
            ArtifactBackend::Memory => Arc::new(InMemory::new()),
            ArtifactBackend::Local => {
                let root = config
                    .root
                    .as_deref()
                    .ok_or_else(|| Error::InvalidInput("artifacts root not set".to_string()))?;
                std::fs::create_dir_all(root).map_err(Error::dependency)?;
                Arc::new(LocalFileSystem::new_with_prefix(root).map_err(Error::dependency)?)
            }
            ArtifactBackend::S3 => {
                let bucket = config
                    .bucket
                    .as_deref()
                    .ok_or_else(|| Error::InvalidInput("artifacts bucket not set".to_string()))?;
                let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);
                if let Some(region) = &config.region {
                    builder = builder.with_region(region);
                }
                if let Some(endpoint) = &config.endpoint {
                    builder = builder.with_endpoint(endpoint);
                }
                if let Some(key) = &config.access_key {
                    builder = builder.with_access_key_id(key);
                }
                if let Some(secret) = &config.secret_key {
                    builder = builder.with_secret_access_key(secret);
                }
                Arc::new(builder.build().map_err(Error::dependency)?)
            }
        };
        info!(backend = ?config.backend, "Artifact store initialized");
        Ok(Self::new(store))
    }
}

fn map_err(err: object_store::Error, job_id: &JobId, path: &ArtifactPath) -> Error {
    match err {
        object_store::Error::NotFound { .. } => {
            Error::NotFound(format!("artifact {path} of job {job_id}"))
        }
        other => Error::Dependency(other.to_string()),
    }
}

/// Rebuild a relative path from stored key parts.
///
/// `ObjectPath::from` percent-encodes characters such as `[`, `%` and `#` in
/// each part; the raw name is what `ArtifactPath` and `get` expect.
fn decode_parts<'a>(
    parts: impl Iterator<Item = PathPart<'a>>,
) -> std::result::Result<String, std::string::FromUtf8Error> {
    let decoded = parts
        .map(|part| urlencoding::decode(part.as_ref()).map(|raw| raw.into_owned()))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(decoded.join("/"))
}

#[async_trait]
impl ArtifactStore for ObjectArtifactStore {
    async fn put(&self, job_id: &JobId, path: &ArtifactPath, data: Bytes) -> Result<ArtifactRef> {
        let reference = ArtifactRef::new(*job_id, path, &data);
        let location = ObjectPath::from(reference.key.as_str());
        self.store
            .put(&location, PutPayload::from(data))
            .await
            .map_err(|e| map_err(e, job_id, path))?;
        debug!(job_id = %job_id, path = %path, size = reference.size, "Stored artifact");
        Ok(reference)
    }

    async fn get(&self, job_id: &JobId, path: &ArtifactPath) -> Result<Bytes> {
        let location = ObjectPath::from(path.key_for(job_id).as_str());
        let result = self
            .store
            .get(&location)
            .await
            .map_err(|e| map_err(e, job_id, path))?;
        result.bytes().await.map_err(|e| map_err(e, job_id, path))
    }

    async fn list(&self, job_id: &JobId) -> Result<Vec<ArtifactPath>> {
        let prefix = job_prefix(job_id);
        let location = ObjectPath::from(prefix.as_str());
        let objects: Vec<_> = self
            .store
            .list(Some(&location))
            .try_collect()
            .await
            .map_err(Error::dependency)?;

        let mut paths = Vec::with_capacity(objects.len());
        for meta in objects {
            let Some(parts) = meta.location.prefix_match(&location) else {
                continue;
            };
            let relative = match decode_parts(parts) {
                Ok(relative) => relative,
                Err(e) => {
                    warn!(job_id = %job_id, key = %meta.location, error = %e, "Skipping undecodable object");
                    continue;
                }
            };
            match ArtifactPath::parse(&relative) {
                Ok(path) => paths.push(path),
                Err(e) => warn!(job_id = %job_id, key = %meta.location, error = %e, "Skipping unaddressable object"),
            }
        }
        paths.sort();
        Ok(paths)
    }

    async fn delete_all(&self, job_id: &JobId) -> Result<usize> {
        let paths = self.list(job_id).await?;
        for path in &paths {
            let location = ObjectPath::from(path.key_for(job_id).as_str());
            match self.store.delete(&location).await {
                Ok(()) | Err(object_store::Error::NotFound { .. }) => {}
                Err(e) => return Err(Error::dependency(e)),
            }
        }
        info!(job_id = %job_id, count = paths.len(), "Deleted job artifacts");
        Ok(paths.len())
    }

    async fn ping(&self) -> Result<()> {
        self.store
            .list_with_delimiter(Some(&ObjectPath::from(JOBS_PREFIX)))
            .await
            .map_err(Error::dependency)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(raw: &str) -> ArtifactPath {
        ArtifactPath::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let store = ObjectArtifactStore::in_memory();
        let job_id = JobId::new();
        let reference = store
            .put(&job_id, &path("Dockerfile"), Bytes::from_static(b"FROM python:3.11"))
            .await
            .unwrap();
        assert_eq!(reference.key, format!("jobs/{job_id}/Dockerfile"));

        let data = store.get(&job_id, &path("Dockerfile")).await.unwrap();
        assert_eq!(&data[..], b"FROM python:3.11");
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = ObjectArtifactStore::in_memory();
        let err = store
            .get(&JobId::new(), &path("Dockerfile"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_discovers_nested_paths_for_one_job_only() {
        let store = ObjectArtifactStore::in_memory();
        let job_id = JobId::new();
        let other = JobId::new();
        store
            .put(&job_id, &path("ci/github.yml"), Bytes::from_static(b"on: push"))
            .await
            .unwrap();
        store
            .put(&job_id, &path("Dockerfile"), Bytes::from_static(b"FROM x"))
            .await
            .unwrap();
        store
            .put(&other, &path("app.py"), Bytes::from_static(b"print()"))
            .await
            .unwrap();

        let listed: Vec<String> = store
            .list(&job_id)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.to_string())
            .collect();
        assert_eq!(listed, vec!["Dockerfile", "ci/github.yml"]);
    }

    #[tokio::test]
    async fn test_delete_all_leaves_other_jobs() {
        let store = ObjectArtifactStore::in_memory();
        let job_id = JobId::new();
        let other = JobId::new();
        for raw in ["a.txt", "ci/b.yml"] {
            store
                .put(&job_id, &path(raw), Bytes::from_static(b"x"))
                .await
                .unwrap();
        }
        store
            .put(&other, &path("a.txt"), Bytes::from_static(b"y"))
            .await
            .unwrap();

        assert_eq!(store.delete_all(&job_id).await.unwrap(), 2);
        assert!(store.list(&job_id).await.unwrap().is_empty());
        assert_eq!(store.list(&other).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_local_backend_from_config() {
        let root = std::env::temp_dir().join(format!("orca-artifacts-{}", JobId::new()));
        let config = ArtifactStoreConfig {
            backend: ArtifactBackend::Local,
            bucket: None,
            region: None,
            endpoint: None,
            root: Some(root.to_string_lossy().into_owned()),
            access_key: None,
            secret_key: None,
        };
        let store = ObjectArtifactStore::from_config(&config).unwrap();
        let job_id = JobId::new();
        store
            .put(&job_id, &path("ci/gitlab.yml"), Bytes::from_static(b"stages: []"))
            .await
            .unwrap();

        assert!(root.join("jobs").join(job_id.to_string()).join("ci/gitlab.yml").exists());
        assert_eq!(store.list(&job_id).await.unwrap(), vec![path("ci/gitlab.yml")]);
        let _ = std::fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn test_reserved_characters_round_trip_through_list() {
        let store = ObjectArtifactStore::in_memory();
        let job_id = JobId::new();
        let names = ["a#b.txt", "notebooks/notebook[v2].ipynb", "report%.txt", "read me.md"];
        for name in names {
            store
                .put(&job_id, &path(name), Bytes::from(name.to_string()))
                .await
                .unwrap();
        }

        let listed = store.list(&job_id).await.unwrap();
        let mut expected: Vec<ArtifactPath> = names.iter().map(|n| path(n)).collect();
        expected.sort();
        assert_eq!(listed, expected);

        for listed_path in &listed {
            let data = store.get(&job_id, listed_path).await.unwrap();
            assert_eq!(&data[..], listed_path.as_str().as_bytes());
        }

        assert_eq!(store.delete_all(&job_id).await.unwrap(), names.len());
        assert!(store.list(&job_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ping_empty_store() {
        ObjectArtifactStore::in_memory().ping().await.unwrap();
    }
}
