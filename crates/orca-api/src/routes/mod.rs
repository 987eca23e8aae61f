//! API routes.

pub mod artifacts;
pub mod health;
pub mod jobs;

use crate::AppState;
use axum::Router;
use orca_core::JobId;

use crate::error::ApiError;

/// Build the main API router.
///
/// Job routes are served at the root and again under `/api`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/jobs", jobs_router())
        .nest("/api/jobs", jobs_router())
        .merge(health::router())
        .with_state(state)
}

fn jobs_router() -> Router<AppState> {
    jobs::router().merge(artifacts::router())
}

/// Unparseable ids cannot name a stored job.
pub(crate) fn parse_job_id(raw: &str) -> Result<JobId, ApiError> {
    Ok(raw.parse::<JobId>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request, StatusCode, header};
    use bytes::Bytes;
    use orca_artifacts::ObjectArtifactStore;
    use orca_core::artifact::{ArtifactPath, ArtifactStore};
    use orca_core::queue::WorkQueue;
    use orca_db::MemoryJobStore;
    use orca_scheduler::{JobManager, MemoryWorkQueue};
    use serde_json::{Value, json};
    use std::io::{Cursor, Read};
    use std::sync::Arc;
    use tower::ServiceExt;

    struct TestApp {
        router: Router,
        queue: Arc<MemoryWorkQueue>,
        artifacts: Arc<ObjectArtifactStore>,
    }

    fn app() -> TestApp {
        let queue = Arc::new(MemoryWorkQueue::new());
        let artifacts = Arc::new(ObjectArtifactStore::in_memory());
        let manager = Arc::new(JobManager::new(
            Arc::new(MemoryJobStore::new()),
            queue.clone(),
            artifacts.clone(),
        ));
        TestApp {
            router: router(AppState::new(manager)),
            queue,
            artifacts,
        }
    }

    async fn send(
        router: &Router,
        method: Method,
        uri: &str,
        body: Option<&str>,
    ) -> (StatusCode, Bytes) {
        let mut builder = Request::builder().method(method).uri(uri);
        if body.is_some() {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
        }
        let request = builder
            .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        (status, to_bytes(response.into_body(), usize::MAX).await.unwrap())
    }

    async fn send_json(
        router: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let body = body.map(|b| b.to_string());
        let (status, bytes) = send(router, method, uri, body.as_deref()).await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn create(router: &Router, source_ref: &str) -> Value {
        let (status, body) = send_json(
            router,
            Method::POST,
            "/jobs",
            Some(json!({ "sourceRef": source_ref })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["job"].clone()
    }

    async fn seed(store: &ObjectArtifactStore, job_id: &str, files: &[(&str, &str)]) {
        let job_id: JobId = job_id.parse().unwrap();
        for (raw, body) in files {
            store
                .put(
                    &job_id,
                    &ArtifactPath::parse(raw).unwrap(),
                    Bytes::from(body.to_string()),
                )
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_create_and_get_job() {
        let app = app();
        let (status, body) = send_json(
            &app.router,
            Method::POST,
            "/jobs",
            Some(json!({ "sourceRef": "https://example.com/repo" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["job"]["status"], "queued");
        assert_eq!(body["job"]["sourceRef"], "https://example.com/repo");
        assert!(body["message"].is_string());

        let id = body["job"]["id"].as_str().unwrap().to_string();
        assert_eq!(app.queue.dequeue().await.unwrap().job_id.to_string(), id);

        let (status, body) =
            send_json(&app.router, Method::GET, &format!("/jobs/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["job"]["id"], id.as_str());

        let (status, body) =
            send_json(&app.router, Method::GET, &format!("/api/jobs/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["job"]["id"], id.as_str());
    }

    #[tokio::test]
    async fn test_create_rejects_bad_bodies() {
        let app = app();
        for body in [
            r#"{"sourceRef": ""}"#,
            r#"{"sourceRef": "   "}"#,
            r#"{}"#,
            r#"{"sourceRef": 42}"#,
            "not json",
        ] {
            let (status, bytes) = send(&app.router, Method::POST, "/jobs", Some(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
            let value: Value = serde_json::from_slice(&bytes).unwrap();
            assert!(value["error"].is_string());
        }
    }

    #[tokio::test]
    async fn test_list_jobs_newest_first() {
        let app = app();
        let mut ids = Vec::new();
        for i in 0..3 {
            ids.push(create(&app.router, &format!("repo-{i}")).await["id"].clone());
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        let (status, body) = send_json(&app.router, Method::GET, "/jobs", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 3);
        let listed: Vec<Value> = body["jobs"]
            .as_array()
            .unwrap()
            .iter()
            .map(|job| job["id"].clone())
            .collect();
        ids.reverse();
        assert_eq!(listed, ids);

        let (_, body) = send_json(&app.router, Method::GET, "/jobs?limit=1", None).await;
        assert_eq!(body["total"], 1);
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let app = app();
        let missing = JobId::new();
        for uri in [
            format!("/jobs/{missing}"),
            "/jobs/not-a-uuid".to_string(),
            format!("/jobs/{missing}/artifacts"),
            format!("/jobs/{missing}/artifacts-zip"),
        ] {
            let (status, _) = send_json(&app.router, Method::GET, &uri, None).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        }

        let (status, _) =
            send_json(&app.router, Method::DELETE, &format!("/jobs/{missing}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send_json(
            &app.router,
            Method::PATCH,
            &format!("/jobs/{missing}/status"),
            Some(json!({ "status": "analyzing" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_report_status() {
        let app = app();
        let id = create(&app.router, "https://example.com/repo").await["id"]
            .as_str()
            .unwrap()
            .to_string();
        let uri = format!("/jobs/{id}/status");

        let (status, body) = send_json(
            &app.router,
            Method::PATCH,
            &uri,
            Some(json!({
                "status": "completed",
                "resultRefs": { "endpoint": "http://x" },
                "metadata": { "pythonFiles": 4, "frameworks": ["sklearn"] }
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["job"]["status"], "completed");
        assert_eq!(body["job"]["resultRefs"]["endpoint"], "http://x");
        assert_eq!(body["job"]["metadata"]["pythonFiles"], 4);
        assert!(body["job"]["completedAt"].is_string());

        let (status, body) = send_json(
            &app.router,
            Method::PATCH,
            &uri,
            Some(json!({ "status": "training" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].is_string());

        for bad in [
            json!({}),
            json!({ "status": "bogus" }),
            json!({ "status": "completed", "errorMessage": "not allowed" }),
        ] {
            let (status, _) = send_json(&app.router, Method::PATCH, &uri, Some(bad)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn test_artifact_endpoints() {
        let app = app();
        let id = create(&app.router, "https://example.com/repo").await["id"]
            .as_str()
            .unwrap()
            .to_string();
        seed(
            &app.artifacts,
            &id,
            &[
                ("Dockerfile", "FROM python:3.11"),
                ("ci/github.yml", "on: push"),
            ],
        )
        .await;

        let (status, body) =
            send_json(&app.router, Method::GET, &format!("/jobs/{id}/artifacts"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["jobId"], id.as_str());
        assert_eq!(
            body["artifacts"],
            json!({ "Dockerfile": "FROM python:3.11", "ci/github.yml": "on: push" })
        );

        let request = Request::builder()
            .uri(format!("/jobs/{id}/artifacts/ci/github.yml"))
            .body(Body::empty())
            .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/octet-stream"
        );
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"github.yml\""
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"on: push");

        let request = Request::builder()
            .uri(format!("/jobs/{id}/artifacts-zip"))
            .body(Body::empty())
            .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/zip");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
        assert_eq!(archive.len(), 2);
        let mut body = String::new();
        archive
            .by_name("Dockerfile")
            .unwrap()
            .read_to_string(&mut body)
            .unwrap();
        assert_eq!(body, "FROM python:3.11");
    }

    #[tokio::test]
    async fn test_artifact_traversal_is_bad_request() {
        let app = app();
        let id = JobId::new();
        for uri in [
            format!("/jobs/{id}/artifacts/../secrets"),
            format!("/jobs/{id}/artifacts/ci/../../etc/passwd"),
            format!("/jobs/{id}/artifacts/%2Fetc%2Fpasswd"),
        ] {
            let (status, _) = send_json(&app.router, Method::GET, &uri, None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_delete_with_and_without_cascade() {
        let app = app();
        let kept = create(&app.router, "repo-a").await["id"]
            .as_str()
            .unwrap()
            .to_string();
        let purged = create(&app.router, "repo-b").await["id"]
            .as_str()
            .unwrap()
            .to_string();
        seed(&app.artifacts, &kept, &[("Dockerfile", "FROM a")]).await;
        seed(&app.artifacts, &purged, &[("Dockerfile", "FROM b")]).await;

        let (status, _) =
            send_json(&app.router, Method::DELETE, &format!("/jobs/{kept}"), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) =
            send_json(&app.router, Method::GET, &format!("/jobs/{kept}/artifacts"), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send_json(
            &app.router,
            Method::DELETE,
            &format!("/jobs/{purged}?cascade=true"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["artifactsDeleted"], 1);
        let (status, _) = send_json(
            &app.router,
            Method::GET,
            &format!("/jobs/{purged}/artifacts"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    /// Object store whose every call fails.
    struct UnreachableArtifacts;

    #[async_trait::async_trait]
    impl ArtifactStore for UnreachableArtifacts {
        async fn put(
            &self,
            _job_id: &JobId,
            _path: &ArtifactPath,
            _data: Bytes,
        ) -> orca_core::Result<orca_core::artifact::ArtifactRef> {
            Err(orca_core::Error::Dependency("connection refused".to_string()))
        }

        async fn get(&self, _job_id: &JobId, _path: &ArtifactPath) -> orca_core::Result<Bytes> {
            Err(orca_core::Error::Dependency("connection refused".to_string()))
        }

        async fn list(&self, _job_id: &JobId) -> orca_core::Result<Vec<ArtifactPath>> {
            Err(orca_core::Error::Dependency("connection refused".to_string()))
        }

        async fn delete_all(&self, _job_id: &JobId) -> orca_core::Result<usize> {
            Err(orca_core::Error::Dependency("connection refused".to_string()))
        }

        async fn ping(&self) -> orca_core::Result<()> {
            Err(orca_core::Error::Dependency("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_ready_reports_unreachable_backend() {
        let manager = Arc::new(JobManager::new(
            Arc::new(MemoryJobStore::new()),
            Arc::new(MemoryWorkQueue::new()),
            Arc::new(UnreachableArtifacts),
        ));
        let router = router(AppState::new(manager));

        let (status, body) = send_json(&router, Method::GET, "/health/ready", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "unavailable");
        assert!(body["error"].as_str().unwrap().contains("connection refused"));

        let (status, _) = send_json(&router, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        let app = app();
        for uri in ["/", "/health", "/health/ready"] {
            let (status, body) = send_json(&app.router, Method::GET, uri, None).await;
            assert_eq!(status, StatusCode::OK, "{uri}");
            assert!(body["status"].is_string());
        }
    }
}
