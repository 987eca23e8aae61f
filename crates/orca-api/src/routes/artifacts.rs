//! Artifact endpoints.

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use orca_core::JobId;
use serde::Serialize;
use std::collections::BTreeMap;

use super::parse_job_id;
use crate::AppState;
use crate::error::ApiError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}/artifacts", get(list_artifacts))
        .route("/{id}/artifacts/{*path}", get(download_artifact))
        .route("/{id}/artifacts-zip", get(download_bundle))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactsResponse {
    pub job_id: JobId,
    /// Artifact contents keyed by path relative to the job.
    pub artifacts: BTreeMap<String, String>,
}

async fn list_artifacts(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ArtifactsResponse>, ApiError> {
    let job_id = parse_job_id(&id)?;
    let artifacts = state
        .manager
        .get_artifacts(job_id)
        .await?
        .into_iter()
        .map(|(path, data)| (path, String::from_utf8_lossy(&data).into_owned()))
        .collect();

    Ok(Json(ArtifactsResponse { job_id, artifacts }))
}

fn attachment(content_type: &'static str, file_name: &str, body: bytes::Bytes) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", file_name.replace('"', "_"));
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response()
}

async fn download_artifact(
    State(state): State<AppState>,
    Path((id, path)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let job_id = parse_job_id(&id)?;
    let (path, data) = state.manager.download_artifact(job_id, &path).await?;

    Ok(attachment("application/octet-stream", path.file_name(), data))
}

async fn download_bundle(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let job_id = parse_job_id(&id)?;
    let bundle = state.manager.bundle_artifacts(job_id).await?;

    Ok(attachment(
        "application/zip",
        &format!("{job_id}-artifacts.zip"),
        bundle.data,
    ))
}
