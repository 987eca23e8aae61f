//! Job endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch};
use axum::{Json, Router};
use orca_core::{Job, StatusReport};
use serde::{Deserialize, Serialize};

use super::parse_job_id;
use crate::AppState;
use crate::error::{ApiError, ApiJson, ApiQuery};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_jobs).post(create_job))
        .route("/{id}", get(get_job).delete(delete_job))
        .route("/{id}/status", patch(report_status))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    pub source_ref: String,
}

#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub job: Job,
}

#[derive(Debug, Serialize)]
pub struct JobMessageResponse {
    pub job: Job,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<Job>,
    pub total: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListJobsQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteJobQuery {
    #[serde(default)]
    pub cascade: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteJobResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifacts_deleted: Option<usize>,
}

async fn create_job(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateJobRequest>,
) -> Result<(StatusCode, Json<JobMessageResponse>), ApiError> {
    let job = state.manager.create_job(&req.source_ref).await?;

    Ok((
        StatusCode::CREATED,
        Json(JobMessageResponse {
            job,
            message: "Job created and queued".to_string(),
        }),
    ))
}

async fn list_jobs(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListJobsQuery>,
) -> Result<Json<JobListResponse>, ApiError> {
    let limit = query
        .limit
        .map_or(state.list_limit, |limit| limit.min(state.list_limit));
    let jobs = state.manager.list_jobs(limit).await?;

    Ok(Json(JobListResponse {
        total: jobs.len(),
        jobs,
    }))
}

async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobResponse>, ApiError> {
    let job = state.manager.get_job(parse_job_id(&id)?).await?;
    Ok(Json(JobResponse { job }))
}

async fn report_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(report): ApiJson<StatusReport>,
) -> Result<Json<JobMessageResponse>, ApiError> {
    let id = parse_job_id(&id)?;
    let job = state.manager.report_status(id, report).await?;

    Ok(Json(JobMessageResponse {
        message: format!("Job status updated to {}", job.status),
        job,
    }))
}

async fn delete_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiQuery(query): ApiQuery<DeleteJobQuery>,
) -> Result<Json<DeleteJobResponse>, ApiError> {
    let id = parse_job_id(&id)?;

    let response = if query.cascade {
        let removed = state.manager.delete_job_cascade(id).await?;
        DeleteJobResponse {
            message: format!("Job {id} and its artifacts deleted"),
            artifacts_deleted: Some(removed),
        }
    } else {
        state.manager.delete_job(id).await?;
        DeleteJobResponse {
            message: format!("Job {id} deleted"),
            artifacts_deleted: None,
        }
    };

    Ok(Json(response))
}
