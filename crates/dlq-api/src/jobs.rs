//! Job collection and action handlers.

use axum::Json;
use axum::extract::{Path, Query, State};
use dlq_queue::{JobView, NewJobRequest};
use dlq_store::JobStatus;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::error::ApiError;
use crate::state::ApiState;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListParams {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    include_deleted: Option<String>,
}

pub(crate) async fn list(
    State(state): State<ApiState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<JobView>>, ApiError> {
    let status = match params.status.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            JobStatus::parse(raw)
                .ok_or_else(|| ApiError::BadRequest(format!("unknown status {raw:?}")))?,
        ),
        None => None,
    };
    let include_deleted = params.include_deleted.as_deref() == Some("1");
    let jobs = state.service.list_jobs(status, include_deleted).await?;
    Ok(Json(jobs))
}

#[derive(Debug, Deserialize)]
struct CreateJobBody {
    url: String,
    out_dir: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    site: Option<String>,
    #[serde(default)]
    max_attempts: Option<i64>,
    #[serde(default)]
    archive_password: Option<String>,
}

pub(crate) async fn create(
    State(state): State<ApiState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let body: CreateJobBody =
        serde_json::from_value(body).map_err(|err| ApiError::BadRequest(err.to_string()))?;
    if body.url.is_empty() || body.out_dir.is_empty() {
        return Err(ApiError::BadRequest("missing url or out_dir".to_string()));
    }
    let max_attempts = body
        .max_attempts
        .filter(|&n| n > 0)
        .unwrap_or_else(|| i64::from(state.settings.max_attempts()));
    let id = state
        .service
        .create_job(NewJobRequest {
            url: body.url,
            out_dir: body.out_dir,
            name: body.name,
            site: body.site,
            archive_password: body.archive_password,
            max_attempts: Some(max_attempts),
        })
        .await?;
    info!(job_id = id, "job accepted");
    Ok(Json(json!({ "id": id })))
}

pub(crate) async fn show(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<Json<JobView>, ApiError> {
    Ok(Json(state.service.get_job(id).await?))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct EventParams {
    #[serde(default)]
    limit: Option<i64>,
}

pub(crate) async fn events(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Query(params): Query<EventParams>,
) -> Result<Json<Vec<String>>, ApiError> {
    let lines = state
        .service
        .list_events(id, params.limit.unwrap_or(0))
        .await?;
    Ok(Json(lines))
}

pub(crate) async fn retry(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    state.service.retry(id).await?;
    info!(job_id = id, action = "retry", "job action");
    Ok(ok_body())
}

pub(crate) async fn remove(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    state.service.remove(id).await?;
    info!(job_id = id, action = "remove", "job action");
    Ok(ok_body())
}

pub(crate) async fn pause(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    state.service.pause(id).await?;
    info!(job_id = id, action = "pause", "job action");
    Ok(ok_body())
}

pub(crate) async fn resume(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    state.service.resume(id).await?;
    info!(job_id = id, action = "resume", "job action");
    Ok(ok_body())
}

pub(crate) async fn clear(State(state): State<ApiState>) -> Result<Json<Value>, ApiError> {
    state.service.clear().await?;
    info!(action = "clear", "job action");
    Ok(ok_body())
}

pub(crate) async fn purge(State(state): State<ApiState>) -> Result<Json<Value>, ApiError> {
    state.service.purge().await?;
    info!(action = "purge", "job action");
    Ok(ok_body())
}

fn ok_body() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
