//! Job lifecycle: admission, status polling, and paginated history.

use axum::extract::{Path, Query, State};
use axum::Json;
use uuid::Uuid;

use crate::db;
use crate::error::AppError;
use crate::models::{InitiateCheckRequest, JobResponse, NonMutualRecordResponse, PaginationParams};
use crate::queue::admission;
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/api/check/initiate",
    tag = "checks",
    request_body = InitiateCheckRequest,
    responses(
        (status = 200, description = "Job admitted", body = JobResponse),
        (status = 402, description = "Insufficient balance"),
        (status = 429, description = "Rate limited")
    )
)]
pub async fn initiate(
    State(state): State<AppState>,
    Json(req): Json<InitiateCheckRequest>,
) -> Result<Json<JobResponse>, AppError> {
    if !state.circuit_breaker.allow_request().await {
        return Err(AppError::Conflict(
            "upstream temporarily unavailable, try again shortly".to_string(),
        ));
    }

    let job = admission::admit_job(&state.db, req.user_id, &req.target_handle).await?;
    state.queue_notify.notify_one();

    Ok(Json(job.into()))
}

#[utoipa::path(
    get,
    path = "/api/check/{id}",
    tag = "checks",
    params(("id" = Uuid, Path, description = "Job id")),
    responses(
        (status = 200, description = "Job status, progress, and result if done", body = JobResponse),
        (status = 404, description = "Job not found")
    )
)]
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobResponse>, AppError> {
    let job = db::jobs::find(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("job not found".to_string()))?;

    let mut response: JobResponse = job.into();
    if response.non_mutual.is_none() && response.result_summary.is_some() {
        let records = db::non_mutual::list_for_job(&state.db, id).await?;
        response.non_mutual = Some(records.into_iter().map(NonMutualRecordResponse::from).collect());
    }

    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/api/checks",
    tag = "checks",
    params(("user_id" = i64, Query, description = "User id")),
    responses((status = 200, description = "Paginated job history", body = [JobResponse]))
)]
pub async fn list_for_user(
    State(state): State<AppState>,
    Query(query): Query<ChecksQuery>,
) -> Result<Json<Vec<JobResponse>>, AppError> {
    let jobs = db::jobs::list_for_user(&state.db, query.user_id, &query.pagination).await?;
    Ok(Json(jobs.into_iter().map(JobResponse::from).collect()))
}

#[derive(serde::Deserialize)]
pub struct ChecksQuery {
    pub user_id: i64,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}
