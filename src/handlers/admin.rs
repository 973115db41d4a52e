//! Admin dashboard endpoints. Authorization is a single header carrying
//! the caller's external user id, looked up against `User.is_admin` —
//! there is no separate admin credential store, matching the rest of the
//! domain's single-identity-space design.

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::NaiveDate;

use crate::audit;
use crate::db;
use crate::error::AppError;
use crate::models::{AdminStats, DailyStats, FailedCheckSummary, MaskedSessionResponse, SetSessionRequest};
use crate::state::AppState;

const ADMIN_USER_HEADER: &str = "x-user-id";

async fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<i64, AppError> {
    let user_id: i64 = headers
        .get(ADMIN_USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized(format!("missing {ADMIN_USER_HEADER} header")))?
        .parse()
        .map_err(|_| AppError::Unauthorized(format!("malformed {ADMIN_USER_HEADER} header")))?;

    let user = db::users::find(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("unknown user".to_string()))?;

    if !user.is_admin {
        return Err(AppError::Forbidden("not an admin".to_string()));
    }

    Ok(user_id)
}

#[utoipa::path(
    get,
    path = "/api/admin/session",
    tag = "admin",
    responses(
        (status = 200, description = "Masked current session", body = MaskedSessionResponse),
        (status = 401, description = "Missing or unknown user-id header"),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn get_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MaskedSessionResponse>, AppError> {
    require_admin(&state, &headers).await?;

    let row = db::sessions::find_active(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("no active session".to_string()))?;

    Ok(Json(row.into()))
}

#[utoipa::path(
    post,
    path = "/api/admin/session",
    tag = "admin",
    request_body = SetSessionRequest,
    responses((status = 200, description = "Cookie set manually"))
)]
pub async fn set_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SetSessionRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let admin_id = require_admin(&state, &headers).await?;

    state
        .session_manager
        .save(&req.cookie_value)
        .await
        .map_err(AppError::Database)?;

    audit::log_audit(
        &state.db,
        "admin_session_set",
        serde_json::json!({ "admin_id": admin_id }),
        None,
    )
    .await;

    Ok(Json(serde_json::json!({ "ok": true })))
}

#[utoipa::path(
    post,
    path = "/api/admin/session/refresh-sync",
    tag = "admin",
    responses(
        (status = 200, description = "Refresh completed"),
        (status = 500, description = "Refresh failed")
    )
)]
pub async fn refresh_sync(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    let admin_id = require_admin(&state, &headers).await?;

    audit::log_audit(
        &state.db,
        "admin_session_refresh_sync_triggered",
        serde_json::json!({ "admin_id": admin_id }),
        None,
    )
    .await;

    state
        .session_manager
        .refresh_now()
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(serde_json::json!({ "ok": true })))
}

#[utoipa::path(
    get,
    path = "/api/admin/stats",
    tag = "admin",
    responses((status = 200, description = "Aggregate dashboard stats", body = AdminStats))
)]
pub async fn stats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<AdminStats>, AppError> {
    require_admin(&state, &headers).await?;

    let (completed, failed, pending, processing) = db::jobs::status_counts(&state.db).await?;
    let (revenue_fiat, revenue_credits_sold) = db::payments::revenue_and_counts(&state.db).await?;
    let total_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&state.db)
        .await?;

    Ok(Json(AdminStats {
        total_users,
        total_jobs_completed: completed,
        total_jobs_failed: failed,
        jobs_pending: pending,
        jobs_processing: processing,
        revenue_fiat,
        revenue_credits_sold,
    }))
}

#[derive(serde::Deserialize)]
pub struct DailyStatsQuery {
    pub target_date: NaiveDate,
}

#[utoipa::path(
    get,
    path = "/api/admin/stats/daily",
    tag = "admin",
    params(("target_date" = String, Query, description = "YYYY-MM-DD")),
    responses((status = 200, description = "Stats for one calendar day", body = DailyStats))
)]
pub async fn stats_daily(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<DailyStatsQuery>,
) -> Result<Json<DailyStats>, AppError> {
    require_admin(&state, &headers).await?;

    let (completed_jobs, failed_jobs) = day_job_counts(&state, query.target_date).await?;
    let (payments_completed, revenue_fiat) = db::payments::daily_stats(&state.db, query.target_date).await?;

    Ok(Json(DailyStats {
        date: query.target_date,
        jobs_completed: completed_jobs,
        jobs_failed: failed_jobs,
        payments_completed,
        revenue_fiat,
    }))
}

async fn day_job_counts(state: &AppState, date: NaiveDate) -> Result<(i64, i64), AppError> {
    let row: (i64, i64) = sqlx::query_as(
        "SELECT
            COUNT(*) FILTER (WHERE status = 'completed' AND completed_at::date = $1),
            COUNT(*) FILTER (WHERE status = 'failed' AND completed_at::date = $1)
         FROM jobs",
    )
    .bind(date)
    .fetch_one(&state.db)
    .await?;
    Ok(row)
}

#[derive(serde::Deserialize)]
pub struct FailedChecksQuery {
    #[serde(default)]
    pub limit: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/api/admin/checks/failed",
    tag = "admin",
    params(("limit" = Option<i64>, Query, description = "Max rows, default 50")),
    responses((status = 200, description = "Recent failed jobs", body = [FailedCheckSummary]))
)]
pub async fn checks_failed(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<FailedChecksQuery>,
) -> Result<Json<Vec<FailedCheckSummary>>, AppError> {
    require_admin(&state, &headers).await?;

    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    let rows = db::jobs::list_failed(&state.db, limit).await?;

    Ok(Json(
        rows.into_iter()
            .map(|j| FailedCheckSummary {
                id: j.id,
                user_id: j.user_id,
                target_handle: j.target_handle,
                error_message: j.error_message,
                created_at: j.created_at,
            })
            .collect(),
    ))
}
