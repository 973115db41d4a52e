//! User lifecycle: upsert and balance lookup.

use axum::extract::{Path, State};
use axum::Json;

use crate::db;
use crate::error::AppError;
use crate::models::{BalanceResponse, EnsureUserRequest, UserRow};
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/api/users/ensure",
    tag = "users",
    request_body = EnsureUserRequest,
    responses((status = 200, description = "User exists, created if needed", body = UserRow))
)]
pub async fn ensure(
    State(state): State<AppState>,
    Json(req): Json<EnsureUserRequest>,
) -> Result<Json<UserRow>, AppError> {
    let user = db::users::ensure(
        &state.db,
        req.user_id,
        req.is_admin,
        req.referral_code.as_deref(),
    )
    .await?;
    Ok(Json(user))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}/balance",
    tag = "users",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "Current balance and referral code", body = BalanceResponse),
        (status = 404, description = "User not found")
    )
)]
pub async fn balance(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<BalanceResponse>, AppError> {
    let user = db::users::find(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".to_string()))?;

    Ok(Json(BalanceResponse {
        user_id: user.id,
        credit_balance: user.credit_balance,
        referral_code: user.referral_code,
    }))
}
