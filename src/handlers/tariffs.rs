//! Active tariff listing.

use axum::extract::State;
use axum::Json;

use crate::db;
use crate::error::AppError;
use crate::models::TariffRow;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/tariffs",
    tag = "tariffs",
    responses((status = 200, description = "Active tariffs, sorted", body = [TariffRow]))
)]
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<TariffRow>>, AppError> {
    let tariffs = db::tariffs::list_active(&state.db).await?;
    Ok(Json(tariffs))
}
