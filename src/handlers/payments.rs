//! Native-currency (Telegram Stars) payment endpoints and the external
//! acquirer's signed callback.

use std::collections::{BTreeMap, HashMap};

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::{Form, Json};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{AppError, PaymentError};
use crate::models::{CompleteStarsPaymentRequest, CreateStarsPaymentRequest, PaymentMethod, PaymentResponse};
use crate::payments::{robokassa, state_machine};
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/api/payments/telegram-stars/create",
    tag = "payments",
    request_body = CreateStarsPaymentRequest,
    responses((status = 200, description = "Pending native-currency payment created", body = PaymentResponse))
)]
pub async fn create_stars(
    State(state): State<AppState>,
    Json(req): Json<CreateStarsPaymentRequest>,
) -> Result<Json<PaymentResponse>, AppError> {
    let payment = state_machine::create(&state.db, req.user_id, req.tariff_id, PaymentMethod::NativeStars).await?;
    Ok(Json(payment.into()))
}

#[derive(serde::Deserialize)]
pub struct ValidateQuery {
    pub expected_amount: Decimal,
}

#[utoipa::path(
    post,
    path = "/api/payments/telegram-stars/validate/{id}",
    tag = "payments",
    params(
        ("id" = Uuid, Path, description = "Payment id"),
        ("expected_amount" = Decimal, Query, description = "Amount the client is about to pay")
    ),
    responses(
        (status = 200, description = "Amount matches, pre-checkout may proceed"),
        (status = 400, description = "Amount mismatch"),
        (status = 404, description = "Payment not found")
    )
)]
pub async fn validate_stars(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ValidateQuery>,
) -> Result<impl IntoResponse, AppError> {
    state_machine::validate(&state.db, id, query.expected_amount).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[utoipa::path(
    post,
    path = "/api/payments/telegram-stars/complete",
    tag = "payments",
    request_body = CompleteStarsPaymentRequest,
    responses(
        (status = 200, description = "Settled (idempotent)", body = PaymentResponse),
        (status = 400, description = "Amount mismatch"),
        (status = 404, description = "Payment not found"),
        (status = 409, description = "Already completed with a different charge id")
    )
)]
pub async fn complete_stars(
    State(state): State<AppState>,
    Json(req): Json<CompleteStarsPaymentRequest>,
) -> Result<Json<PaymentResponse>, AppError> {
    let amount = Decimal::from(req.total_amount);
    let payment = state_machine::complete(
        &state.db,
        req.payment_id,
        &req.telegram_payment_charge_id,
        amount,
    )
    .await?;
    Ok(Json(payment.into()))
}

/// Signed, form-encoded callback from the external acquirer. `InvId` and
/// `Shp_payment_id` both carry the Payment's UUID, per
/// `original_source`'s convention of treating `InvId` as an opaque
/// identifier rather than a numeric sequence.
#[utoipa::path(
    post,
    path = "/api/payments/external/callback",
    tag = "payments",
    responses(
        (status = 200, description = "Acknowledged with literal OK{InvId}"),
        (status = 400, description = "Signature invalid or malformed fields"),
        (status = 404, description = "Payment not found")
    )
)]
pub async fn external_callback(
    State(state): State<AppState>,
    Form(fields): Form<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let out_sum = fields
        .get("OutSum")
        .ok_or_else(|| AppError::BadRequest("missing OutSum".to_string()))?;
    let inv_id = fields
        .get("InvId")
        .ok_or_else(|| AppError::BadRequest("missing InvId".to_string()))?;
    let signature = fields
        .get("SignatureValue")
        .ok_or_else(|| AppError::BadRequest("missing SignatureValue".to_string()))?;

    let shp: BTreeMap<String, String> = fields
        .iter()
        .filter(|(k, _)| k.starts_with("Shp_"))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let valid = robokassa::verify_callback_signature(
        out_sum,
        inv_id,
        &state.settings.acquirer_password_2,
        &shp,
        signature,
    );

    if !valid {
        tracing::error!("external_callback: ADMIN ALERT invalid signature for InvId={}", inv_id);
        return Err(PaymentError::InvalidSignature.into());
    }

    let payment_id_str = shp
        .get("Shp_payment_id")
        .ok_or_else(|| AppError::BadRequest("missing Shp_payment_id".to_string()))?;
    let payment_id = Uuid::parse_str(payment_id_str)
        .map_err(|_| AppError::BadRequest("malformed Shp_payment_id".to_string()))?;

    let amount: Decimal = out_sum
        .parse()
        .map_err(|_| AppError::BadRequest("malformed OutSum".to_string()))?;

    state_machine::complete(&state.db, payment_id, inv_id, amount).await?;

    Ok(robokassa::success_reply(inv_id))
}
