//! Lifecycle transitions for a Payment: `create` → `validate`
//! (pre-checkout, non-mutating) → `complete` | `fail` | `cancel`, each
//! writing status + append-only event + (on completion) credit grant in
//! one transaction. Grounded on `original_source/app/services/payment_service.py`'s
//! idempotency rules, generalized to cover both native-stars and
//! external-acquirer methods through one `complete` entry point.

use rust_decimal::Decimal;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db;
use crate::error::{AppError, PaymentError};
use crate::models::{PaymentEventKind, PaymentMethod, PaymentRow, PaymentStatus};

const AMOUNT_TOLERANCE: &str = "0.01";

pub async fn create(
    pool: &PgPool,
    user_id: i64,
    tariff_id: Uuid,
    method: PaymentMethod,
) -> Result<PaymentRow, AppError> {
    let tariff = db::tariffs::find(pool, tariff_id)
        .await?
        .ok_or(PaymentError::TariffNotFound)?;

    if !tariff.is_active {
        return Err(PaymentError::TariffNotAvailable.into());
    }

    db::users::find(pool, user_id).await?.ok_or(PaymentError::UserNotFound)?;

    let amount = match method {
        PaymentMethod::NativeStars => Decimal::from(tariff.price_native_stars.unwrap_or(0)),
        _ => tariff.price_fiat,
    };
    let currency = match method {
        PaymentMethod::NativeStars => "XTR",
        _ => "RUB",
    };

    let payment = db::payments::insert_pending(pool, user_id, Some(tariff_id), amount, currency, tariff.credits_count, method).await?;

    let mut tx = pool.begin().await?;
    db::payments::append_event(
        &mut tx,
        payment.id,
        PaymentEventKind::Created,
        None,
        Some("pending"),
        json!({ "tariff_id": tariff_id, "method": method }),
        None,
    )
    .await?;
    tx.commit().await?;

    Ok(payment)
}

/// Pre-checkout gate. Never transitions the row; must return within the
/// acquirer's short deadline.
pub async fn validate(pool: &PgPool, payment_id: Uuid, expected_amount: Decimal) -> Result<(), AppError> {
    let payment = db::payments::find(pool, payment_id).await?.ok_or(PaymentError::NotFound)?;

    if payment.status != PaymentStatus::Pending {
        return Err(PaymentError::InvalidStatus(format!("{:?}", payment.status)).into());
    }

    let matches = amounts_match(payment.amount, expected_amount);

    let mut tx = pool.begin().await?;
    db::payments::append_event(
        &mut tx,
        payment.id,
        PaymentEventKind::PreCheckout,
        Some("pending"),
        Some("pending"),
        json!({ "expected_amount": expected_amount, "matches": matches }),
        None,
    )
    .await?;
    tx.commit().await?;

    if !matches {
        return Err(PaymentError::AmountMismatch {
            expected: payment.amount.to_string(),
            received: expected_amount.to_string(),
        }
        .into());
    }

    Ok(())
}

/// Idempotent settlement. See spec's idempotency rules:
/// - already completed with the same charge id → no-op success.
/// - already completed with a different charge id → hard error.
/// - amount mismatch → fail the payment and raise.
/// - otherwise → transition to completed, credit the user, grant any
///   pending referral bonus, all in one transaction.
pub async fn complete(
    pool: &PgPool,
    payment_id: Uuid,
    external_charge_id: &str,
    amount: Decimal,
) -> Result<PaymentRow, AppError> {
    let mut tx = pool.begin().await?;

    let payment = db::payments::find_for_update(&mut tx, payment_id).await?.ok_or(PaymentError::NotFound)?;

    if payment.status == PaymentStatus::Completed {
        tx.commit().await?;
        return match &payment.external_charge_id {
            Some(existing) if existing == external_charge_id => Ok(payment),
            _ => Err(PaymentError::AlreadyCompleted.into()),
        };
    }

    if payment.status != PaymentStatus::Pending {
        return Err(PaymentError::InvalidStatus(format!("{:?}", payment.status)).into());
    }

    if !amounts_match(payment.amount, amount) {
        db::payments::mark_failed(&mut tx, payment.id).await?;
        db::payments::append_event(
            &mut tx,
            payment.id,
            PaymentEventKind::Failed,
            Some("pending"),
            Some("failed"),
            json!({ "reason": "amount mismatch", "expected": payment.amount, "received": amount }),
            Some("amount mismatch"),
        )
        .await?;
        tx.commit().await?;

        tracing::error!(
            "payment {}: ADMIN ALERT amount mismatch — expected {}, received {}",
            payment.id,
            payment.amount,
            amount
        );

        return Err(PaymentError::AmountMismatch {
            expected: payment.amount.to_string(),
            received: amount.to_string(),
        }
        .into());
    }

    db::payments::mark_completed(&mut tx, payment.id, external_charge_id).await?;
    db::users::adjust_balance(&mut tx, payment.user_id, payment.credits_count).await?;
    db::payments::append_event(
        &mut tx,
        payment.id,
        PaymentEventKind::Completed,
        Some("pending"),
        Some("completed"),
        json!({ "external_charge_id": external_charge_id, "amount": amount }),
        None,
    )
    .await?;

    if let Err(e) = db::referrals::grant_bonus_if_first_payment(&mut tx, payment.user_id).await {
        tracing::warn!("payment {}: referral bonus grant failed: {}", payment.id, e);
    }

    tx.commit().await?;

    db::payments::find(pool, payment.id).await?.ok_or_else(|| PaymentError::NotFound.into())
}

pub async fn cancel(pool: &PgPool, payment_id: Uuid) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    let payment = db::payments::find_for_update(&mut tx, payment_id).await?.ok_or(PaymentError::NotFound)?;

    if payment.status != PaymentStatus::Pending {
        return Err(PaymentError::InvalidStatus(format!("{:?}", payment.status)).into());
    }

    db::payments::mark_cancelled(&mut tx, payment.id).await?;
    db::payments::append_event(
        &mut tx,
        payment.id,
        PaymentEventKind::Cancelled,
        Some("pending"),
        Some("cancelled"),
        json!({}),
        None,
    )
    .await?;

    tx.commit().await?;
    Ok(())
}

fn amounts_match(expected: Decimal, received: Decimal) -> bool {
    let tolerance: Decimal = AMOUNT_TOLERANCE.parse().unwrap();
    (expected - received).abs() < tolerance
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn amounts_match_within_tolerance() {
        let a = Decimal::from_str("199.00").unwrap();
        let b = Decimal::from_str("199.005").unwrap();
        assert!(amounts_match(a, b));
    }

    #[test]
    fn amounts_match_rejects_real_mismatch() {
        let a = Decimal::from_str("199.00").unwrap();
        let b = Decimal::from_str("49.00").unwrap();
        assert!(!amounts_match(a, b));
    }

    #[test]
    fn amounts_match_is_symmetric() {
        let a = Decimal::from_str("50.00").unwrap();
        let b = Decimal::from_str("50.00").unwrap();
        assert!(amounts_match(a, b) && amounts_match(b, a));
    }
}
