use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::{PaymentEventKind, PaymentEventRow, PaymentMethod, PaymentRow};

pub async fn insert_pending(
    pool: &PgPool,
    user_id: i64,
    tariff_id: Option<Uuid>,
    amount: Decimal,
    currency: &str,
    credits_count: i32,
    method: PaymentMethod,
) -> Result<PaymentRow, sqlx::Error> {
    sqlx::query_as::<_, PaymentRow>(
        "INSERT INTO payments
            (id, user_id, tariff_id, amount, currency, credits_count, method, status, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', now())
         RETURNING id, user_id, tariff_id, amount, currency, credits_count, method, status,
                   external_charge_id, created_at, completed_at",
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(tariff_id)
    .bind(amount)
    .bind(currency)
    .bind(credits_count)
    .bind(method)
    .fetch_one(pool)
    .await
}

pub async fn find(pool: &PgPool, payment_id: Uuid) -> Result<Option<PaymentRow>, sqlx::Error> {
    sqlx::query_as::<_, PaymentRow>(
        "SELECT id, user_id, tariff_id, amount, currency, credits_count, method, status,
                external_charge_id, created_at, completed_at
         FROM payments WHERE id = $1",
    )
    .bind(payment_id)
    .fetch_optional(pool)
    .await
}

/// Row-level lock used to serialize concurrent completion attempts for
/// the same payment, per the spec's per-`payment_id` ordering guarantee.
pub async fn find_for_update(
    conn: &mut PgConnection,
    payment_id: Uuid,
) -> Result<Option<PaymentRow>, sqlx::Error> {
    sqlx::query_as::<_, PaymentRow>(
        "SELECT id, user_id, tariff_id, amount, currency, credits_count, method, status,
                external_charge_id, created_at, completed_at
         FROM payments WHERE id = $1 FOR UPDATE",
    )
    .bind(payment_id)
    .fetch_optional(conn)
    .await
}

pub async fn mark_completed(
    conn: &mut PgConnection,
    payment_id: Uuid,
    external_charge_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE payments SET status = 'completed', external_charge_id = $2, completed_at = now()
         WHERE id = $1",
    )
    .bind(payment_id)
    .bind(external_charge_id)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn mark_failed(conn: &mut PgConnection, payment_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE payments SET status = 'failed' WHERE id = $1")
        .bind(payment_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn mark_cancelled(conn: &mut PgConnection, payment_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE payments SET status = 'cancelled' WHERE id = $1")
        .bind(payment_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn append_event(
    conn: &mut PgConnection,
    payment_id: Uuid,
    kind: PaymentEventKind,
    status_before: Option<&str>,
    status_after: Option<&str>,
    details: Value,
    error_message: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO payment_events
            (id, payment_id, kind, status_before, status_after, details, error_message, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, now())",
    )
    .bind(Uuid::new_v4())
    .bind(payment_id)
    .bind(kind)
    .bind(status_before)
    .bind(status_after)
    .bind(details)
    .bind(error_message)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn list_events(
    pool: &PgPool,
    payment_id: Uuid,
) -> Result<Vec<PaymentEventRow>, sqlx::Error> {
    sqlx::query_as::<_, PaymentEventRow>(
        "SELECT id, payment_id, kind, status_before, status_after, details, error_message, created_at
         FROM payment_events WHERE payment_id = $1
         ORDER BY created_at ASC",
    )
    .bind(payment_id)
    .fetch_all(pool)
    .await
}

pub async fn revenue_and_counts(
    pool: &PgPool,
) -> Result<(Decimal, i64), sqlx::Error> {
    let row: (Option<Decimal>, Option<i64>) = sqlx::query_as(
        "SELECT COALESCE(SUM(amount), 0), COALESCE(SUM(credits_count), 0)
         FROM payments WHERE status = 'completed'",
    )
    .fetch_one(pool)
    .await?;
    Ok((row.0.unwrap_or_default(), row.1.unwrap_or_default()))
}

pub async fn daily_stats(
    pool: &PgPool,
    date: chrono::NaiveDate,
) -> Result<(i64, Decimal), sqlx::Error> {
    let row: (Option<i64>, Option<Decimal>) = sqlx::query_as(
        "SELECT COUNT(*), COALESCE(SUM(amount), 0)
         FROM payments WHERE status = 'completed' AND completed_at::date = $1",
    )
    .bind(date)
    .fetch_one(pool)
    .await?;
    Ok((row.0.unwrap_or_default(), row.1.unwrap_or_default()))
}
