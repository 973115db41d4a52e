use sqlx::{PgConnection, PgPool};

use crate::models::UpstreamSessionRow;

pub async fn find_active_valid(pool: &PgPool) -> Result<Option<UpstreamSessionRow>, sqlx::Error> {
    sqlx::query_as::<_, UpstreamSessionRow>(
        "SELECT id, cookie_value, is_active, is_valid, fail_count, refresh_attempts,
                next_refresh_at, created_at, last_used_at, last_verified_at, last_error
         FROM upstream_sessions WHERE is_active = true AND is_valid = true
         ORDER BY created_at DESC LIMIT 1",
    )
    .fetch_optional(pool)
    .await
}

pub async fn find_active(pool: &PgPool) -> Result<Option<UpstreamSessionRow>, sqlx::Error> {
    sqlx::query_as::<_, UpstreamSessionRow>(
        "SELECT id, cookie_value, is_active, is_valid, fail_count, refresh_attempts,
                next_refresh_at, created_at, last_used_at, last_verified_at, last_error
         FROM upstream_sessions WHERE is_active = true
         ORDER BY created_at DESC LIMIT 1",
    )
    .fetch_optional(pool)
    .await
}

/// Deactivate all prior rows and insert a fresh active+valid row, inside
/// one transaction so at most one `is_active=true` row ever exists.
pub async fn save_new_active(
    pool: &PgPool,
    cookie_value: &str,
    proactive_window: chrono::Duration,
) -> Result<UpstreamSessionRow, sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("UPDATE upstream_sessions SET is_active = false WHERE is_active = true")
        .execute(&mut *tx)
        .await?;

    let next_refresh_at = chrono::Utc::now() + proactive_window;

    let row = sqlx::query_as::<_, UpstreamSessionRow>(
        "INSERT INTO upstream_sessions
            (cookie_value, is_active, is_valid, fail_count, refresh_attempts,
             next_refresh_at, created_at)
         VALUES ($1, true, true, 0, 0, $2, now())
         RETURNING id, cookie_value, is_active, is_valid, fail_count, refresh_attempts,
                   next_refresh_at, created_at, last_used_at, last_verified_at, last_error",
    )
    .bind(cookie_value)
    .bind(next_refresh_at)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(row)
}

pub async fn mark_invalid(pool: &PgPool, session_id: i32) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE upstream_sessions SET is_valid = false WHERE id = $1")
        .bind(session_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn touch_used(pool: &PgPool, session_id: i32) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE upstream_sessions SET last_used_at = now() WHERE id = $1")
        .bind(session_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn touch_verified(pool: &PgPool, session_id: i32) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE upstream_sessions SET last_verified_at = now() WHERE id = $1")
        .bind(session_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn record_refresh_attempt(
    conn: &mut PgConnection,
    session_id: i32,
    success: bool,
    error: Option<&str>,
) -> Result<i32, sqlx::Error> {
    if success {
        sqlx::query_scalar(
            "UPDATE upstream_sessions
             SET refresh_attempts = refresh_attempts + 1, fail_count = 0, last_error = NULL
             WHERE id = $1 RETURNING fail_count",
        )
        .bind(session_id)
        .fetch_one(conn)
        .await
    } else {
        sqlx::query_scalar(
            "UPDATE upstream_sessions
             SET refresh_attempts = refresh_attempts + 1, fail_count = fail_count + 1,
                 last_error = $2
             WHERE id = $1 RETURNING fail_count",
        )
        .bind(session_id)
        .bind(error.map(|e| e.chars().take(500).collect::<String>()))
        .fetch_one(conn)
        .await
    }
}
