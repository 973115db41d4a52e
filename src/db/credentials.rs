use sqlx::PgPool;

use crate::models::RefreshCredentialRow;

pub async fn find_active(pool: &PgPool) -> Result<Option<RefreshCredentialRow>, sqlx::Error> {
    sqlx::query_as::<_, RefreshCredentialRow>(
        "SELECT id, username, password_ciphertext, totp_secret_ciphertext, is_active,
                last_used_at, last_login_success, last_error, created_at
         FROM refresh_credentials WHERE is_active = true
         ORDER BY created_at DESC LIMIT 1",
    )
    .fetch_optional(pool)
    .await
}

/// Deactivate any existing credential and store a fresh one — single-active
/// invariant, mirroring the upstream session's own rotation discipline.
pub async fn save(
    pool: &PgPool,
    username: &str,
    password_ciphertext: &str,
    totp_secret_ciphertext: Option<&str>,
) -> Result<RefreshCredentialRow, sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("UPDATE refresh_credentials SET is_active = false WHERE is_active = true")
        .execute(&mut *tx)
        .await?;

    let row = sqlx::query_as::<_, RefreshCredentialRow>(
        "INSERT INTO refresh_credentials
            (username, password_ciphertext, totp_secret_ciphertext, is_active, created_at)
         VALUES ($1, $2, $3, true, now())
         RETURNING id, username, password_ciphertext, totp_secret_ciphertext, is_active,
                   last_used_at, last_login_success, last_error, created_at",
    )
    .bind(username)
    .bind(password_ciphertext)
    .bind(totp_secret_ciphertext)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(row)
}

pub async fn record_outcome(
    pool: &PgPool,
    credential_id: i32,
    success: bool,
    error: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE refresh_credentials
         SET last_used_at = now(), last_login_success = $2, last_error = $3
         WHERE id = $1",
    )
    .bind(credential_id)
    .bind(success)
    .bind(error)
    .execute(pool)
    .await?;
    Ok(())
}
