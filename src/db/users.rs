use rand::Rng;
use sqlx::{PgConnection, PgPool};

use crate::models::UserRow;

const REFERRAL_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

fn generate_referral_code() -> String {
    let mut rng = rand::thread_rng();
    (0..8)
        .map(|_| REFERRAL_CODE_ALPHABET[rng.gen_range(0..REFERRAL_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Upsert a user by external id. New users with `is_admin=false` start
/// with a zero balance; admins start with 100 (test/ops convenience).
pub async fn ensure(
    pool: &PgPool,
    user_id: i64,
    is_admin: bool,
    referrer_code: Option<&str>,
) -> Result<UserRow, sqlx::Error> {
    if let Some(existing) = find(pool, user_id).await? {
        return Ok(existing);
    }

    let initial_balance = if is_admin { 100 } else { 0 };
    let referral_code = generate_referral_code();

    let referrer_id = match referrer_code {
        Some(code) => {
            sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE referral_code = $1")
                .bind(code)
                .fetch_optional(pool)
                .await?
        }
        None => None,
    };

    sqlx::query_as::<_, UserRow>(
        "INSERT INTO users (id, credit_balance, referral_code, referrer_id, is_admin, created_at)
         VALUES ($1, $2, $3, $4, $5, now())
         ON CONFLICT (id) DO UPDATE SET id = users.id
         RETURNING id, credit_balance, referral_code, referrer_id, is_admin, created_at",
    )
    .bind(user_id)
    .bind(initial_balance)
    .bind(&referral_code)
    .bind(referrer_id)
    .bind(is_admin)
    .fetch_one(pool)
    .await
}

pub async fn find(pool: &PgPool, user_id: i64) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>(
        "SELECT id, credit_balance, referral_code, referrer_id, is_admin, created_at
         FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

/// Adjust `credit_balance` by `delta` inside the caller's transaction.
/// Callers are responsible for enforcing non-negativity before calling
/// with a negative delta (admission checks the balance first).
pub async fn adjust_balance(
    conn: &mut PgConnection,
    user_id: i64,
    delta: i32,
) -> Result<i32, sqlx::Error> {
    sqlx::query_scalar::<_, i32>(
        "UPDATE users SET credit_balance = credit_balance + $2 WHERE id = $1
         RETURNING credit_balance",
    )
    .bind(user_id)
    .bind(delta)
    .fetch_one(conn)
    .await
}

/// Row-lock the user for the duration of the caller's transaction, so a
/// concurrent admission can't read a stale balance. Returns `None` if the
/// user doesn't exist.
pub async fn lock_balance(conn: &mut PgConnection, user_id: i64) -> Result<Option<i32>, sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT credit_balance FROM users WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(conn)
        .await
}
