use sqlx::PgConnection;
use uuid::Uuid;

/// Records the referral link the first time it's seen. `referred_user_id`
/// is unique — a user can only ever be referred once.
pub async fn record(
    conn: &mut PgConnection,
    referrer_user_id: i64,
    referred_user_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO referrals (id, referrer_user_id, referred_user_id, bonus_granted, created_at)
         VALUES ($1, $2, $3, false, now())
         ON CONFLICT (referred_user_id) DO NOTHING",
    )
    .bind(Uuid::new_v4())
    .bind(referrer_user_id)
    .bind(referred_user_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Grants the referrer one bonus credit the first time the referred user's
/// payment completes. Returns the referrer id if a bonus was granted.
pub async fn grant_bonus_if_first_payment(
    conn: &mut PgConnection,
    referred_user_id: i64,
) -> Result<Option<i64>, sqlx::Error> {
    let referrer_id = sqlx::query_scalar::<_, i64>(
        "UPDATE referrals SET bonus_granted = true
         WHERE referred_user_id = $1 AND bonus_granted = false
         RETURNING referrer_user_id",
    )
    .bind(referred_user_id)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(referrer_id) = referrer_id {
        crate::db::users::adjust_balance(conn, referrer_id, 1).await?;
    }

    Ok(referrer_id)
}
