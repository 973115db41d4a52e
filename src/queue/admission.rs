//! Job admission: the transaction that deducts one credit and assigns a
//! queue position atomically, per spec §4.3's admission policy.

use sqlx::PgPool;

use crate::db;
use crate::error::AppError;
use crate::models::JobRow;

pub async fn admit_job(pool: &PgPool, user_id: i64, target_handle: &str) -> Result<JobRow, AppError> {
    let mut tx = pool.begin().await?;

    let balance = db::users::lock_balance(&mut tx, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".to_string()))?;

    if balance < 1 {
        return Err(AppError::InsufficientBalance);
    }

    db::users::adjust_balance(&mut tx, user_id, -1).await?;
    let job = db::jobs::insert_pending(&mut tx, user_id, target_handle).await?;

    tx.commit().await?;

    Ok(job)
}
