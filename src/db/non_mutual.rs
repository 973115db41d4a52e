use sqlx::PgConnection;
use uuid::Uuid;

use crate::models::NonMutualRecordRow;
use crate::upstream::client::ConnectionUser;

/// Bulk-insert non-mutual records for a job. Direction is hardcoded per
/// the pipeline's contract: these rows only ever represent "user follows
/// target but target doesn't follow back" — the complementary direction
/// is never persisted.
pub async fn insert_batch(
    conn: &mut PgConnection,
    job_id: Uuid,
    users: &[ConnectionUser],
) -> Result<(), sqlx::Error> {
    for user in users {
        sqlx::query(
            "INSERT INTO non_mutual_records
                (id, job_id, target_user_id, target_handle, target_full_name,
                 target_avatar_url, user_follows_target, target_follows_user, is_mutual, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, true, false, false, now())",
        )
        .bind(Uuid::new_v4())
        .bind(job_id)
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.full_name)
        .bind(&user.avatar_url)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub async fn list_for_job(
    pool: &sqlx::PgPool,
    job_id: Uuid,
) -> Result<Vec<NonMutualRecordRow>, sqlx::Error> {
    sqlx::query_as::<_, NonMutualRecordRow>(
        "SELECT id, job_id, target_user_id, target_handle, target_full_name,
                target_avatar_url, user_follows_target, target_follows_user, is_mutual, created_at
         FROM non_mutual_records WHERE job_id = $1
         ORDER BY target_handle ASC",
    )
    .bind(job_id)
    .fetch_all(pool)
    .await
}
