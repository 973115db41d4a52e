use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::{JobRow, PaginationParams};

/// Insert a `pending` Job with `queue_position = max(active positions) + 1`,
/// computed inside the caller's transaction so it's atomic with the credit
/// deduction admission performs alongside it.
pub async fn insert_pending(
    conn: &mut PgConnection,
    user_id: i64,
    target_handle: &str,
) -> Result<JobRow, sqlx::Error> {
    let next_position: i32 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(queue_position), 0) + 1 FROM jobs
         WHERE status IN ('pending', 'processing')",
    )
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query_as::<_, JobRow>(
        "INSERT INTO jobs (id, user_id, target_handle, status, progress, queue_position, created_at)
         VALUES ($1, $2, $3, 'pending', 0, $4, now())
         RETURNING id, user_id, target_handle, status, progress, queue_position, started_at,
                   completed_at, followers_n, following_n, non_mutual_n, artifact_path,
                   error_message, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(target_handle)
    .bind(next_position)
    .fetch_one(conn)
    .await
}

pub async fn find(pool: &PgPool, job_id: Uuid) -> Result<Option<JobRow>, sqlx::Error> {
    sqlx::query_as::<_, JobRow>(
        "SELECT id, user_id, target_handle, status, progress, queue_position, started_at,
                completed_at, followers_n, following_n, non_mutual_n, artifact_path,
                error_message, created_at
         FROM jobs WHERE id = $1",
    )
    .bind(job_id)
    .fetch_optional(pool)
    .await
}

pub async fn list_for_user(
    pool: &PgPool,
    user_id: i64,
    pagination: &PaginationParams,
) -> Result<Vec<JobRow>, sqlx::Error> {
    sqlx::query_as::<_, JobRow>(
        "SELECT id, user_id, target_handle, status, progress, queue_position, started_at,
                completed_at, followers_n, following_n, non_mutual_n, artifact_path,
                error_message, created_at
         FROM jobs WHERE user_id = $1
         ORDER BY created_at DESC
         LIMIT $2 OFFSET $3",
    )
    .bind(user_id)
    .bind(pagination.limit_or(20))
    .bind(pagination.offset_or())
    .fetch_all(pool)
    .await
}

/// Atomically claim the lowest-positioned pending job: the worker's core
/// step 3. Returns `None` if the queue is empty.
pub async fn claim_next_pending(pool: &PgPool) -> Result<Option<JobRow>, sqlx::Error> {
    sqlx::query_as::<_, JobRow>(
        "UPDATE jobs SET status = 'processing', started_at = now()
         WHERE id = (
             SELECT id FROM jobs WHERE status = 'pending'
             ORDER BY queue_position ASC
             LIMIT 1
             FOR UPDATE SKIP LOCKED
         )
         RETURNING id, user_id, target_handle, status, progress, queue_position, started_at,
                   completed_at, followers_n, following_n, non_mutual_n, artifact_path,
                   error_message, created_at",
    )
    .fetch_optional(pool)
    .await
}

pub async fn count_processing(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE status = 'processing'")
        .fetch_one(pool)
        .await
}

/// Progress writes coalesce: the pipeline is responsible for skipping a
/// write when the new value equals the current one; this statement is
/// unconditional so that responsibility stays at the call site.
pub async fn update_progress(pool: &PgPool, job_id: Uuid, progress: i32) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE jobs SET progress = $2 WHERE id = $1")
        .bind(job_id)
        .bind(progress)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn mark_completed(
    conn: &mut PgConnection,
    job_id: Uuid,
    followers_n: i32,
    following_n: i32,
    non_mutual_n: i32,
    artifact_path: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE jobs SET status = 'completed', progress = 100, completed_at = now(),
                queue_position = NULL, followers_n = $2, following_n = $3,
                non_mutual_n = $4, artifact_path = $5
         WHERE id = $1",
    )
    .bind(job_id)
    .bind(followers_n)
    .bind(following_n)
    .bind(non_mutual_n)
    .bind(artifact_path)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn mark_failed(
    conn: &mut PgConnection,
    job_id: Uuid,
    error_message: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE jobs SET status = 'failed', progress = 100, completed_at = now(),
                queue_position = NULL, error_message = $2
         WHERE id = $1",
    )
    .bind(job_id)
    .bind(error_message)
    .execute(conn)
    .await?;
    Ok(())
}

/// Worker step 1: reclaim any job stuck in `processing` past the stale
/// threshold. Returns the reclaimed rows so the caller can refund credits
/// and notify, one transaction per row.
pub async fn find_stale_processing(
    pool: &PgPool,
    timeout: std::time::Duration,
) -> Result<Vec<JobRow>, sqlx::Error> {
    let threshold: DateTime<Utc> = Utc::now() - chrono::Duration::from_std(timeout).unwrap_or_default();
    sqlx::query_as::<_, JobRow>(
        "SELECT id, user_id, target_handle, status, progress, queue_position, started_at,
                completed_at, followers_n, following_n, non_mutual_n, artifact_path,
                error_message, created_at
         FROM jobs
         WHERE status = 'processing' AND started_at < $1",
    )
    .bind(threshold)
    .fetch_all(pool)
    .await
}

/// Worker step 5: reassign `1..N` among active rows ordered by current
/// position. Only rows with a non-null position participate, matching
/// the unique-position invariant's scope.
pub async fn compact_queue_positions(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "WITH ranked AS (
            SELECT id, ROW_NUMBER() OVER (ORDER BY queue_position ASC) AS rn
            FROM jobs WHERE status IN ('pending', 'processing')
        )
        UPDATE jobs SET queue_position = ranked.rn
        FROM ranked WHERE jobs.id = ranked.id AND jobs.queue_position <> ranked.rn",
    )
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn list_failed(pool: &PgPool, limit: i64) -> Result<Vec<JobRow>, sqlx::Error> {
    sqlx::query_as::<_, JobRow>(
        "SELECT id, user_id, target_handle, status, progress, queue_position, started_at,
                completed_at, followers_n, following_n, non_mutual_n, artifact_path,
                error_message, created_at
         FROM jobs WHERE status = 'failed'
         ORDER BY created_at DESC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn status_counts(pool: &PgPool) -> Result<(i64, i64, i64, i64), sqlx::Error> {
    let row: (i64, i64, i64, i64) = sqlx::query_as(
        "SELECT
            COUNT(*) FILTER (WHERE status = 'completed'),
            COUNT(*) FILTER (WHERE status = 'failed'),
            COUNT(*) FILTER (WHERE status = 'pending'),
            COUNT(*) FILTER (WHERE status = 'processing')
         FROM jobs",
    )
    .fetch_one(pool)
    .await?;
    Ok(row)
}
