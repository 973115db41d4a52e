//! Per-job orchestrator: fetch → compare → persist → render → notify,
//! with the anomaly guard and mandatory credit-refund invariant from
//! spec §4.4. One call to `run_job` drives a claimed job from
//! `processing` to a terminal status; it never leaves the row in
//! `processing` on a classified failure (only a genuine panic would, and
//! stale-recovery reclaims that case too).

pub mod notify;
pub mod report;

use std::collections::HashSet;
use std::time::Duration;

use sqlx::PgPool;
use uuid::Uuid;

use crate::db;
use crate::models::JobRow;
use crate::state::AppState;
use crate::upstream::client::{ConnectionKind, ConnectionUser, UpstreamClient};
use crate::error::UpstreamError;

use notify::{ChatTransport, LoggingTransport};

const PROGRESS_PROFILE: i32 = 5;
const PROGRESS_FOLLOWERS_START: i32 = 10;
const PROGRESS_FOLLOWERS_END: i32 = 50;
const PROGRESS_FOLLOWING_START: i32 = 50;
const PROGRESS_FOLLOWING_END: i32 = 90;
const PROGRESS_COMPUTED: i32 = 90;
const PROGRESS_PERSISTED: i32 = 95;
const PROGRESS_RENDERED: i32 = 95;
const INTER_STAGE_SPACER: Duration = Duration::from_secs(6);

enum StageFailure {
    UserNotFound,
    PrivateAccount,
    RateLimited,
    SessionExpired,
    Transient(String),
    EmptyResults,
    EmptyFollowers,
}

impl StageFailure {
    fn user_message(&self) -> &'static str {
        match self {
            StageFailure::UserNotFound => "Handle not found",
            StageFailure::PrivateAccount => "Account is private",
            StageFailure::RateLimited => "Temporarily blocked; retry later",
            StageFailure::SessionExpired => "Auth problem; being repaired",
            StageFailure::Transient(_) => "Data fetch error",
            StageFailure::EmptyResults | StageFailure::EmptyFollowers => "Couldn't fetch data",
        }
    }

    fn internal_reason(&self) -> String {
        match self {
            StageFailure::UserNotFound => "UserNotFound".to_string(),
            StageFailure::PrivateAccount => "PrivateAccount".to_string(),
            StageFailure::RateLimited => "RateLimited".to_string(),
            StageFailure::SessionExpired => "SessionExpired".to_string(),
            StageFailure::Transient(msg) => format!("Transient: {msg}"),
            StageFailure::EmptyResults => "EmptyResults".to_string(),
            StageFailure::EmptyFollowers => "EmptyFollowers".to_string(),
        }
    }

    fn should_invalidate_session(&self) -> bool {
        matches!(self, StageFailure::SessionExpired | StageFailure::EmptyResults)
    }

    fn should_reactive_refresh(&self) -> bool {
        matches!(self, StageFailure::SessionExpired)
    }
}

struct StageSuccess {
    followers: Vec<ConnectionUser>,
    following: Vec<ConnectionUser>,
    non_mutual: Vec<ConnectionUser>,
}

pub async fn run_job(state: &AppState, job: JobRow) {
    let transport = LoggingTransport;

    notify::notify_admins(
        &transport,
        &state.settings,
        &format!("Job {} started for @{}", job.id, job.target_handle),
    )
    .await;

    match execute(state, &job).await {
        Ok(success) => complete(state, &transport, &job, success).await,
        Err(failure) => fail(state, &transport, &job, failure).await,
    }
}

async fn execute(state: &AppState, job: &JobRow) -> Result<StageSuccess, StageFailure> {
    let client = UpstreamClient::new(state.http_client.clone(), state.settings.clone());

    set_progress(&state.db, job.id, 0).await;

    let cookie = state.session_manager.current().await;

    set_progress(&state.db, job.id, PROGRESS_PROFILE).await;
    let profile = client
        .get_profile(&job.target_handle, cookie.as_deref())
        .await
        .map_err(classify)?;

    if profile.is_private && cookie.is_none() {
        return Err(StageFailure::PrivateAccount);
    }

    let page_size = state.settings.upstream_page_size;
    let max_items = state.settings.upstream_max_items;
    let (delay_min, delay_max) = (state.settings.pipeline_delay_min, state.settings.pipeline_delay_max);

    let last_progress = std::sync::Arc::new(std::sync::atomic::AtomicI32::new(PROGRESS_PROFILE));

    let followers = client
        .fetch_connections(profile.id, ConnectionKind::Followers, cookie.as_deref(), delay_min, delay_max, page_size, max_items, {
            let last_progress = last_progress.clone();
            move |fetched, _| {
                report_progress(&state.db, job.id, &last_progress, interpolate(PROGRESS_FOLLOWERS_START, PROGRESS_FOLLOWERS_END, fetched, max_items as usize));
            }
        })
        .await
        .map_err(classify)?;

    tokio::time::sleep(INTER_STAGE_SPACER).await;

    let following = client
        .fetch_connections(profile.id, ConnectionKind::Following, cookie.as_deref(), delay_min, delay_max, page_size, max_items, {
            let last_progress = last_progress.clone();
            move |fetched, _| {
                report_progress(&state.db, job.id, &last_progress, interpolate(PROGRESS_FOLLOWING_START, PROGRESS_FOLLOWING_END, fetched, max_items as usize));
            }
        })
        .await
        .map_err(classify)?;

    set_progress(&state.db, job.id, PROGRESS_COMPUTED).await;

    if followers.is_empty() && following.is_empty() {
        return Err(StageFailure::EmptyResults);
    }
    if followers.is_empty() && !following.is_empty() {
        return Err(StageFailure::EmptyFollowers);
    }

    let follower_ids: HashSet<i64> = followers.iter().map(|u| u.id).collect();
    let non_mutual: Vec<ConnectionUser> = following
        .iter()
        .filter(|u| !follower_ids.contains(&u.id))
        .cloned()
        .collect();

    Ok(StageSuccess { followers, following, non_mutual })
}

fn classify(e: UpstreamError) -> StageFailure {
    match e {
        UpstreamError::UserNotFound => StageFailure::UserNotFound,
        UpstreamError::PrivateAccount => StageFailure::PrivateAccount,
        UpstreamError::RateLimited => StageFailure::RateLimited,
        UpstreamError::SessionExpired => StageFailure::SessionExpired,
        UpstreamError::Transient(m) => StageFailure::Transient(m),
        UpstreamError::IncompleteData { fetched_count, connection_type } => {
            StageFailure::RateLimited.tap_log(fetched_count, &connection_type)
        }
    }
}

impl StageFailure {
    fn tap_log(self, fetched_count: usize, connection_type: &str) -> Self {
        tracing::warn!(
            "pipeline: incomplete {} data after {} items, failing job",
            connection_type,
            fetched_count
        );
        self
    }
}

fn interpolate(start: i32, end: i32, fetched: usize, max_items: usize) -> i32 {
    if max_items == 0 {
        return end;
    }
    let fraction = (fetched as f64 / max_items as f64).min(1.0);
    start + ((end - start) as f64 * fraction).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolate_clamps_at_end_when_overshooting_max_items() {
        assert_eq!(interpolate(10, 50, 20_000, 10_000), 50);
    }

    #[test]
    fn interpolate_returns_start_at_zero_fetched() {
        assert_eq!(interpolate(10, 50, 0, 10_000), 10);
    }

    #[test]
    fn interpolate_returns_end_when_max_items_is_zero() {
        assert_eq!(interpolate(10, 50, 0, 0), 50);
    }

    #[test]
    fn interpolate_is_monotonic_with_progress() {
        let a = interpolate(10, 90, 1_000, 10_000);
        let b = interpolate(10, 90, 5_000, 10_000);
        assert!(b > a);
    }
}

async fn set_progress(pool: &PgPool, job_id: Uuid, progress: i32) {
    if let Err(e) = db::jobs::update_progress(pool, job_id, progress).await {
        tracing::warn!("pipeline: failed to write progress for job {}: {}", job_id, e);
    }
}

/// Synchronous-looking wrapper so the pagination callback (not `async`)
/// can still write progress; spawns the write and does not await it,
/// matching the "non-suspending progress callback" contract in spec §4.1.
/// `last_progress` enforces monotonicity across out-of-order task
/// completions — the queue doesn't enforce it, the pipeline does.
fn report_progress(pool: &PgPool, job_id: Uuid, last_progress: &std::sync::Arc<std::sync::atomic::AtomicI32>, progress: i32) {
    use std::sync::atomic::Ordering;

    let mut current = last_progress.load(Ordering::Relaxed);
    loop {
        if progress <= current {
            return;
        }
        match last_progress.compare_exchange_weak(current, progress, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => break,
            Err(observed) => current = observed,
        }
    }

    let pool = pool.clone();
    tokio::spawn(async move {
        set_progress(&pool, job_id, progress).await;
    });
}

async fn complete(state: &AppState, transport: &dyn ChatTransport, job: &JobRow, success: StageSuccess) {
    let artifact = match report::render(&state.settings.upload_dir, job.id, &job.target_handle, &to_rows(job.id, &success.non_mutual)) {
        Ok(a) => a,
        Err(e) => {
            tracing::error!("pipeline: report render failed for job {}: {}", job.id, e);
            fail(state, transport, job, StageFailure::Transient(format!("render failed: {e}"))).await;
            return;
        }
    };

    set_progress(&state.db, job.id, PROGRESS_RENDERED).await;

    let result = async {
        let mut tx = state.db.begin().await?;
        db::non_mutual::insert_batch(&mut tx, job.id, &success.non_mutual).await?;
        db::jobs::mark_completed(
            &mut tx,
            job.id,
            success.followers.len() as i32,
            success.following.len() as i32,
            success.non_mutual.len() as i32,
            &artifact.path,
        )
        .await?;
        tx.commit().await?;
        Ok::<(), sqlx::Error>(())
    }
    .await;

    if let Err(e) = result {
        tracing::error!("pipeline: failed to persist completion for job {}: {}", job.id, e);
        return;
    }

    set_progress(&state.db, job.id, PROGRESS_PERSISTED).await;

    notify::notify_user_document(
        transport,
        job.user_id,
        std::path::Path::new(&artifact.path),
        &format!(
            "Analysis of @{} complete: {} non-mutual accounts.",
            job.target_handle,
            success.non_mutual.len()
        ),
    )
    .await;

    notify::notify_admins(
        transport,
        &state.settings,
        &format!(
            "Job {} completed for @{}: {} followers, {} following, {} non-mutual",
            job.id,
            job.target_handle,
            success.followers.len(),
            success.following.len(),
            success.non_mutual.len()
        ),
    )
    .await;
}

fn to_rows(job_id: Uuid, users: &[ConnectionUser]) -> Vec<crate::models::NonMutualRecordRow> {
    users
        .iter()
        .map(|u| crate::models::NonMutualRecordRow {
            id: Uuid::new_v4(),
            job_id,
            target_user_id: u.id,
            target_handle: u.username.clone(),
            target_full_name: u.full_name.clone(),
            target_avatar_url: u.avatar_url.clone(),
            user_follows_target: true,
            target_follows_user: false,
            is_mutual: false,
            created_at: chrono::Utc::now(),
        })
        .collect()
}

async fn fail(state: &AppState, transport: &dyn ChatTransport, job: &JobRow, failure: StageFailure) {
    let reason = failure.internal_reason();

    if let Err(e) = fail_and_refund(&state.db, job.id, job.user_id, &reason).await {
        tracing::error!("pipeline: failed to fail+refund job {}: {}", job.id, e);
        return;
    }

    if failure.should_invalidate_session() {
        state.session_manager.mark_invalid_current().await;
    }
    if failure.should_reactive_refresh() {
        let manager = state.session_manager.clone();
        tokio::spawn(async move {
            if let Err(e) = manager.reactive_refresh().await {
                tracing::error!("pipeline: reactive refresh after session expiry failed: {}", e);
            }
        });
    }

    notify::notify_user(
        transport,
        job.user_id,
        &format!("Analysis of @{} failed: {}. Your credit has been refunded.", job.target_handle, failure.user_message()),
    )
    .await;

    notify::notify_admins(
        transport,
        &state.settings,
        &format!("Job {} failed for @{}: {}", job.id, job.target_handle, reason),
    )
    .await;
}

/// Shared by the pipeline's own failure path and the worker's
/// stale-recovery sweep: one transaction writing both the refund and the
/// terminal status, per spec §4.4's mandatory-refund invariant.
pub async fn fail_and_refund(pool: &PgPool, job_id: Uuid, user_id: i64, reason: &str) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    db::users::adjust_balance(&mut tx, user_id, 1).await?;
    db::jobs::mark_failed(&mut tx, job_id, reason).await?;
    tx.commit().await?;
    Ok(())
}
