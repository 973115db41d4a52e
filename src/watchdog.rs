// Jaskier Shared Pattern — watchdog
// Periodically checks backend health and logs status for external
// monitoring: DB connectivity ping (SELECT 1) and current-session
// usability. Distinct from the session scheduler's rotation logic — this
// only observes and logs, it never refreshes.

use std::time::Duration;

use crate::state::AppState;

const CHECK_INTERVAL: Duration = Duration::from_secs(60);
const DB_PING_TIMEOUT: Duration = Duration::from_secs(5);

pub fn spawn(state: AppState) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!("watchdog: started (interval={}s)", CHECK_INTERVAL.as_secs());

        loop {
            tokio::time::sleep(CHECK_INTERVAL).await;

            let db_ok = check_db(&state).await;
            let session_ok = check_session(&state).await;

            if db_ok && session_ok {
                tracing::debug!("watchdog: all checks passed");
            } else {
                tracing::warn!(
                    "watchdog: db={} session={}",
                    if db_ok { "ok" } else { "FAIL" },
                    if session_ok { "ok" } else { "UNUSABLE" },
                );
            }
        }
    })
}

async fn check_db(state: &AppState) -> bool {
    let result = tokio::time::timeout(
        DB_PING_TIMEOUT,
        sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&state.db),
    )
    .await;

    match result {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            tracing::error!("watchdog: DB ping failed: {}", e);
            false
        }
        Err(_) => {
            tracing::error!("watchdog: DB ping timed out after {}s", DB_PING_TIMEOUT.as_secs());
            false
        }
    }
}

async fn check_session(state: &AppState) -> bool {
    match state.session_manager.current().await {
        Some(cookie) => state.session_manager.validate(&cookie).await.is_usable(),
        None => {
            tracing::warn!("watchdog: no usable session available");
            false
        }
    }
}
