//! Two independent background ticks driving the session manager: a
//! proactive-rotation check and a reactive health probe. Both are
//! idempotent and safe to run repeatedly — each decides from current DB
//! state whether there is anything to do.

use std::sync::Arc;

use crate::session::manager::SessionManager;

pub async fn run_proactive_refresh(manager: Arc<SessionManager>, interval: std::time::Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        if manager.should_refresh_proactively().await {
            tracing::info!("session_scheduler: proactive refresh window reached, rotating session");
            if let Err(e) = manager.refresh_now().await {
                tracing::error!("session_scheduler: proactive refresh failed: {}", e);
            }
        }
    }
}

pub async fn run_health_check(manager: Arc<SessionManager>, interval: std::time::Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let Some(cookie) = manager.current().await else {
            tracing::warn!("session_scheduler: no session to health-check, refreshing");
            if let Err(e) = manager.refresh_now().await {
                tracing::error!("session_scheduler: health-check refresh failed: {}", e);
            }
            continue;
        };

        let result = manager.validate(&cookie).await;
        if !result.is_usable() {
            tracing::warn!("session_scheduler: health check failed ({}), triggering reactive refresh", result.reason());
            if let Err(e) = manager.reactive_refresh().await {
                tracing::error!("session_scheduler: reactive refresh failed: {}", e);
            }
        }
    }
}
