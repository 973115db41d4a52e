//! Delivery of user/admin messages. A thin trait at the boundary named in
//! spec §6 — the chat bot's actual transport lives outside the core and
//! is deliberately out of scope; this crate ships a logging-only
//! implementation so the pipeline has somewhere to call.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Settings;

#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_text(&self, user_id: i64, body: &str, parse_mode: Option<&str>, reply_markup: Option<&str>);
    async fn send_document(&self, user_id: i64, path: &Path, caption: &str);
}

/// Default transport: logs what would have been sent. Real bot wiring is
/// plumbing over this contract, not part of the core.
pub struct LoggingTransport;

#[async_trait]
impl ChatTransport for LoggingTransport {
    async fn send_text(&self, user_id: i64, body: &str, parse_mode: Option<&str>, reply_markup: Option<&str>) {
        tracing::info!(
            "notify: send_text user={} parse_mode={:?} reply_markup={:?} body={:?}",
            user_id,
            parse_mode,
            reply_markup,
            body
        );
    }

    async fn send_document(&self, user_id: i64, path: &Path, caption: &str) {
        tracing::info!("notify: send_document user={} path={:?} caption={:?}", user_id, path, caption);
    }
}

/// Notifications are best-effort: a delivery failure is logged, never
/// propagated, and must never roll back the caller's transaction.
pub async fn notify_user(transport: &dyn ChatTransport, user_id: i64, body: &str) {
    transport.send_text(user_id, body, None, None).await;
}

pub async fn notify_user_document(transport: &dyn ChatTransport, user_id: i64, path: &Path, caption: &str) {
    transport.send_document(user_id, path, caption).await;
}

pub async fn notify_admins(transport: &dyn ChatTransport, settings: &Arc<Settings>, body: &str) {
    if settings.admin_chat_ids.is_empty() {
        tracing::info!("notify: no admin chat ids configured, logging only: {}", body);
        return;
    }
    for admin_id in &settings.admin_chat_ids {
        transport.send_text(*admin_id, body, None, None).await;
    }
}
