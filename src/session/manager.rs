//! Owns the single shared upstream credential: storage, validation,
//! proactive/reactive rotation, and a process-wide read-mostly cache kept
//! coherent with the database (write DB first, then update the cell).

use std::sync::Arc;
use std::time::Instant;

use sqlx::PgPool;
use tokio::sync::{Mutex, RwLock};

use crate::config::Settings;
use crate::db;
use crate::session::browser::{self, LoginOutcome};

#[derive(Clone)]
struct CachedCookie {
    cookie: String,
    cached_at: Instant,
}

pub enum ValidationResult {
    Valid,
    Invalid,
    ProbablyValid,
    OptimisticallyValid,
}

impl ValidationResult {
    pub fn is_usable(&self) -> bool {
        !matches!(self, ValidationResult::Invalid)
    }

    pub fn reason(&self) -> &'static str {
        match self {
            ValidationResult::Valid => "probe returned 200",
            ValidationResult::Invalid => "probe redirected to login",
            ValidationResult::ProbablyValid => "probe rate-limited",
            ValidationResult::OptimisticallyValid => "probe timed out",
        }
    }
}

pub struct SessionManager {
    db: PgPool,
    probe_client: reqwest::Client,
    settings: Arc<Settings>,
    cache: RwLock<Option<CachedCookie>>,
    /// Single-flight guard: at most one refresh in progress at a time.
    refresh_lock: Mutex<()>,
}

impl SessionManager {
    pub fn new(db: PgPool, http: reqwest::Client, settings: Arc<Settings>) -> Self {
        let _ = &http; // the shared client is used by the upstream client, not the probe
        let probe_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("failed to build session probe client");

        Self {
            db,
            probe_client,
            settings,
            cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Prefers the DB row with `is_active ∧ is_valid`; falls back to the
    /// in-process cache (served even when stale, best-effort, while an
    /// async refresh may be in flight); last resort is `None`.
    pub async fn current(&self) -> Option<String> {
        match db::sessions::find_active_valid(&self.db).await {
            Ok(Some(row)) => {
                let mut cache = self.cache.write().await;
                *cache = Some(CachedCookie {
                    cookie: row.cookie_value.clone(),
                    cached_at: Instant::now(),
                });
                return Some(row.cookie_value);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("session_manager: current() DB lookup failed: {}", e),
        }

        let cache = self.cache.read().await;
        cache.as_ref().map(|c| c.cookie.clone())
    }

    pub async fn save(&self, cookie: &str) -> Result<(), sqlx::Error> {
        let row = db::sessions::save_new_active(&self.db, cookie, self.settings.session_proactive_window).await?;
        let mut cache = self.cache.write().await;
        *cache = Some(CachedCookie {
            cookie: row.cookie_value,
            cached_at: Instant::now(),
        });
        tracing::info!("session_manager: new active session saved (id={})", row.id);
        Ok(())
    }

    pub async fn mark_invalid_current(&self) {
        if let Ok(Some(row)) = db::sessions::find_active(&self.db).await {
            if let Err(e) = db::sessions::mark_invalid(&self.db, row.id).await {
                tracing::warn!("session_manager: mark_invalid failed: {}", e);
            }
        }
        let mut cache = self.cache.write().await;
        *cache = None;
    }

    /// Issues one probe request. Never rejects a good cookie just because
    /// the probe itself was noisy — rate limits and timeouts resolve
    /// optimistically in favor of keeping the cookie usable.
    pub async fn validate(&self, cookie: &str) -> ValidationResult {
        let url = "https://www.example-photo-network.com/api/v1/accounts/current_user";
        let result = self
            .probe_client
            .get(url)
            .header("Cookie", format!("sessionid={cookie}"))
            .send()
            .await;

        match result {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    if let Ok(Some(row)) = db::sessions::find_active(&self.db).await {
                        let _ = db::sessions::touch_verified(&self.db, row.id).await;
                    }
                    ValidationResult::Valid
                } else if status.is_redirection() {
                    let redirects_to_login = resp
                        .headers()
                        .get("location")
                        .and_then(|v| v.to_str().ok())
                        .map(|loc| loc.contains("/accounts/login"))
                        .unwrap_or(true);
                    if redirects_to_login {
                        ValidationResult::Invalid
                    } else {
                        ValidationResult::Valid
                    }
                } else if status.as_u16() == 429 {
                    ValidationResult::ProbablyValid
                } else {
                    ValidationResult::Invalid
                }
            }
            Err(e) if e.is_timeout() => ValidationResult::OptimisticallyValid,
            Err(_) => ValidationResult::OptimisticallyValid,
        }
    }

    pub async fn should_refresh_proactively(&self) -> bool {
        match db::sessions::find_active_valid(&self.db).await {
            Ok(Some(row)) => match row.next_refresh_at {
                Some(next) => chrono::Utc::now() >= next,
                None => {
                    let age = chrono::Utc::now() - row.created_at;
                    age >= self.settings.session_proactive_window
                }
            },
            Ok(None) => true,
            Err(e) => {
                tracing::warn!("session_manager: should_refresh_proactively DB error: {}", e);
                false
            }
        }
    }

    /// Login-by-browser refresh path. Single-flight: concurrent callers
    /// block on the same in-progress refresh rather than launching a
    /// second browser instance.
    pub async fn refresh_now(&self) -> Result<(), String> {
        let _guard = self.refresh_lock.lock().await;

        let credential = match db::credentials::find_active(&self.db).await {
            Ok(Some(c)) => c,
            Ok(None) => return Err("no active refresh credential configured".to_string()),
            Err(e) => return Err(format!("failed to load credential: {e}")),
        };

        let outcome = browser::login_and_extract_cookie(&self.settings, &credential).await;

        match outcome {
            Ok(LoginOutcome::Success { cookie }) => {
                let _ = db::credentials::record_outcome(&self.db, credential.id, true, None).await;
                if let Err(e) = self.save(&cookie).await {
                    return Err(format!("failed to persist refreshed session: {e}"));
                }
                let mut tx = self.db.begin().await.map_err(|e| e.to_string())?;
                if let Ok(Some(row)) = db::sessions::find_active(&self.db).await {
                    let _ = db::sessions::record_refresh_attempt(&mut tx, row.id, true, None).await;
                }
                tx.commit().await.map_err(|e| e.to_string())?;
                tracing::info!("session_manager: refresh succeeded");
                Ok(())
            }
            Ok(LoginOutcome::LoginFailed { reason }) | Ok(LoginOutcome::TwoFactorRequired { reason }) => {
                let _ = db::credentials::record_outcome(&self.db, credential.id, false, Some(&reason)).await;
                self.escalate_failure(&reason).await;
                Err(reason)
            }
            Err(e) => {
                let _ = db::credentials::record_outcome(&self.db, credential.id, false, Some(&e)).await;
                self.escalate_failure(&e).await;
                Err(e)
            }
        }
    }

    async fn escalate_failure(&self, reason: &str) {
        let fail_count = if let Ok(Some(row)) = db::sessions::find_active(&self.db).await {
            let mut tx = match self.db.begin().await {
                Ok(tx) => tx,
                Err(_) => return,
            };
            let count = db::sessions::record_refresh_attempt(&mut tx, row.id, false, Some(reason))
                .await
                .unwrap_or(0);
            let _ = tx.commit().await;
            count
        } else {
            0
        };

        if fail_count >= self.settings.session_max_fail_count as i32 {
            tracing::error!(
                "session_manager: CRITICAL — {} consecutive refresh failures, admin intervention required: {}",
                fail_count,
                reason
            );
        } else {
            tracing::warn!("session_manager: refresh failed ({}/{}): {}", fail_count, self.settings.session_max_fail_count, reason);
        }
    }

    /// Reactive path: called by the pipeline the moment C1 reports
    /// `SessionExpired`. Invalidates immediately, then refreshes.
    pub async fn reactive_refresh(&self) -> Result<(), String> {
        self.mark_invalid_current().await;
        self.refresh_now().await
    }
}
