// Jaskier Shared Pattern — state
// Mutual-followers analysis backend — application state

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use sqlx::PgPool;
use tokio::sync::{Notify, RwLock};

use crate::config::Settings;
use crate::session::manager::SessionManager;

// ── Circuit Breaker — Jaskier Shared Pattern ────────────────────────────────
/// Trips after `FAILURE_THRESHOLD` consecutive upstream failures and blocks
/// new requests for `COOLDOWN_SECS`, giving the upstream time to recover.
/// Thread-safe — atomics plus a lock guarding only the tripped timestamp.
pub struct CircuitBreaker {
    consecutive_failures: AtomicU32,
    tripped_at: RwLock<Option<Instant>>,
}

const FAILURE_THRESHOLD: u32 = 3;
const COOLDOWN_SECS: u64 = 60;

impl CircuitBreaker {
    pub fn new() -> Self {
        Self {
            consecutive_failures: AtomicU32::new(0),
            tripped_at: RwLock::new(None),
        }
    }

    pub async fn allow_request(&self) -> bool {
        let guard = self.tripped_at.read().await;
        if let Some(tripped) = *guard {
            if tripped.elapsed().as_secs() < COOLDOWN_SECS {
                return false;
            }
            drop(guard);
            let mut wg = self.tripped_at.write().await;
            if let Some(t) = *wg {
                if t.elapsed().as_secs() >= COOLDOWN_SECS {
                    *wg = None;
                    self.consecutive_failures.store(0, Ordering::Relaxed);
                    tracing::info!("circuit_breaker: cooldown elapsed, resetting to half-open");
                }
            }
        }
        true
    }

    pub async fn record_success(&self) {
        let prev = self.consecutive_failures.swap(0, Ordering::Relaxed);
        if prev > 0 {
            let mut wg = self.tripped_at.write().await;
            *wg = None;
            tracing::info!("circuit_breaker: success recorded, circuit closed (was {} failures)", prev);
        }
    }

    pub async fn record_failure(&self) {
        let count = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::warn!("circuit_breaker: failure #{}", count);
        if count >= FAILURE_THRESHOLD {
            let mut wg = self.tripped_at.write().await;
            if wg.is_none() {
                *wg = Some(Instant::now());
                tracing::error!(
                    "circuit_breaker: TRIPPED after {} consecutive failures — blocking requests for {}s",
                    count, COOLDOWN_SECS
                );
            }
        }
    }
}

// ── Shared AppState ──────────────────────────────────────────────────────
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub settings: Arc<Settings>,
    pub start_time: Instant,
    pub http_client: reqwest::Client,
    pub session_manager: Arc<SessionManager>,
    /// `true` once startup recovery/sync completes.
    pub ready: Arc<AtomicBool>,
    /// Circuit breaker guarding upstream fetches — Jaskier Shared Pattern
    pub circuit_breaker: Arc<CircuitBreaker>,
    /// Woken whenever a job is admitted, so the worker doesn't wait a full tick.
    pub queue_notify: Arc<Notify>,
}

impl AppState {
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Relaxed);
        tracing::info!("backend marked as READY");
    }
}

impl AppState {
    pub fn new(db: PgPool, settings: Settings) -> Self {
        let settings = Arc::new(settings);

        let http_client = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .timeout(std::time::Duration::from_secs(30))
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .expect("failed to build HTTP client");

        let session_manager = Arc::new(SessionManager::new(
            db.clone(),
            http_client.clone(),
            settings.clone(),
        ));

        tracing::info!("AppState initialised");

        Self {
            db,
            settings,
            start_time: Instant::now(),
            http_client,
            session_manager,
            ready: Arc::new(AtomicBool::new(false)),
            circuit_breaker: Arc::new(CircuitBreaker::new()),
            queue_notify: Arc::new(Notify::new()),
        }
    }

    /// Test-only constructor — uses `connect_lazy` so no real DB is needed.
    /// Only suitable for endpoints that don't issue SQL queries.
    #[doc(hidden)]
    pub fn new_test() -> Self {
        let db = PgPool::connect_lazy("postgres://test@localhost:19999/test").expect("lazy pool");

        let mut settings = test_settings();
        settings.database_url = "postgres://test@localhost:19999/test".to_string();

        Self::new(db, settings)
    }
}

#[doc(hidden)]
pub fn test_settings() -> Settings {
    // Mirrors Settings::load()'s defaults without requiring env vars.
    Settings {
        database_url: "postgres://test@localhost:19999/test".to_string(),
        upload_dir: "./uploads".to_string(),
        auth_secret: None,
        worker_parallelism_cap: 1,
        stale_job_timeout: std::time::Duration::from_secs(30 * 60),
        queue_compaction_interval_ticks: 50,
        worker_tick_interval: std::time::Duration::from_secs(5),
        upstream_delay_min: std::time::Duration::from_millis(1000),
        upstream_delay_max: std::time::Duration::from_millis(3000),
        pipeline_delay_min: std::time::Duration::from_millis(4000),
        pipeline_delay_max: std::time::Duration::from_millis(8000),
        upstream_max_retries: 3,
        upstream_page_size: 50,
        upstream_max_items: 10_000,
        session_cache_ttl: std::time::Duration::from_secs(60),
        session_proactive_window: chrono::Duration::days(2),
        session_proactive_check_interval: std::time::Duration::from_secs(6 * 3600),
        session_health_check_interval: std::time::Duration::from_secs(3600),
        session_max_fail_count: 5,
        encryption_kdf_iterations: 1000,
        process_secret: "test-secret".to_string(),
        acquirer_merchant_login: "test".to_string(),
        acquirer_password_1: "pw1".to_string(),
        acquirer_password_2: "pw2".to_string(),
        acquirer_test_mode: true,
        admin_chat_ids: vec![],
    }
}
