//! Jaskier Shared Pattern — config
//! Centralized settings, read once from the environment at startup.
//!
//! Every magic number spec.md's Open Questions flagged (empty-follower
//! detection, stale timeout, session proactive window, ...) is surfaced
//! here with the default the spec states, overridable via env var.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub upload_dir: String,
    pub auth_secret: Option<String>,

    // ── Queue & worker (C3) ──
    pub worker_parallelism_cap: usize,
    pub stale_job_timeout: Duration,
    pub queue_compaction_interval_ticks: u32,
    pub worker_tick_interval: Duration,

    // ── Upstream client (C1) ──
    pub upstream_delay_min: Duration,
    pub upstream_delay_max: Duration,
    pub pipeline_delay_min: Duration,
    pub pipeline_delay_max: Duration,
    pub upstream_max_retries: u32,
    pub upstream_page_size: u32,
    pub upstream_max_items: u32,

    // ── Session manager (C2) ──
    pub session_cache_ttl: Duration,
    pub session_proactive_window: chrono::Duration,
    pub session_proactive_check_interval: Duration,
    pub session_health_check_interval: Duration,
    pub session_max_fail_count: u32,

    // ── Crypto ──
    pub encryption_kdf_iterations: u32,
    pub process_secret: String,

    // ── External acquirer (C5) ──
    pub acquirer_merchant_login: String,
    pub acquirer_password_1: String,
    pub acquirer_password_2: String,
    pub acquirer_test_mode: bool,

    // ── Notifications ──
    pub admin_chat_ids: Vec<i64>,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Settings {
    pub fn load() -> Self {
        let process_secret = std::env::var("APP_SECRET").unwrap_or_else(|_| {
            tracing::warn!(
                "APP_SECRET not set — falling back to a derived development key. \
                 Set APP_SECRET in production."
            );
            "insecure-development-secret-change-me".to_string()
        });

        let settings = Self {
            database_url: std::env::var("DATABASE_URL").expect("DATABASE_URL required"),
            upload_dir: env_or("UPLOAD_DIR", "./uploads"),
            auth_secret: std::env::var("ADMIN_AUTH_SECRET").ok().filter(|s| !s.is_empty()),

            worker_parallelism_cap: env_parse("WORKER_PARALLELISM_CAP", 1),
            stale_job_timeout: Duration::from_secs(env_parse("STALE_JOB_TIMEOUT_MINUTES", 30u64) * 60),
            queue_compaction_interval_ticks: env_parse("QUEUE_COMPACTION_INTERVAL_TICKS", 50),
            worker_tick_interval: Duration::from_secs(env_parse("WORKER_TICK_SECS", 5u64)),

            upstream_delay_min: Duration::from_millis(env_parse("UPSTREAM_DELAY_MIN_MS", 1000u64)),
            upstream_delay_max: Duration::from_millis(env_parse("UPSTREAM_DELAY_MAX_MS", 3000u64)),
            pipeline_delay_min: Duration::from_millis(env_parse("PIPELINE_DELAY_MIN_MS", 4000u64)),
            pipeline_delay_max: Duration::from_millis(env_parse("PIPELINE_DELAY_MAX_MS", 8000u64)),
            upstream_max_retries: env_parse("UPSTREAM_MAX_RETRIES", 3),
            upstream_page_size: env_parse("UPSTREAM_PAGE_SIZE", 50),
            upstream_max_items: env_parse("UPSTREAM_MAX_ITEMS", 10_000),

            session_cache_ttl: Duration::from_secs(env_parse("SESSION_CACHE_TTL_SECS", 60u64)),
            session_proactive_window: chrono::Duration::days(env_parse("SESSION_PROACTIVE_WINDOW_DAYS", 2i64)),
            session_proactive_check_interval: Duration::from_secs(
                env_parse("SESSION_PROACTIVE_CHECK_HOURS", 6u64) * 3600,
            ),
            session_health_check_interval: Duration::from_secs(
                env_parse("SESSION_HEALTH_CHECK_HOURS", 1u64) * 3600,
            ),
            session_max_fail_count: env_parse("SESSION_MAX_FAIL_COUNT", 5),

            encryption_kdf_iterations: env_parse("ENCRYPTION_KDF_ITERATIONS", 100_000),
            process_secret,

            acquirer_merchant_login: env_or("ACQUIRER_MERCHANT_LOGIN", ""),
            acquirer_password_1: env_or("ACQUIRER_PASSWORD_1", ""),
            acquirer_password_2: env_or("ACQUIRER_PASSWORD_2", ""),
            acquirer_test_mode: env_parse("ACQUIRER_TEST_MODE", true),

            admin_chat_ids: env_or("ADMIN_CHAT_IDS", "")
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .filter_map(|s| s.trim().parse().ok())
                .collect(),
        };

        if settings.encryption_kdf_iterations < 100_000 {
            tracing::warn!(
                "ENCRYPTION_KDF_ITERATIONS={} is below the 100,000 floor spec requires",
                settings.encryption_kdf_iterations
            );
        }

        settings
    }
}
