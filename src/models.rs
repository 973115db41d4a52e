//! Row structs (sqlx::FromRow) and API DTOs for the mutual-followers
//! analysis domain. Rows stay plain data — relationships are typed
//! foreign-key fields resolved by explicit queries in `db/`, never
//! graph-navigable object references.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ── Enums (closed tagged variants at the persistence boundary) ──────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    ExternalAcquirer,
    NativeStars,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentEventKind {
    Created,
    PreCheckout,
    Completed,
    Failed,
    Cancelled,
    RetryScheduled,
    RetryExecuted,
}

// ── User ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize, utoipa::ToSchema)]
pub struct UserRow {
    pub id: i64,
    pub credit_balance: i32,
    pub referral_code: String,
    pub referrer_id: Option<i64>,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct BalanceResponse {
    pub user_id: i64,
    pub credit_balance: i32,
    pub referral_code: String,
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct EnsureUserRequest {
    pub user_id: i64,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub referral_code: Option<String>,
}

// ── Job ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub user_id: i64,
    pub target_handle: String,
    pub status: JobStatus,
    pub progress: i32,
    pub queue_position: Option<i32>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub followers_n: Option<i32>,
    pub following_n: Option<i32>,
    pub non_mutual_n: Option<i32>,
    pub artifact_path: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct InitiateCheckRequest {
    pub user_id: i64,
    pub target_handle: String,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct JobResponse {
    pub id: Uuid,
    pub user_id: i64,
    pub target_handle: String,
    pub status: JobStatus,
    pub progress: i32,
    pub queue_position: Option<i32>,
    pub result_summary: Option<ResultSummary>,
    pub artifact_path: Option<String>,
    pub error_message: Option<String>,
    pub non_mutual: Option<Vec<NonMutualRecordResponse>>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ResultSummary {
    pub followers_n: i32,
    pub following_n: i32,
    pub non_mutual_n: i32,
}

impl From<JobRow> for JobResponse {
    fn from(row: JobRow) -> Self {
        let result_summary = match (row.followers_n, row.following_n, row.non_mutual_n) {
            (Some(f), Some(g), Some(n)) => Some(ResultSummary {
                followers_n: f,
                following_n: g,
                non_mutual_n: n,
            }),
            _ => None,
        };
        Self {
            id: row.id,
            user_id: row.user_id,
            target_handle: row.target_handle,
            status: row.status,
            progress: row.progress,
            queue_position: row.queue_position,
            result_summary,
            artifact_path: row.artifact_path,
            error_message: row.error_message,
            non_mutual: None,
            created_at: row.created_at,
            completed_at: row.completed_at,
        }
    }
}

// ── NonMutualRecord ──────────────────────────────────────────────────

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NonMutualRecordRow {
    pub id: Uuid,
    pub job_id: Uuid,
    pub target_user_id: i64,
    pub target_handle: String,
    pub target_full_name: Option<String>,
    pub target_avatar_url: Option<String>,
    pub user_follows_target: bool,
    pub target_follows_user: bool,
    pub is_mutual: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct NonMutualRecordResponse {
    pub target_user_id: i64,
    pub target_handle: String,
    pub target_full_name: Option<String>,
    pub target_avatar_url: Option<String>,
}

impl From<NonMutualRecordRow> for NonMutualRecordResponse {
    fn from(r: NonMutualRecordRow) -> Self {
        Self {
            target_user_id: r.target_user_id,
            target_handle: r.target_handle,
            target_full_name: r.target_full_name,
            target_avatar_url: r.target_avatar_url,
        }
    }
}

// ── UpstreamSession ──────────────────────────────────────────────────

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UpstreamSessionRow {
    pub id: i32,
    pub cookie_value: String,
    pub is_active: bool,
    pub is_valid: bool,
    pub fail_count: i32,
    pub refresh_attempts: i32,
    pub next_refresh_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub last_verified_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct MaskedSessionResponse {
    pub id: i32,
    pub cookie_masked: String,
    pub is_active: bool,
    pub is_valid: bool,
    pub fail_count: i32,
    pub next_refresh_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl From<UpstreamSessionRow> for MaskedSessionResponse {
    fn from(r: UpstreamSessionRow) -> Self {
        let cookie_masked = mask_secret(&r.cookie_value);
        Self {
            id: r.id,
            cookie_masked,
            is_active: r.is_active,
            is_valid: r.is_valid,
            fail_count: r.fail_count,
            next_refresh_at: r.next_refresh_at,
            last_used_at: r.last_used_at,
        }
    }
}

pub fn mask_secret(value: &str) -> String {
    if value.len() <= 8 {
        "*".repeat(value.len())
    } else {
        format!("{}...{}", &value[..4], &value[value.len() - 4..])
    }
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct SetSessionRequest {
    pub cookie_value: String,
}

// ── RefreshCredential ────────────────────────────────────────────────

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RefreshCredentialRow {
    pub id: i32,
    pub username: String,
    pub password_ciphertext: String,
    pub totp_secret_ciphertext: Option<String>,
    pub is_active: bool,
    pub last_used_at: Option<DateTime<Utc>>,
    pub last_login_success: Option<bool>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ── Tariff ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, sqlx::FromRow, Serialize, utoipa::ToSchema)]
pub struct TariffRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub credits_count: i32,
    pub price_fiat: Decimal,
    pub price_native_stars: Option<i32>,
    pub is_active: bool,
    pub sort_order: i32,
}

// ── Payment ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PaymentRow {
    pub id: Uuid,
    pub user_id: i64,
    pub tariff_id: Option<Uuid>,
    pub amount: Decimal,
    pub currency: String,
    pub credits_count: i32,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub external_charge_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub user_id: i64,
    pub amount: Decimal,
    pub currency: String,
    pub credits_count: i32,
    pub status: PaymentStatus,
    pub external_charge_id: Option<String>,
}

impl From<PaymentRow> for PaymentResponse {
    fn from(p: PaymentRow) -> Self {
        Self {
            id: p.id,
            user_id: p.user_id,
            amount: p.amount,
            currency: p.currency,
            credits_count: p.credits_count,
            status: p.status,
            external_charge_id: p.external_charge_id,
        }
    }
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct CreateStarsPaymentRequest {
    pub user_id: i64,
    pub tariff_id: Uuid,
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct CompleteStarsPaymentRequest {
    pub payment_id: Uuid,
    pub telegram_payment_charge_id: String,
    pub total_amount: i64,
}

// ── PaymentEvent ─────────────────────────────────────────────────────

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct PaymentEventRow {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub kind: PaymentEventKind,
    pub status_before: Option<String>,
    pub status_after: Option<String>,
    pub details: Value,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ── Referral ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReferralRow {
    pub id: Uuid,
    pub referrer_user_id: i64,
    pub referred_user_id: i64,
    pub bonus_granted: bool,
    pub created_at: DateTime<Utc>,
}

// ── Health ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub app: String,
    pub uptime_seconds: u64,
    pub database: bool,
    pub upstream_session_valid: bool,
}

// ── Admin stats ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct AdminStats {
    pub total_users: i64,
    pub total_jobs_completed: i64,
    pub total_jobs_failed: i64,
    pub jobs_pending: i64,
    pub jobs_processing: i64,
    pub revenue_fiat: Decimal,
    pub revenue_credits_sold: i64,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct DailyStats {
    pub date: chrono::NaiveDate,
    pub jobs_completed: i64,
    pub jobs_failed: i64,
    pub payments_completed: i64,
    pub revenue_fiat: Decimal,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct FailedCheckSummary {
    pub id: Uuid,
    pub user_id: i64,
    pub target_handle: String,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ── Pagination ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct PaginationParams {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

impl PaginationParams {
    pub fn limit_or(&self, default: i64) -> i64 {
        self.limit.unwrap_or(default).clamp(1, 200)
    }

    pub fn offset_or(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_secret_keeps_prefix_and_suffix() {
        assert_eq!(mask_secret("abcdefghijklmnop"), "abcd...mnop");
    }

    #[test]
    fn mask_secret_fully_masks_short_values() {
        assert_eq!(mask_secret("short"), "*****");
    }

    #[test]
    fn pagination_limit_clamps_to_upper_bound() {
        let p = PaginationParams { limit: Some(10_000), offset: None };
        assert_eq!(p.limit_or(20), 200);
    }

    #[test]
    fn pagination_limit_clamps_to_lower_bound() {
        let p = PaginationParams { limit: Some(0), offset: None };
        assert_eq!(p.limit_or(20), 1);
    }

    #[test]
    fn pagination_limit_falls_back_to_default() {
        let p = PaginationParams { limit: None, offset: None };
        assert_eq!(p.limit_or(20), 20);
    }

    #[test]
    fn pagination_offset_rejects_negative() {
        let p = PaginationParams { limit: None, offset: Some(-5) };
        assert_eq!(p.offset_or(), 0);
    }
}
