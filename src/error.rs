//! Jaskier Shared Pattern — error
//! Closed error enums per subsystem, each mapping to an HTTP response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("insufficient balance")]
    InsufficientBalance,
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Payment(#[from] PaymentError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            AppError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            AppError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
            AppError::InsufficientBalance => {
                (StatusCode::PAYMENT_REQUIRED, "insufficient balance".to_string())
            }
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m.clone()),
            AppError::Forbidden(m) => (StatusCode::FORBIDDEN, m.clone()),
            AppError::Database(e) => {
                tracing::error!("database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
            AppError::Payment(p) => return p.clone().into_response(),
            AppError::Crypto(c) => {
                tracing::error!("crypto error: {}", c);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
            AppError::Internal(m) => {
                tracing::error!("internal error: {}", m);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Payment state-machine errors, mirroring the exception hierarchy the
/// original service raised around `Payment` transitions.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PaymentError {
    #[error("payment not found")]
    NotFound,
    #[error("tariff not found")]
    TariffNotFound,
    #[error("tariff not available")]
    TariffNotAvailable,
    #[error("user not found")]
    UserNotFound,
    #[error("payment already completed")]
    AlreadyCompleted,
    #[error("payment amount mismatch: expected {expected}, got {received}")]
    AmountMismatch { expected: String, received: String },
    #[error("payment is not in a state that allows this transition: {0}")]
    InvalidStatus(String),
    #[error("invalid callback signature")]
    InvalidSignature,
}

impl IntoResponse for PaymentError {
    fn into_response(self) -> Response {
        let status = match &self {
            PaymentError::NotFound | PaymentError::TariffNotFound | PaymentError::UserNotFound => {
                StatusCode::NOT_FOUND
            }
            PaymentError::TariffNotAvailable
            | PaymentError::AmountMismatch { .. }
            | PaymentError::InvalidStatus(_)
            | PaymentError::InvalidSignature => StatusCode::BAD_REQUEST,
            PaymentError::AlreadyCompleted => StatusCode::CONFLICT,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("encryption failed")]
    EncryptFailed,
    #[error("decryption failed: wrong key or corrupted data")]
    DecryptFailed,
    #[error("malformed ciphertext encoding")]
    MalformedCiphertext,
}

/// Classification of an upstream fetch outcome, shared between the
/// upstream client and the analysis pipeline's failure taxonomy.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UpstreamError {
    #[error("target user not found")]
    UserNotFound,
    #[error("target account is private")]
    PrivateAccount,
    #[error("rate limited by upstream")]
    RateLimited,
    #[error("upstream session expired")]
    SessionExpired,
    #[error("transient upstream failure: {0}")]
    Transient(String),
    #[error("incomplete data after {fetched_count} items on {connection_type}")]
    IncompleteData {
        fetched_count: usize,
        connection_type: String,
    },
}
