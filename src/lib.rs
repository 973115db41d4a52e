pub mod audit;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod payments;
pub mod pipeline;
pub mod queue;
pub mod session;
pub mod state;
pub mod upstream;
pub mod watchdog;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use state::AppState;

// ═══════════════════════════════════════════════════════════════════════
//  Request correlation ID middleware — Jaskier Shared Pattern
// ═══════════════════════════════════════════════════════════════════════

/// Middleware that generates a UUID v4 correlation ID for each request.
///
/// - Adds it to the current tracing span as `request_id`
/// - Returns it in the `X-Request-Id` response header
/// - Accepts an incoming `X-Request-Id` header to propagate from upstream
async fn request_id_middleware(
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    tracing::Span::current().record("request_id", &request_id.as_str());
    tracing::debug!(request_id = %request_id, "request correlation ID assigned");

    let mut response = next.run(req).await;

    if let Ok(header_value) = axum::http::HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", header_value);
    }

    response
}

// ── OpenAPI documentation ────────────────────────────────────────────────

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Mutual Followers Analysis API",
        version = "1.0.0",
        description = "Job queue, upstream session management, and payment settlement for a paid mutual-followers analysis service",
        license(name = "MIT")
    ),
    paths(
        handlers::health_check,
        handlers::readiness,
        handlers::ensure,
        handlers::balance,
        handlers::initiate,
        handlers::get,
        handlers::list_for_user,
        handlers::list,
        handlers::create_stars,
        handlers::validate_stars,
        handlers::complete_stars,
        handlers::external_callback,
        handlers::get_session,
        handlers::set_session,
        handlers::refresh_sync,
        handlers::stats,
        handlers::stats_daily,
        handlers::checks_failed,
    ),
    tags(
        (name = "health", description = "Health & readiness endpoints"),
        (name = "users", description = "User upsert & balance"),
        (name = "checks", description = "Analysis job admission, polling, history"),
        (name = "tariffs", description = "Credit tariffs"),
        (name = "payments", description = "Native-currency payments & external acquirer callback"),
        (name = "admin", description = "Session override & dashboards"),
    )
)]
pub struct ApiDoc;

/// Build the application router with the given shared state.
/// Extracted from `main()` so integration tests can construct the app
/// without binding to a network port.
pub fn create_router(state: AppState) -> Router {
    // ── Per-endpoint rate limiting — Jaskier Shared Pattern ──────────
    // Job admission is the expensive, credit-bearing path: tighter limit.
    let rl_initiate = GovernorConfigBuilder::default()
        .per_second(2)
        .burst_size(10)
        .finish()
        .expect("rate limiter config: initiate");
    // Payment callback: external acquirer retries on non-2xx, keep generous.
    let rl_callback = GovernorConfigBuilder::default()
        .per_second(1)
        .burst_size(20)
        .finish()
        .expect("rate limiter config: callback");
    // Everything else.
    let rl_default = GovernorConfigBuilder::default()
        .per_millisecond(500)
        .burst_size(120)
        .finish()
        .expect("rate limiter config: default");

    let public = Router::new()
        .route("/api/health", get(handlers::health_check))
        .route("/api/health/ready", get(handlers::readiness))
        .route(
            "/api/payments/external/callback",
            post(handlers::external_callback),
        )
        .layer(GovernorLayer { config: Arc::new(rl_callback) });

    let initiate_routes = Router::new()
        .route("/api/check/initiate", post(handlers::initiate))
        .layer(GovernorLayer { config: Arc::new(rl_initiate) });

    let other_routes = Router::new()
        .route("/api/users/ensure", post(handlers::ensure))
        .route("/api/users/{id}/balance", get(handlers::balance))
        .route("/api/check/{id}", get(handlers::get))
        .route("/api/checks", get(handlers::list_for_user))
        .route("/api/tariffs", get(handlers::list))
        .route(
            "/api/payments/telegram-stars/create",
            post(handlers::create_stars),
        )
        .route(
            "/api/payments/telegram-stars/validate/{id}",
            post(handlers::validate_stars),
        )
        .route(
            "/api/payments/telegram-stars/complete",
            post(handlers::complete_stars),
        )
        .route(
            "/api/admin/session",
            get(handlers::get_session).post(handlers::set_session),
        )
        .route(
            "/api/admin/session/refresh-sync",
            post(handlers::refresh_sync),
        )
        .route("/api/admin/stats", get(handlers::stats))
        .route("/api/admin/stats/daily", get(handlers::stats_daily))
        .route("/api/admin/checks/failed", get(handlers::checks_failed))
        .layer(GovernorLayer { config: Arc::new(rl_default) });

    let protected = initiate_routes.merge(other_routes).route_layer(
        middleware::from_fn_with_state(state.clone(), auth::require_auth),
    );

    public
        .merge(protected)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(axum::extract::DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .with_state(state)
}
