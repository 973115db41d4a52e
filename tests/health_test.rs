// Jaskier Shared Pattern -- backend integration test
// mutuals-backend health and auth-boundary integration tests.
//
// AppState::new_test() uses a lazy, unconnected pool, so these only cover
// routes that don't need a real database: health/readiness (which tolerate
// DB failure) and admin auth's header check (which runs before any query).

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use mutuals_backend::state::AppState;

fn test_app() -> axum::Router {
    let state = AppState::new_test();
    mutuals_backend::create_router(state)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_endpoint_returns_ok_even_without_database() {
    let response = test_app()
        .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn health_endpoint_reports_degraded_without_database() {
    let response = test_app()
        .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let json = body_json(response).await;
    assert_eq!(json.get("status").and_then(Value::as_str), Some("degraded"));
    assert_eq!(json.get("database").and_then(Value::as_bool), Some(false));
}

#[tokio::test]
async fn readiness_endpoint_returns_503_before_mark_ready() {
    let response = test_app()
        .oneshot(Request::builder().uri("/api/health/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn nonexistent_route_returns_404() {
    let response = test_app()
        .oneshot(Request::builder().uri("/api/does-not-exist").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_stats_without_user_header_is_unauthorized() {
    let response = test_app()
        .oneshot(Request::builder().uri("/api/admin/stats").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_session_set_without_user_header_is_unauthorized() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/admin/session")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"cookie_value":"x"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_stats_with_malformed_user_header_is_unauthorized() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .uri("/api/admin/stats")
                .header("x-user-id", "not-a-number")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn swagger_ui_is_mounted() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .uri("/api-docs/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
