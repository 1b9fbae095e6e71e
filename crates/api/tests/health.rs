//! Integration tests for the health check endpoint and general HTTP behaviour.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::{body_json, build_test_app, get};
use tower::ServiceExt;

const FRONTEND: &str = "http://localhost:5173";

#[tokio::test]
async fn health_check_reports_ok_without_database() {
    let app = build_test_app(100);
    let response = get(&app.router, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert!(json["db_healthy"].is_null());
    assert_eq!(json["open_canvases"], 0);
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let app = build_test_app(100);
    let response = get(&app.router, "/this-route-does-not-exist").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn response_contains_x_request_id_header() {
    let app = build_test_app(100);
    let response = get(&app.router, "/health").await;
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn models_are_filtered_by_type() {
    let app = build_test_app(100);

    let json = body_json(get(&app.router, "/api/v1/models").await).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 2);

    let json = body_json(get(&app.router, "/api/v1/models?type=video").await).await;
    let models = json["data"].as_array().unwrap();
    assert_eq!(models.len(), 1);
    assert_eq!(models[0]["id"], "kling");
    assert_eq!(models[0]["cost_per_gen"], 50);

    let response = get(&app.router, "/api/v1/models?type=audio").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn error_responses_carry_cors_headers() {
    let app = build_test_app(100);
    let request = Request::builder()
        .uri("/this-route-does-not-exist")
        .header("origin", FRONTEND)
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let headers = response.headers();
    assert_eq!(headers["access-control-allow-origin"], FRONTEND);
    assert_eq!(headers["access-control-expose-headers"], "x-request-id");
    assert!(headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn preflight_is_answered_before_routing() {
    let app = build_test_app(100);
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/v1/canvases/00000000-0000-0000-0000-000000000000/nodes")
        .header("origin", FRONTEND)
        .header("access-control-request-method", "PATCH")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["access-control-allow-origin"], FRONTEND);
}
